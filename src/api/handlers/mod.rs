// src/api/handlers/mod.rs
mod animations;
mod health;

pub use animations::generate_animation;
pub use health::health_check;
