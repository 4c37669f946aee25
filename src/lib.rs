// src/lib.rs
pub mod api;
pub mod artifacts;
pub mod banner;
pub mod config;
pub mod errors;
pub mod models;
pub mod pipeline;
pub mod probe;
pub mod providers;
pub mod render;
pub mod synthesizer;
pub mod workspace;
