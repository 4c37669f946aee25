// src/banner.rs

/// Prints the application startup banner to the console.
pub fn print_banner() {
    // Using a raw string literal for the multi-line banner
    let banner = r#"
             _                 _
  __ _ _ __ (_)_ __ ___   __ _| |_ ___  _ __
 / _` | '_ \| | '_ ` _ \ / _` | __/ _ \| '__|
| (_| | | | | | | | | | | (_| | || (_) | |
 \__,_|_| |_|_|_| |_| |_|\__,_|\__\___/|_|

    Concept-to-Animation Rendering Service
"#;
    println!("{}", banner);
}
