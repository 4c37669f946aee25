use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use animator::api::{artifact_files, configure_routes, AppState};
use animator::banner;
use animator::config::AppConfig;
use animator::providers::Provider;
use animator::workspace::Workspace;
use log::{error, info, warn};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Print the startup banner
    banner::print_banner();

    if let Err(e) = dotenvy::dotenv() {
        eprintln!("⚠️  Warning: Could not load .env file: {}", e);
        eprintln!("   Make sure an LLM provider key is set in your environment");
    }

    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let app_config = AppConfig::from_env().map_err(|e| {
        error!("❌ Failed to load app configuration: {}", e);
        std::io::Error::other(e.to_string())
    })?;

    let settings = app_config.settings.clone();
    let served_dir = Workspace::served_dir(&settings.workspace);
    std::fs::create_dir_all(&served_dir)?;

    info!(
        "Using model {} (workspace isolation: {:?}, render timeout: {}s, keeping {} runs)",
        app_config.model,
        settings.workspace.isolation,
        settings.render.timeout_secs,
        settings.workspace.keep_runs
    );
    if settings.render.timeout_secs == 0 {
        warn!("Render timeout is 0s; every render will fail");
    }

    let state = AppState::new(&app_config).map_err(|e| {
        error!("❌ Failed to initialise LLM provider: {}", e);
        std::io::Error::other(e.to_string())
    })?;

    let bind_addr = (settings.server.host.clone(), settings.server.port);
    info!("🚀 Starting server on {}:{}", bind_addr.0, bind_addr.1);
    info!("🎞️  Serving animations from {}", served_dir.display());

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .configure(configure_routes::<Provider>)
            .service(artifact_files(&settings.workspace))
    })
    .bind(bind_addr)?
    .run()
    .await
}
