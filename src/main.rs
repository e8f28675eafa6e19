use actix_cors::Cors;
use actix_web::{App, HttpServer};
use std::io;
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{self, EnvFilter};
use tracing_actix_web::TracingLogger;

use aalaboo_api::config::{AppConfig, MongoConfig};
use aalaboo_api::notify::{HttpMailer, LogMailer, Mailer, Notifier};
use aalaboo_api::AppState;

fn startup_error(context: &str, e: impl std::fmt::Display) -> io::Error {
    error!("{}: {}", context, e);
    io::Error::new(io::ErrorKind::Other, format!("{}: {}", context, e))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(Level::INFO.into())
                .add_directive("actix_web=info".parse().map_err(|e| startup_error("log filter", e))?)
                .add_directive("aalaboo_api=debug".parse().map_err(|e| startup_error("log filter", e))?),
        )
        .init();

    info!("Starting Aalaboo storefront API");

    let config = AppConfig::from_env();
    let mongo_config = MongoConfig::init(&config)
        .await
        .map_err(|e| startup_error("Failed to initialize MongoDB", e))?;

    info!("MongoDB connection established");

    let mailer: Arc<dyn Mailer> = match config.mail.clone() {
        Some(mail) => Arc::new(HttpMailer::new(mail).map_err(|e| startup_error("Failed to build mailer", e))?),
        None => {
            warn!("MAIL_API_URL not set, notifications will only be logged");
            Arc::new(LogMailer)
        }
    };
    if config.razorpay.is_none() {
        warn!("Razorpay credentials not set, online checkout disabled");
    }

    let state = AppState::new(&config, mongo_config, Notifier::start(mailer))
        .map_err(|e| startup_error("Failed to build services", e))?;

    info!("Listening on {}", config.bind_address);
    HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .wrap(Cors::permissive())
            .configure(|cfg| state.configure(cfg))
    })
    .bind(&config.bind_address)?
    .run()
    .await
}
