use std::{fs::OpenOptions, io};

use actix_web::{web, App, HttpServer};
use sea_orm::{Database, DbErr};
use thiserror::Error;
use tracing::{info, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{filter, fmt, layer::SubscriberExt, EnvFilter, Layer, Registry};

use crate::{auth::Authority, fanout::feed::ChangeFeed, store::Store};

mod config;
mod consts;
mod error;
mod utils;

mod entity;
mod auth;
mod store;
mod fanout;
mod command;
mod payroll;
mod pages;

#[derive(Debug, Error)]
enum StartupError {
    #[error("unable to open log file: {0}")]
    LogFile(#[source] io::Error),

    #[error("unable to install tracing subscriber")]
    Tracing(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error("unable to connect to database")]
    Database(#[from] DbErr),

    #[error("server error")]
    Server(#[from] io::Error),
}

#[actix_web::main]
async fn main() -> Result<(), StartupError> {
    let _ = dotenvy::dotenv();

    let log_file = OpenOptions::new()
        .append(true)
        .create(true)
        .open("trace.log")
        .map_err(StartupError::LogFile)?;

    let subscriber = Registry::default()
        .with(
            fmt::layer()
                .with_ansi(true)
                .with_line_number(true)
                .with_filter(EnvFilter::from_default_env())
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(log_file)
                .with_filter(filter::LevelFilter::from_level(Level::TRACE))
        );

    tracing::subscriber::set_global_default(subscriber)?;

    let config::Config {
        host_address,
        database_opt,
        jwt_key,
        feed_capacity,
        settings,
    } = config::load()?;

    let database = Database::connect(database_opt).await?;
    let store = web::Data::new(Store::new(database, ChangeFeed::new(feed_capacity)));
    let authority = web::Data::new(Authority::new(jwt_key.as_bytes()));
    let settings = web::Data::new(settings);

    info!(%host_address, batch_size = settings.batch_size, "starting server");

    let server = HttpServer::new(move || {
        App::new()
            .app_data(store.clone())
            .app_data(authority.clone())
            .app_data(settings.clone())
            .wrap(TracingLogger::default())
            .configure(pages::config)
    });

    server
        .bind(host_address)?
        .run().await?;

    Ok(())
}
