use std::sync::Arc;

use lambda_runtime::{run, service_fn, tracing, Error};

mod config;
mod error;
mod event_handler;
mod handler;
mod postgres;
mod validator;
mod writer;

use config::Config;
use event_handler::function_handler;
use handler::ProgramHandler;
use postgres::PgConnector;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    let config = Config::from_env()?;
    tracing::info!(
        time_policy = ?config.time_policy,
        response_shape = ?config.response_shape,
        status_mapping = ?config.status_mapping,
        "create-program starting"
    );

    let connector = PgConnector::new(&config)?;
    let handler = Arc::new(ProgramHandler::new(&config, connector));

    run(service_fn(move |event| {
        let handler = Arc::clone(&handler);
        async move { function_handler(&handler, event).await }
    }))
    .await
}
