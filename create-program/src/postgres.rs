use async_trait::async_trait;
use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode};
use postgres_openssl::MakeTlsConnector;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tokio_postgres::Client;
use tracing::{error, warn};

use crate::config::{Config, ResponseShape};
use crate::error::PersistenceError;
use crate::writer::{insert_statement, Connector, NewProgram, ProgramConnection};

/// Opens a fresh TLS-capable Postgres connection per insert. No pooling.
#[derive(Clone)]
pub struct PgConnector {
    config: tokio_postgres::Config,
    tls: MakeTlsConnector,
}

impl PgConnector {
    pub fn new(config: &Config) -> Result<Self, PersistenceError> {
        // The URL may carry a password, so it never goes into the error.
        let mut pg_config: tokio_postgres::Config = config
            .database_url
            .parse()
            .map_err(|e: tokio_postgres::Error| {
                PersistenceError::Connect(format!("invalid database url: {e}"))
            })?;
        if let Some(timeout) = config.connect_timeout {
            pg_config.connect_timeout(timeout);
        }

        let mut builder =
            SslConnector::builder(SslMethod::tls()).map_err(|e| PersistenceError::Tls(e.to_string()))?;
        if let Some(ca_file) = &config.ca_file {
            builder
                .set_ca_file(ca_file)
                .map_err(|e| PersistenceError::Tls(format!("{}: {e}", ca_file.display())))?;
        }
        if !config.tls_verify {
            builder.set_verify(SslVerifyMode::NONE);
        }

        Ok(Self {
            config: pg_config,
            tls: MakeTlsConnector::new(builder.build()),
        })
    }
}

pub struct PgConnection {
    client: Client,
    driver: JoinHandle<()>,
}

#[async_trait]
impl Connector for PgConnector {
    type Connection = PgConnection;

    async fn connect(&self) -> Result<PgConnection, PersistenceError> {
        let (client, connection) = self
            .config
            .connect(self.tls.clone())
            .await
            .map_err(|e| PersistenceError::Connect(e.to_string()))?;

        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "connection error");
            }
        });

        Ok(PgConnection { client, driver })
    }
}

#[async_trait]
impl ProgramConnection for PgConnection {
    async fn insert_program(
        &mut self,
        program: &NewProgram,
        shape: ResponseShape,
    ) -> Result<Option<Value>, PersistenceError> {
        let rows = self
            .client
            .query(
                insert_statement(shape),
                &[&program.title, &program.description, &program.time],
            )
            .await
            .map_err(|e| PersistenceError::Query(e.to_string()))?;

        let Some(row) = rows.first() else {
            return Ok(None);
        };

        let value = match shape {
            ResponseShape::Title => {
                let title: String = row
                    .try_get(0)
                    .map_err(|e| PersistenceError::Query(e.to_string()))?;
                json!({ "title": title })
            }
            ResponseShape::Row => row
                .try_get(0)
                .map_err(|e| PersistenceError::Query(e.to_string()))?,
        };

        Ok(Some(value))
    }

    /// Dropping the client ends the session; the driver task then finishes and the socket closes.
    async fn release(self) {
        let PgConnection { client, driver } = self;
        drop(client);
        if let Err(e) = driver.await {
            warn!(error = %e, "connection driver task failed");
        }
    }
}
