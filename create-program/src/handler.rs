use chrono::Utc;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::config::{Config, StatusMapping, TimePolicy};
use crate::error::ProgramError;
use crate::validator::{validate_program, ProgramInput};
use crate::writer::{Connector, NewProgram, ProgramWriter};

/// Status code and JSON body of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramResponse {
    pub status: u16,
    pub body: Value,
}

impl ProgramResponse {
    fn success(row: Value) -> Self {
        Self {
            status: 200,
            body: json!({ "result": row }),
        }
    }

    fn failure(err: &ProgramError, mapping: StatusMapping) -> Self {
        Self {
            status: err.status_code(mapping),
            body: json!({ "result": err.detail() }),
        }
    }
}

/// Validates a request body and persists it as one `programs` row.
///
/// Holds no per-request state; each call opens and releases its own connection.
pub struct ProgramHandler<C> {
    writer: ProgramWriter<C>,
    time_policy: TimePolicy,
    status_mapping: StatusMapping,
}

impl<C: Connector> ProgramHandler<C> {
    pub fn new(config: &Config, connector: C) -> Self {
        Self {
            writer: ProgramWriter::new(connector, config.response_shape),
            time_policy: config.time_policy,
            status_mapping: config.status_mapping,
        }
    }

    pub async fn handle(&self, body: &str) -> ProgramResponse {
        match self.create(body).await {
            Ok(row) => {
                info!("program responded");
                ProgramResponse::success(row)
            }
            Err(err) => ProgramResponse::failure(&err, self.status_mapping),
        }
    }

    /// Failure response for a request rejected before its body could be read.
    pub fn reject(&self, err: &ProgramError) -> ProgramResponse {
        warn!(error = %err, kind = err.kind(), "program rejected");
        ProgramResponse::failure(err, self.status_mapping)
    }

    async fn create(&self, body: &str) -> Result<Value, ProgramError> {
        let program = validate_program(body)
            .and_then(|input| self.resolve(input))
            .inspect_err(|err| warn!(error = %err, kind = err.kind(), "program rejected"))?;
        info!(title = %program.title, time = program.time, "program validated");

        let row = self
            .writer
            .insert(&program)
            .await
            .inspect_err(|err| error!(error = %err, "program insert failed"))?;
        info!("program persisted");

        Ok(row)
    }

    fn resolve(&self, input: ProgramInput) -> Result<NewProgram, ProgramError> {
        let time = match self.time_policy {
            TimePolicy::Zero => 0,
            TimePolicy::Request => input.time.ok_or(ProgramError::Validation { field: "time" })?,
            TimePolicy::Now => Utc::now().timestamp_millis(),
        };

        Ok(NewProgram {
            title: input.title,
            description: input.description,
            time,
        })
    }
}
