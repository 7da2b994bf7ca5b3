use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::ResponseShape;
use crate::error::{PersistenceError, ProgramError};

pub const INSERT_RETURNING_TITLE: &str =
    "INSERT INTO programs(title, description, time) VALUES ($1, $2, $3::bigint) RETURNING title";

pub const INSERT_RETURNING_ROW: &str = "INSERT INTO programs(title, description, time) VALUES ($1, $2, $3::bigint) RETURNING row_to_json(programs)";

pub fn insert_statement(shape: ResponseShape) -> &'static str {
    match shape {
        ResponseShape::Title => INSERT_RETURNING_TITLE,
        ResponseShape::Row => INSERT_RETURNING_ROW,
    }
}

/// The values bound to one insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProgram {
    pub title: String,
    pub description: String,
    pub time: i64,
}

/// Opens one connection per call. Implementations must not share connections across calls.
#[async_trait]
pub trait Connector: Send + Sync {
    type Connection: ProgramConnection;

    async fn connect(&self) -> Result<Self::Connection, PersistenceError>;
}

/// A connection scoped to a single insert.
///
/// `release` closes it explicitly; dropping an unreleased connection must also close it.
#[async_trait]
pub trait ProgramConnection: Send + Sized {
    /// Runs the insert and returns the first `RETURNING` row as JSON, if any.
    async fn insert_program(
        &mut self,
        program: &NewProgram,
        shape: ResponseShape,
    ) -> Result<Option<Value>, PersistenceError>;

    async fn release(self);
}

pub struct ProgramWriter<C> {
    connector: C,
    shape: ResponseShape,
}

impl<C: Connector> ProgramWriter<C> {
    pub fn new(connector: C, shape: ResponseShape) -> Self {
        Self { connector, shape }
    }

    /// Inserts one row and returns the projected row, or `{}` if the store returned none.
    ///
    /// Not idempotent. Never retried.
    pub async fn insert(&self, program: &NewProgram) -> Result<Value, ProgramError> {
        let mut connection = self.connector.connect().await?;
        let outcome = connection.insert_program(program, self.shape).await;
        connection.release().await;
        debug!(ok = outcome.is_ok(), "connection released");

        Ok(outcome?.unwrap_or_else(|| Value::Object(Map::new())))
    }
}
