//! Query handler pipeline.
//!
//! Concrete handlers implement [`QueryHandler`]: a schema-bearing input type,
//! an async execution step against the store, and a mapper from
//! persistence-native output to a plain serializable DTO. The blanket
//! [`DynQueryHandler`] impl drives every handler through the same state
//! machine:
//!
//! ```text
//! RECEIVED → VALIDATED → EXECUTED → MAPPED → DONE
//!     └──────────┴───────────┴─────────┴──→ FAILED (terminal)
//! ```
//!
//! Failures are returned as `DataAccessResult` errors; nothing is retried.

pub mod factory;
pub mod schema;

use std::{
    fmt,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use log::{error, trace, warn};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::{
    bus::{DataAccessError, DataAccessResult},
    core::error::ErrorCode,
    store::StoreError,
};

pub use factory::{builtin_handlers, instantiate_handlers, HandlerCreateFn, HandlerDeps};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Received,
    Validated,
    Executed,
    Mapped,
    Done,
    Failed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Received => "RECEIVED",
            PipelineState::Validated => "VALIDATED",
            PipelineState::Executed => "EXECUTED",
            PipelineState::Mapped => "MAPPED",
            PipelineState::Done => "DONE",
            PipelineState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-invocation execution state handed to `QueryHandler::execute`
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionContext {
    deadline: Option<Instant>,
}

impl ExecutionContext {
    pub fn new(deadline: Option<Instant>) -> Self {
        Self { deadline }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(Some(Instant::now() + timeout))
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Call before each persistence round trip.
    pub fn checkpoint(&self) -> Result<(), StoreError> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(StoreError::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}

/// A typed query handler
#[async_trait]
pub trait QueryHandler: Send + Sync + 'static {
    /// Decoded and validated parameters
    type Input: DeserializeOwned + Validate + Send + Sync;

    /// Persistence-native result of `execute`
    type Output: Send;

    /// Plain data returned across the bus
    type Dto: Serialize + Send;

    /// Query name the bus dispatches on, e.g. `users.create`
    fn name(&self) -> &'static str;

    /// Decodes `params` and checks them against the input schema.
    fn validate(&self, params: Value) -> Result<Self::Input, DataAccessError> {
        schema::validate_params(params)
    }

    async fn execute(
        &self,
        input: Self::Input,
        ctx: &ExecutionContext,
    ) -> Result<Self::Output, StoreError>;

    fn map(&self, output: Self::Output) -> Result<Self::Dto, DataAccessError>;
}

/// Object-safe view of a query handler used by the bus
#[async_trait]
pub trait DynQueryHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, params: Value, ctx: ExecutionContext) -> DataAccessResult<Value>;
}

#[async_trait]
impl<H: QueryHandler> DynQueryHandler for H {
    fn name(&self) -> &'static str {
        QueryHandler::name(self)
    }

    async fn handle(&self, params: Value, ctx: ExecutionContext) -> DataAccessResult<Value> {
        let mut pipeline = Pipeline::new(QueryHandler::name(self));
        pipeline.run(self, params, &ctx).await.into()
    }
}

struct Pipeline {
    handler: &'static str,
    state: PipelineState,
}

impl Pipeline {
    fn new(handler: &'static str) -> Self {
        Self {
            handler,
            state: PipelineState::Received,
        }
    }

    fn advance(&mut self, next: PipelineState) {
        trace!("{}: {} -> {}", self.handler, self.state, next);
        self.state = next;
    }

    fn fail(&mut self, err: DataAccessError) -> DataAccessError {
        warn!(
            "{}: failed in state {} with {}: {}",
            self.handler, self.state, err.code, err.message
        );
        self.state = PipelineState::Failed;
        err
    }

    async fn run<H: QueryHandler>(
        &mut self,
        handler: &H,
        params: Value,
        ctx: &ExecutionContext,
    ) -> Result<Value, DataAccessError> {
        let input = handler.validate(params).map_err(|e| self.fail(e))?;
        self.advance(PipelineState::Validated);

        let output = match ctx.checkpoint() {
            Ok(()) => handler.execute(input, ctx).await,
            Err(e) => Err(e),
        };
        let output = output.map_err(|e| {
            if !matches!(e, StoreError::NotFound { .. } | StoreError::DeadlineExceeded) {
                error!("{}: persistence failure: {:?}", self.handler, e);
            }
            self.fail(DataAccessError::from_store(&e))
        })?;
        self.advance(PipelineState::Executed);

        let dto = handler.map(output).map_err(|e| self.fail(e))?;
        let payload = serde_json::to_value(dto).map_err(|e| {
            error!("{}: mapped result is not serializable: {}", self.handler, e);
            self.fail(DataAccessError::new(
                ErrorCode::InternalError,
                "Query result could not be serialized",
            ))
        })?;
        self.advance(PipelineState::Mapped);

        self.advance(PipelineState::Done);
        Ok(payload)
    }
}
