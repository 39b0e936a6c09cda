//! Error type shared by ticks, the async adapter and the ticker.
//!
//! Every failure mode ends up as an [`Error`]: construction refusals are
//! returned from [`crate::TickerBuilder::build`], everything else is reported
//! by a tick or captured as a ticker's terminal error.

use std::sync::Arc;

use thiserror::Error;

use crate::context::ContextError;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by ticks and tickers.
///
/// `Clone` so a ticker's terminal error can be read any number of times.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("ticker requires a context")]
    MissingContext,

    #[error("ticker period must be greater than zero")]
    InvalidPeriod,

    #[error("ticker requires a node or tick to evaluate")]
    MissingNode,

    #[error("ticker must be started from within a tokio runtime")]
    NoRuntime,

    #[error("cannot tick a node with no tick")]
    MissingTick,

    #[error("tick recovered from panic: {0}")]
    Panicked(String),

    #[error("ticker task failed to join: {0}")]
    TaskJoin(String),

    #[error("failed to spawn async tick worker: {0}")]
    Spawn(String),

    #[error("tick returned failure")]
    TickFailed,

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Tick(Arc<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wraps an error reported by a caller-supplied tick.
    pub fn custom<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Tick(Arc::new(err))
    }

    /// Returns `true` for errors raised while validating a ticker builder.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Error::MissingContext | Error::InvalidPeriod | Error::MissingNode | Error::NoRuntime
        )
    }
}
