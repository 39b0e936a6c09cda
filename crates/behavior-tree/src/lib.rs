//! Concurrency primitives for closure-based behavior trees.
//!
//! Trees are built elsewhere out of [`Node`] and [`Tick`] closures; this
//! crate decides *when* and *where* they are evaluated.
//!
//! - **Async ticks**: [`async_tick`] moves a slow tick onto a background
//!   worker and reports [`Status::Running`] until it finishes
//! - **Periodic ticking**: [`Ticker`] ticks a root node at a fixed period
//!   until stopped, its [`Context`] completes, or its [`StopPolicy`] fires
//! - **Panic containment**: panics inside async ticks surface as errors
//!
//! # Architecture
//!
//! - [`Status`]: Running, Success or Failure
//! - [`Tick`] / [`Node`]: evaluation function and tree node closures
//! - [`Context`]: cancellation scope with optional deadline
//! - [`Error`]: every failure mode, including a ticker's terminal error

pub mod async_tick;
pub mod context;
pub mod error;
pub mod node;
pub mod status;
pub mod ticker;

// Re-export core types for ergonomic API
pub use async_tick::async_tick;
pub use context::{Context, ContextError};
pub use error::{Error, Result};
pub use node::{Node, Tick, TickResult, leaf, node, node_fn, tick, tick_fn};
pub use status::Status;
pub use ticker::{StopPolicy, Ticker, TickerBuilder, TickerConfig};
