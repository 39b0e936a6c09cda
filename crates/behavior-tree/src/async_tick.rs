//! Background execution for slow ticks.
//!
//! [`async_tick`] wraps a tick so that calling it never waits for the wrapped
//! work. The first call starts the work on a background worker and reports
//! [`Status::Running`]; later calls poll for the result and hand it back once,
//! after which the next call starts the work again.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use tokio::runtime::Handle;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tracing::{trace, warn};

use crate::node::{Node, Tick, TickResult};
use crate::{Error, Status};

/// Wraps `tick` so that it runs in the background.
///
/// Returns `None` when `tick` is `None`.
///
/// Calls to the returned tick are serialized by a per-wrapper lock, so at most
/// one background execution is outstanding per wrapper. A panic inside the
/// wrapped tick is reported as [`Error::Panicked`] on the call that observes
/// completion.
///
/// The worker is a blocking task on the current tokio runtime when called
/// from inside one, and a dedicated thread otherwise.
pub fn async_tick(tick: Option<Tick>) -> Option<Tick> {
    let wrapper = Arc::new(AsyncTick {
        tick: tick?,
        in_flight: Mutex::new(None),
    });
    Some(Arc::new(move |children: &[Node]| wrapper.poll(children)))
}

struct AsyncTick {
    tick: Tick,
    /// Receiver for the outstanding background execution, if any.
    in_flight: Mutex<Option<oneshot::Receiver<TickResult>>>,
}

impl AsyncTick {
    fn poll(&self, children: &[Node]) -> TickResult {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let Some(rx) = in_flight.as_mut() else {
            *in_flight = Some(self.start(children.to_vec())?);
            return Ok(Status::Running);
        };

        match rx.try_recv() {
            Ok(result) => {
                *in_flight = None;
                result
            }
            Err(TryRecvError::Empty) => Ok(Status::Running),
            Err(TryRecvError::Closed) => {
                *in_flight = None;
                Err(Error::Panicked(
                    "background tick dropped without a result".to_string(),
                ))
            }
        }
    }

    fn start(&self, children: Vec<Node>) -> Result<oneshot::Receiver<TickResult>, Error> {
        let (tx, rx) = oneshot::channel();
        let tick = Arc::clone(&self.tick);
        let work = move || {
            let result = catch_panic(|| tick(&children)).and_then(|result| result);
            if tx.send(result).is_err() {
                trace!("async tick result dropped (wrapper gone)");
            }
        };

        match Handle::try_current() {
            Ok(handle) => {
                // Detached: the blocking task runs to completion on its own.
                drop(handle.spawn_blocking(work));
            }
            Err(_) => {
                thread::Builder::new()
                    .name("bt-async-tick".to_string())
                    .spawn(work)
                    .map_err(|e| Error::Spawn(e.to_string()))?;
            }
        }

        Ok(rx)
    }
}

/// Runs `f`, converting a panic into [`Error::Panicked`].
pub(crate) fn catch_panic<F, T>(f: F) -> Result<T, Error>
where
    F: FnOnce() -> T,
{
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let message = panic_message(payload.as_ref());
        warn!(%message, "tick panicked");
        Error::Panicked(message)
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
