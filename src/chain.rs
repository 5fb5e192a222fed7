//! Chain runner.
//!
//! # One run, one state machine
//!
//! [`run`] executes an ordered slice of units against one [`Context`]. Each
//! run owns a small shared state: a cursor holding the index of the unit
//! whose continuation is awaited. The unit at `i` receives a [`Next`] bound
//! to `i`; calling it moves the cursor from `i` to `i + 1`. When the unit's
//! future resolves, the runner closes the cursor for `i` with a single
//! compare-exchange:
//!
//! ```text
//! cursor == i + 1  → continuation was called, yield, run unit i + 1
//! cursor == i      → it was not; swap in CLOSED, the run halts
//! unit returned Err → CLOSED, the run fails (error slot), nothing else runs
//! ```
//!
//! Once closed, every late or repeated [`Next::call`] is a no-op that logs a
//! warning. The state is created per [`run`] call and dropped with it; no
//! error bucket or cursor outlives the run or is shared between requests.
//!
//! # Yielding between units
//!
//! Every unit is preceded by [`tokio::task::yield_now`]. A long chain is a
//! flat loop, not nested calls, and each step goes back through the
//! scheduler so one request's chain cannot starve the other connections
//! served by the same worker.
//!
//! # Panics
//!
//! A panic inside a unit is caught and stored in the error slot like any
//! other failure, so it becomes a 500 for that request instead of tearing
//! down the connection task.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::FutureExt;
use tracing::{trace, warn};

use crate::context::Context;
use crate::middleware::BoxedMiddleware;

const CLOSED: usize = usize::MAX;

/// How a run ended.
#[derive(Debug)]
pub enum Outcome {
    /// Every unit called its continuation.
    Completed,
    /// The unit at `at` returned without calling its continuation.
    Halted { at: usize },
    /// The unit at `at` failed. Later units never ran.
    Failed { at: usize, error: anyhow::Error },
}

struct RunState {
    cursor: AtomicUsize,
}

impl RunState {
    fn close(&self) {
        self.cursor.store(CLOSED, Ordering::Release);
    }
}

/// The continuation handed to a middleware unit.
///
/// Call it at most once, before the unit's future resolves. A second call, or
/// a call after the run has moved past this unit or finished, does nothing
/// and returns `false`.
pub struct Next {
    state: Arc<RunState>,
    index: usize,
}

impl Next {
    /// Lets the chain proceed to the next unit. Returns `true` if this call
    /// advanced the chain.
    pub fn call(&self) -> bool {
        match self.state.cursor.compare_exchange(
            self.index,
            self.index + 1,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => true,
            Err(CLOSED) => {
                warn!(unit = self.index, "continuation called after the chain finished; ignored");
                false
            }
            Err(_) => {
                warn!(unit = self.index, "continuation called more than once; ignored");
                false
            }
        }
    }
}

impl std::fmt::Debug for Next {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next").field("index", &self.index).finish()
    }
}

/// Runs `units` in order against `ctx`, one at a time.
///
/// An empty slice completes immediately without yielding.
pub async fn run(units: &[BoxedMiddleware], ctx: &mut Context) -> Outcome {
    let state = Arc::new(RunState { cursor: AtomicUsize::new(0) });

    for (index, unit) in units.iter().enumerate() {
        tokio::task::yield_now().await;

        let next = Next { state: Arc::clone(&state), index };
        // `call` itself runs inside the guard: a unit may panic before it
        // returns its future.
        let result = AssertUnwindSafe(async { unit.call(&mut *ctx, next).await })
            .catch_unwind()
            .await;

        let failure = match result {
            Ok(Ok(())) => None,
            Ok(Err(error)) => Some(error),
            Err(payload) => Some(panic_error(payload)),
        };
        if let Some(error) = failure {
            state.close();
            trace!(unit = index, "chain failed");
            return Outcome::Failed { at: index, error };
        }

        let closed = state.cursor.compare_exchange(index, CLOSED, Ordering::AcqRel, Ordering::Acquire);
        if closed.is_ok() {
            trace!(unit = index, "chain halted");
            return Outcome::Halted { at: index };
        }
    }

    state.close();
    Outcome::Completed
}

fn panic_error(payload: Box<dyn Any + Send>) -> anyhow::Error {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned());
    anyhow::anyhow!("panic: {message}")
}
