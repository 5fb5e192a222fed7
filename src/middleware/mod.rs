//! Middleware units and type erasure.
//!
//! Everything that touches a request is a middleware unit: global
//! middleware registered with [`App::use_middleware`](crate::App::use_middleware),
//! every step of a route's stack, and the route-check units the router
//! inserts after the global stack.
//!
//! A unit receives the shared [`Context`] and a [`Next`] continuation. It may
//! read or write the request and response, call [`Next::call`] to let the
//! chain advance, or fail by returning `Err`. Not calling `next` halts the
//! chain once the unit's future resolves.
//!
//! ```text
//! |ctx, next| Box::pin(async move { … })     ← user writes this
//!        ↓ from_fn(…)
//! FromFn(closure)                            ← implements Middleware
//!        ↓ app.use_middleware(…)
//! Arc<dyn Middleware>                        ← stored as BoxedMiddleware
//!        ↓
//! unit.call(&mut ctx, next)  per request     ← one vtable dispatch
//! ```
//!
//! Built-in units:
//! - [`BodyParser`] — fills [`Request::body`](crate::Request::body) from the raw bytes
//! - [`RequestLogger`] — a `tracing` event when the request arrives and one when it finishes

mod body_parser;
mod logger;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::chain::Next;
use crate::context::Context;

pub use body_parser::BodyParser;
pub use logger::RequestLogger;

/// A heap-allocated, type-erased future borrowing from the call site for `'a`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A request-handling step.
///
/// Implement it on your own types, or wrap a closure with [`from_fn`].
pub trait Middleware: Send + Sync + 'static {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next) -> BoxFuture<'a, anyhow::Result<()>>;
}

/// A type-erased middleware unit shared across concurrent requests.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// Turns a closure into a [`Middleware`].
///
/// ```rust
/// use veslo::middleware::from_fn;
///
/// let unit = from_fn(|ctx, next| Box::pin(async move {
///     if ctx.req.header("authorization").is_none() {
///         anyhow::bail!("missing credentials");
///     }
///     next.call();
///     Ok(())
/// }));
/// # let _ = unit;
/// ```
pub fn from_fn<F>(f: F) -> FromFn<F>
where
    F: for<'a> Fn(&'a mut Context, Next) -> BoxFuture<'a, anyhow::Result<()>> + Send + Sync + 'static,
{
    FromFn(f)
}

/// Middleware built from a closure. See [`from_fn`].
#[derive(Clone, Copy)]
pub struct FromFn<F>(F);

impl<F> Middleware for FromFn<F>
where
    F: for<'a> Fn(&'a mut Context, Next) -> BoxFuture<'a, anyhow::Result<()>> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next) -> BoxFuture<'a, anyhow::Result<()>> {
        (self.0)(ctx, next)
    }
}
