//! # veslo
//!
//! A minimal HTTP application layer. Requests go through an ordered chain of
//! middleware, then through the routes in the order they were registered.
//! Every request gets exactly one response.
//!
//! ## The contract
//!
//! - **Ordered middleware** — global units run in registration order, one at
//!   a time, each advancing the chain by calling its [`Next`] continuation.
//! - **First match wins** — the first route whose method and path pattern
//!   match claims the request; its stack is the only one that runs.
//! - **One response** — if no route claims the request the app answers `404`,
//!   if any unit fails it answers `500`, and a finished response is never
//!   written again.
//!
//! What veslo intentionally leaves out: content negotiation, streaming
//! responses, validation, sessions.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use veslo::middleware::{BodyParser, RequestLogger, from_fn};
//! use veslo::{App, ContentType, Method, Route, Server, StatusCode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), veslo::Error> {
//!     let mut app = App::new();
//!     app.use_middleware(RequestLogger)
//!         .use_middleware(BodyParser);
//!
//!     app.route(Route::new(Method::Get, "/users/:id").with(from_fn(|ctx, _next| {
//!         Box::pin(async move {
//!             let id = ctx.req.param("id").unwrap_or("unknown");
//!             let body = format!(r#"{{"id":"{id}"}}"#);
//!             ctx.res
//!                 .write_head(StatusCode::OK, &[("content-type", ContentType::Json.as_str())])
//!                 .end(body)?;
//!             Ok(())
//!         })
//!     })))?;
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await
//! }
//! ```

mod app;
mod context;
mod error;
mod method;
mod path;
mod request;
mod response;
mod router;
mod server;
mod tls;

pub mod chain;
pub mod middleware;

pub use app::{App, WELCOME};
pub use chain::Next;
pub use context::Context;
pub use error::Error;
pub use http::StatusCode;
pub use method::Method;
pub use path::{Params, PathMatcher};
pub use request::{Body, Request};
pub use response::{ContentType, Response};
pub use router::{Route, Router};
pub use server::Server;
