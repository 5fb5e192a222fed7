//! The application: global middleware, routes, settings, and the fallback
//! policy that guarantees one response per request.
//!
//! # Request lifecycle
//!
//! ```text
//! App::run(req, res)
//!   └─ chain::run([global middleware…, route-check…])
//!        ├─ a route claims the request  → its stack writes the response
//!        ├─ a unit fails                → 500 "500\nServer Error\n<message>"
//!        └─ nothing claimed the request → 404 "404\n<path> <METHOD> Cannot Found"
//! ```
//!
//! The fallbacks only ever write a response that is not finished yet. An app
//! with no routes at all answers requests for `/` with a fixed greeting
//! instead of the 404.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use http::StatusCode;
use tracing::{debug, error, warn};

use crate::chain::{self, Outcome};
use crate::context::Context;
use crate::error::Error;
use crate::middleware::{BoxedMiddleware, Middleware};
use crate::request::Request;
use crate::response::{ContentType, Response};
use crate::router::{Route, Router};

/// Body of the response to `/` when no routes are registered.
pub const WELCOME: &str = "Hi, I am veslo";

/// An HTTP application.
///
/// Build it mutably at startup, then hand it to [`Server::serve`](crate::Server::serve)
/// (or wrap it in an `Arc` and call [`App::run`] yourself). Once shared, the
/// middleware stack, routes, and settings are read-only.
///
/// ```rust
/// use std::sync::Arc;
/// use veslo::{App, Method, Request, Response, Route};
/// use veslo::middleware::from_fn;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), veslo::Error> {
/// let mut app = App::new();
/// app.route(Route::new(Method::Get, "/hello").with(from_fn(|ctx, _next| {
///     Box::pin(async move {
///         ctx.res.end("hello")?;
///         Ok(())
///     })
/// })))?;
///
/// let res = Arc::new(app).run(Request::new(Method::Get, "/hello"), Response::new()).await;
/// assert_eq!(res.body().as_ref(), b"hello");
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct App {
    stack: Vec<BoxedMiddleware>,
    router: Router,
    settings: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a unit to the global stack. Global units run, in registration
    /// order, before any route is considered.
    pub fn use_middleware(&mut self, unit: impl Middleware) -> &mut Self {
        self.stack.push(Arc::new(unit));
        self
    }

    /// Registers a route after all previously registered ones.
    ///
    /// Fails if the path pattern is malformed; nothing is registered then.
    pub fn route(&mut self, route: Route) -> Result<&mut Self, Error> {
        self.router.register(route)?;
        Ok(self)
    }

    /// Stores a setting. A later `set` with the same key replaces it.
    pub fn set<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) -> &mut Self {
        self.settings.insert(key.into(), Box::new(value));
        self
    }

    /// Looks up a setting. `None` if the key is absent or holds another type.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.settings.get(key)?.downcast_ref()
    }

    /// Runs one request through the application and returns the finished
    /// response.
    pub async fn run(self: Arc<Self>, req: Request, res: Response) -> Response {
        let units: Vec<BoxedMiddleware> = self.stack.iter().cloned().chain(self.router.units()).collect();
        let mut ctx = Context::new(req, res, Arc::clone(&self));

        let outcome = chain::run(&units, &mut ctx).await;
        self.finalize(&mut ctx, outcome);
        ctx.res
    }

    fn finalize(&self, ctx: &mut Context, outcome: Outcome) {
        let Context { req, res, .. } = ctx;

        if let Outcome::Failed { at, error } = outcome {
            error!(method = %req.method(), path = req.path(), unit = at, "middleware failed: {error:#}");
            if res.is_finished() {
                warn!("response already sent; 500 fallback skipped");
                return;
            }
            respond(res, StatusCode::INTERNAL_SERVER_ERROR, ContentType::Html, format!("500\nServer Error\n{error}"));
            return;
        }

        if res.is_finished() {
            return;
        }

        if req.resolved {
            // The route stack ran through without writing; flush what it set.
            debug!(path = req.path(), "route finished without ending the response");
            if let Err(e) = res.end(bytes::Bytes::new()) {
                warn!("{e}");
            }
        } else if self.router.is_empty() && req.path() == "/" {
            respond(res, StatusCode::OK, ContentType::Text, WELCOME.to_owned());
        } else {
            debug!(method = %req.method(), path = req.path(), "no route matched");
            let body = format!("404\n{} {} Cannot Found", req.path(), req.method());
            respond(res, StatusCode::NOT_FOUND, ContentType::Html, body);
        }
    }
}

fn respond(res: &mut Response, status: StatusCode, content_type: ContentType, body: String) {
    let length = body.len().to_string();
    let head = [("content-type", content_type.as_str()), ("content-length", length.as_str())];
    if let Err(e) = res.write_head(status, &head).end(body) {
        warn!("{e}");
    }
}
