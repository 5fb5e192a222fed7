//! Ordered request router.
//!
//! Routes are kept in registration order and evaluated one after another,
//! each as its own middleware unit appended after the global stack. The first
//! entry whose method and pattern match claims the request by setting
//! `resolved`; every later entry sees the flag and steps aside, so exactly one
//! route stack runs per request even when patterns overlap.

use std::sync::Arc;

use tracing::debug;

use crate::chain::{self, Next, Outcome};
use crate::context::Context;
use crate::error::Error;
use crate::method::Method;
use crate::middleware::{BoxFuture, BoxedMiddleware, Middleware};
use crate::path::{Params, PathMatcher};

/// A route to register: method, path pattern, and the units that handle it.
///
/// ```rust
/// use veslo::{Method, Route};
/// use veslo::middleware::from_fn;
///
/// let route = Route::new(Method::Get, "/users/:id").with(from_fn(|ctx, _next| {
///     Box::pin(async move {
///         let body = format!("user {}", ctx.req.param("id").unwrap_or("?"));
///         ctx.res.end(body)?;
///         Ok(())
///     })
/// }));
/// # let _ = route;
/// ```
pub struct Route {
    pub method: Method,
    pub path: String,
    pub stack: Vec<BoxedMiddleware>,
}

impl Route {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), stack: Vec::new() }
    }

    /// Appends a unit to this route's stack. Returns `self` for chaining.
    pub fn with(mut self, unit: impl Middleware) -> Self {
        self.stack.push(Arc::new(unit));
        self
    }
}

/// A registered route with its pattern compiled. Immutable once built.
pub(crate) struct RouteEntry {
    method: Method,
    matcher: PathMatcher,
    stack: Vec<BoxedMiddleware>,
}

impl RouteEntry {
    fn compile(route: Route) -> Result<Self, Error> {
        let matcher = PathMatcher::compile(&route.path)?;
        Ok(Self { method: route.method, matcher, stack: route.stack })
    }

    /// Path captures if this entry may claim `ctx.req`.
    fn claim(&self, ctx: &Context) -> Option<Params> {
        if ctx.req.resolved || ctx.req.method() != self.method {
            return None;
        }
        self.matcher.matches(ctx.req.path())
    }
}

/// The middleware unit standing in for one route entry in the top-level chain.
struct RouteCheck(Arc<RouteEntry>);

impl Middleware for RouteCheck {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            let entry = &self.0;
            if let Some(params) = entry.claim(ctx) {
                debug!(method = %entry.method, pattern = entry.matcher.pattern(), "route matched");
                ctx.req.resolved = true;
                ctx.req.params = params;

                // A failure in the route stack fails the outer run too.
                if let Outcome::Failed { error, .. } = chain::run(&entry.stack, ctx).await {
                    return Err(error);
                }
            }
            next.call();
            Ok(())
        })
    }
}

/// Registration-ordered route entries.
#[derive(Default)]
pub struct Router {
    units: Vec<BoxedMiddleware>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles and appends `route`. Entries are never removed or reordered.
    pub fn register(&mut self, route: Route) -> Result<(), Error> {
        let entry = RouteEntry::compile(route)?;
        self.units.push(Arc::new(RouteCheck(Arc::new(entry))));
        Ok(())
    }

    /// One route-check unit per entry, in registration order.
    pub fn units(&self) -> impl Iterator<Item = BoxedMiddleware> + '_ {
        self.units.iter().cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}
