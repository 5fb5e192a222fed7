//! Access logging.

use std::time::Instant;

use tracing::info;

use crate::chain::Next;
use crate::context::Context;
use crate::middleware::{BoxFuture, Middleware};

/// Emits one `tracing` event when a request arrives and one when its response
/// is finished, with the elapsed time in milliseconds.
///
/// Purely observational: it never writes the response and always continues.
/// Register it first so the timing covers every other unit.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestLogger;

impl Middleware for RequestLogger {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next) -> BoxFuture<'a, anyhow::Result<()>> {
        let started = Instant::now();
        let method = ctx.req.method();
        let url = ctx.req.url().to_owned();
        info!(%method, url = %url, "[<=] incoming message");

        ctx.res.on_finish(move |res| {
            let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            info!(%method, url = %url, status = res.status().as_u16(), elapsed_ms, "[=>] time cost");
        });

        next.call();
        Box::pin(std::future::ready(Ok(())))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tracing_test::traced_test;

    use super::*;
    use crate::middleware::from_fn;
    use crate::{App, Method, Request, Response, Route};

    #[traced_test]
    #[tokio::test]
    async fn logs_arrival_and_completion() {
        let mut app = App::new();
        app.use_middleware(RequestLogger);
        app.route(Route::new(Method::Get, "/test").with(from_fn(|ctx, _next| {
            Box::pin(async move {
                ctx.res.end("0")?;
                Ok(())
            })
        })))
        .unwrap();

        let res = Arc::new(app).run(Request::new(Method::Get, "/test"), Response::new()).await;
        assert_eq!(res.status().as_u16(), 200);
        assert!(logs_contain("[<=] incoming message"));
        assert!(logs_contain("[=>] time cost"));
        assert!(logs_contain("status=200"));
    }

    #[traced_test]
    #[tokio::test]
    async fn fallback_responses_are_logged_too() {
        let mut app = App::new();
        app.use_middleware(RequestLogger);

        let res = Arc::new(app).run(Request::new(Method::Get, "/nowhere"), Response::new()).await;
        assert_eq!(res.status().as_u16(), 404);
        assert!(logs_contain("status=404"));
    }
}
