//! Request body parsing.

use anyhow::Context as _;

use crate::chain::Next;
use crate::context::Context;
use crate::middleware::{BoxFuture, Middleware};
use crate::request::Body;

/// Parses the raw request body into [`Request::body`](crate::Request::body).
///
/// `application/json` bodies become [`Body::Json`]; a body that is not valid
/// JSON fails the unit, which the application turns into a 500. Anything else
/// becomes [`Body::Text`] (invalid UTF-8 is replaced). An empty body leaves
/// the slot untouched. Always continues the chain on success.
#[derive(Clone, Copy, Debug, Default)]
pub struct BodyParser;

impl Middleware for BodyParser {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            let raw = ctx.req.raw_body();
            if !raw.is_empty() {
                let body = if is_json(ctx.req.header("content-type")) {
                    Body::Json(serde_json::from_slice(raw).context("invalid JSON body")?)
                } else {
                    Body::Text(String::from_utf8_lossy(raw).into_owned())
                };
                ctx.req.set_body(body);
            }
            next.call();
            Ok(())
        })
    }
}

fn is_json(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::chain::{self, Outcome};
    use crate::middleware::BoxedMiddleware;
    use crate::{App, Method, Request, Response};

    async fn parse(req: Request) -> (Context, Outcome) {
        let units: Vec<BoxedMiddleware> = vec![Arc::new(BodyParser)];
        let mut ctx = Context::new(req, Response::new(), Arc::new(App::new()));
        let outcome = chain::run(&units, &mut ctx).await;
        (ctx, outcome)
    }

    #[tokio::test]
    async fn json_bodies_are_decoded() {
        let req = Request::new(Method::Post, "/test")
            .with_header("Content-Type", "application/json; charset=utf-8")
            .with_raw_body(r#"{"a":1,"b":"2","c":3,"d":"4"}"#);
        let (ctx, outcome) = parse(req).await;
        assert!(matches!(outcome, Outcome::Completed));
        assert_eq!(ctx.req.body(), Some(&Body::Json(json!({"a": 1, "b": "2", "c": 3, "d": "4"}))));
    }

    #[tokio::test]
    async fn other_bodies_are_text() {
        let req = Request::new(Method::Post, "/test").with_raw_body("plain words");
        let (ctx, _) = parse(req).await;
        assert_eq!(ctx.req.body(), Some(&Body::Text("plain words".to_owned())));
    }

    #[tokio::test]
    async fn empty_body_is_left_alone() {
        let (ctx, outcome) = parse(Request::new(Method::Get, "/")).await;
        assert!(matches!(outcome, Outcome::Completed));
        assert!(ctx.req.body().is_none());
    }

    #[tokio::test]
    async fn malformed_json_fails_the_unit() {
        let req = Request::new(Method::Post, "/test")
            .with_header("content-type", "application/json")
            .with_raw_body("{not json");
        let (_, outcome) = parse(req).await;
        match outcome {
            Outcome::Failed { error, .. } => assert_eq!(error.to_string(), "invalid JSON body"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
