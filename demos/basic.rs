//! Minimal veslo demo — global middleware, JSON endpoints, and the fallbacks.
//!
//! Run with:
//!   cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/42
//!   curl -X POST http://localhost:3000/users \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice"}'
//!   curl http://localhost:3000/nothing-here      # 404 fallback
//!   curl http://localhost:3000/boom              # 500 fallback
//!
//! Set `VESLO_TLS_KEY` and `VESLO_TLS_CERT` to PEM files to serve HTTPS.

use veslo::middleware::{BodyParser, RequestLogger, from_fn};
use veslo::{App, Body, ContentType, Method, Route, Server, StatusCode};

#[tokio::main]
async fn main() -> Result<(), veslo::Error> {
    tracing_subscriber::fmt::init();

    let mut app = App::new();
    app.set("greeting", String::from("hello from veslo"));

    app.use_middleware(RequestLogger)
        .use_middleware(BodyParser)
        .use_middleware(from_fn(|ctx, next| {
            ctx.res.set_header("x-powered-by", "veslo");
            next.call();
            Box::pin(async { Ok(()) })
        }));

    // GET /users/:id
    app.route(Route::new(Method::Get, "/users/:id").with(from_fn(|ctx, _next| {
        Box::pin(async move {
            let id = ctx.req.param("id").unwrap_or("unknown");
            let greeting = ctx.app.get::<String>("greeting").map_or("", String::as_str);
            let body = serde_json::json!({ "id": id, "greeting": greeting }).to_string();
            ctx.res
                .write_head(StatusCode::OK, &[("content-type", ContentType::Json.as_str())])
                .end(body)?;
            Ok(())
        })
    })))?;

    // POST /users — echoes the parsed JSON body back with 201.
    app.route(Route::new(Method::Post, "/users").with(from_fn(|ctx, _next| {
        Box::pin(async move {
            let Some(Body::Json(user)) = ctx.req.body() else {
                ctx.res.write_head(StatusCode::BAD_REQUEST, &[]).end("expected a JSON body")?;
                return Ok(());
            };
            let body = user.to_string();
            ctx.res
                .write_head(StatusCode::CREATED, &[
                    ("content-type", ContentType::Json.as_str()),
                    ("location", "/users/99"),
                ])
                .end(body)?;
            Ok(())
        })
    })))?;

    // GET /boom — the error becomes a 500 with this message.
    app.route(Route::new(Method::Get, "/boom").with(from_fn(|_ctx, _next| {
        Box::pin(async { Err(anyhow::anyhow!("something broke")) })
    })))?;

    let mut server = Server::bind("0.0.0.0:3000");
    if let (Ok(key), Ok(cert)) = (std::env::var("VESLO_TLS_KEY"), std::env::var("VESLO_TLS_CERT")) {
        server = server.tls(key, cert);
    }
    server.serve(app).await
}
