//! The server over real loopback sockets.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use veslo::middleware::{BodyParser, from_fn};
use veslo::{App, Body, Error, Method, Route, Server};

/// Sends one raw HTTP/1.1 request and returns the whole response as text.
async fn roundtrip(addr: &str, request: &str) -> String {
    let mut stream = connect(addr).await;
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut out = Vec::new();
    stream.read_to_end(&mut out).await.unwrap();
    String::from_utf8(out).unwrap()
}

/// Retries until the server has bound its port.
async fn connect(addr: &str) -> TcpStream {
    for _ in 0..50 {
        if let Ok(stream) = TcpStream::connect(addr).await {
            return stream;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("server at {addr} never came up");
}

/// Reads from `stream` until `needle` shows up or the peer closes.
async fn read_until<S: AsyncRead + Unpin>(stream: &mut S, needle: &str) -> String {
    let mut out = Vec::new();
    let mut buf = [0u8; 1024];
    while !String::from_utf8_lossy(&out).contains(needle) {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => out.extend_from_slice(&buf[..n]),
        }
    }
    String::from_utf8(out).unwrap()
}

fn app() -> App {
    let mut app = App::new();
    app.use_middleware(BodyParser);
    app.route(Route::new(Method::Get, "/hello/:name").with(from_fn(|ctx, _next| {
        Box::pin(async move {
            let body = format!("hello {}", ctx.req.param("name").unwrap_or_default());
            ctx.res.end(body)?;
            Ok(())
        })
    })))
    .unwrap();
    app.route(Route::new(Method::Post, "/echo").with(from_fn(|ctx, _next| {
        Box::pin(async move {
            let body = match ctx.req.body() {
                Some(Body::Text(text)) => text.clone(),
                Some(Body::Json(value)) => value.to_string(),
                None => String::new(),
            };
            ctx.res.end(body)?;
            Ok(())
        })
    })))
    .unwrap();
    app
}

#[tokio::test]
async fn serves_routes_and_fallbacks() {
    let addr = "127.0.0.1:28431";
    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(
        Server::bind(addr).serve_with_shutdown(app(), async move { let _ = stopped.await; }),
    );

    let res = roundtrip(addr, "GET /hello/oar HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n\r\n").await;
    assert!(res.starts_with("HTTP/1.1 200 OK"), "{res}");
    assert!(res.ends_with("hello oar"), "{res}");

    let res = roundtrip(addr, "GET /missing HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n\r\n").await;
    assert!(res.starts_with("HTTP/1.1 404 Not Found"), "{res}");
    assert!(res.ends_with("404\n/missing GET Cannot Found"), "{res}");

    let res = roundtrip(
        addr,
        "POST /echo HTTP/1.1\r\nhost: localhost\r\ncontent-length: 6\r\nconnection: close\r\n\r\npaddle",
    )
    .await;
    assert!(res.ends_with("paddle"), "{res}");

    let res = roundtrip(addr, "PROPFIND /hello/x HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n\r\n").await;
    assert!(res.starts_with("HTTP/1.1 405"), "{res}");

    stop.send(()).unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn invalid_address_is_rejected() {
    let result = Server::bind("not an address").serve_with_shutdown(App::new(), async {}).await;
    assert!(matches!(result, Err(Error::InvalidAddress(_))));
}

#[tokio::test]
async fn missing_tls_material_prevents_startup() {
    let addr = "127.0.0.1:28432";
    let result = Server::bind(addr)
        .tls("/nonexistent/server.key", "/nonexistent/server.crt")
        .serve_with_shutdown(App::new(), std::future::pending())
        .await;
    assert!(matches!(result, Err(Error::Tls(_))));

    // Nothing was ever bound.
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn shutdown_closes_idle_keep_alive_connections() {
    let addr = "127.0.0.1:28433";
    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(
        Server::bind(addr).serve_with_shutdown(app(), async move { let _ = stopped.await; }),
    );

    // One request, then leave the connection open and idle.
    let mut idle = connect(addr).await;
    idle.write_all(b"GET /hello/idle HTTP/1.1\r\nhost: localhost\r\n\r\n").await.unwrap();
    let res = read_until(&mut idle, "hello idle").await;
    assert!(res.starts_with("HTTP/1.1 200 OK"), "{res}");

    stop.send(()).unwrap();
    let finished = tokio::time::timeout(Duration::from_secs(3), server).await;
    assert!(finished.is_ok(), "server kept running with an idle connection open");
    finished.unwrap().unwrap().unwrap();

    // The server closed its end.
    let mut buf = [0u8; 16];
    assert!(matches!(idle.read(&mut buf).await, Ok(0) | Err(_)));
}

fn scratch(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("veslo-server-{}-{name}", std::process::id()));
    std::fs::write(&path, contents).unwrap();
    path
}

#[tokio::test]
async fn serves_requests_over_tls() {
    let addr = "127.0.0.1:28434";
    let pair = rcgen::generate_simple_self_signed(vec!["localhost".to_owned()]).unwrap();
    let cert = scratch("tls.crt", &pair.cert.pem());
    let key = scratch("tls.key", &pair.key_pair.serialize_pem());

    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(
        Server::bind(addr)
            .tls(&key, &cert)
            .serve_with_shutdown(app(), async move { let _ = stopped.await; }),
    );

    let mut roots = RootCertStore::empty();
    roots.add(pair.cert.der().clone()).unwrap();
    let config = ClientConfig::builder_with_provider(Arc::new(tokio_rustls::rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_root_certificates(roots)
        .with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(config));

    let tcp = connect(addr).await;
    let mut stream = connector
        .connect(ServerName::try_from("localhost").unwrap(), tcp)
        .await
        .unwrap();
    stream
        .write_all(b"GET /hello/tls HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n\r\n")
        .await
        .unwrap();
    let res = read_until(&mut stream, "hello tls").await;
    assert!(res.starts_with("HTTP/1.1 200 OK"), "{res}");
    assert!(res.ends_with("hello tls"), "{res}");

    stop.send(()).unwrap();
    server.await.unwrap().unwrap();
}
