//! End-to-end tests over loopback TCP.

use std::net::SocketAddr;
use std::time::Duration;

use rawhttp::http::request::Request;
use rawhttp::http::response::{StatusCode, get_default_headers};
use rawhttp::http::writer::ResponseWriter;
use rawhttp::server::{Handler, HandlerError, Server};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Replies with the method, target and body it received.
struct Echo;

impl Handler for Echo {
    async fn handle<W>(
        &self,
        w: &mut ResponseWriter<W>,
        req: &Request,
    ) -> Result<(), HandlerError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let body = format!(
            "{} {} {}",
            req.request_line.method,
            req.request_line.target,
            String::from_utf8_lossy(&req.body)
        );

        let io = async {
            w.write_status_line(StatusCode::Ok).await?;
            w.write_headers(&get_default_headers(body.len())).await?;
            w.write_body(body.as_bytes()).await
        };
        io.await.map_err(|e| HandlerError::internal(e.to_string()))
    }
}

/// Fails without writing anything.
struct Refuse;

impl Handler for Refuse {
    async fn handle<W>(
        &self,
        _w: &mut ResponseWriter<W>,
        req: &Request,
    ) -> Result<(), HandlerError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        Err(HandlerError::bad_request(format!(
            "no thanks: {}",
            req.request_line.target
        )))
    }
}

/// Streams the target back in chunked form, then fails halfway.
struct HalfWritten;

impl Handler for HalfWritten {
    async fn handle<W>(
        &self,
        w: &mut ResponseWriter<W>,
        _req: &Request,
    ) -> Result<(), HandlerError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let mut headers = get_default_headers(0);
        headers.remove("content-length");
        headers.set("transfer-encoding", "chunked");

        let io = async {
            w.write_status_line(StatusCode::Ok).await?;
            w.write_headers(&headers).await?;
            w.write_chunked_body(b"partial").await?;
            Ok::<_, std::io::Error>(())
        };
        io.await.map_err(|e| HandlerError::internal(e.to_string()))?;

        Err(HandlerError::internal("upstream went away"))
    }
}

async fn send(addr: SocketAddr, raw: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw).await.unwrap();

    let mut out = Vec::new();
    timeout(Duration::from_secs(5), stream.read_to_end(&mut out))
        .await
        .expect("response within timeout")
        .unwrap();
    String::from_utf8(out).unwrap()
}

fn loopback(server: &Server) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], server.local_addr().port()))
}

#[tokio::test]
async fn test_serve_simple_request() {
    let mut server = Server::serve(0, Echo).await.unwrap();
    assert!(server.is_open());

    let resp = send(loopback(&server), b"GET /hello HTTP/1.1\r\nHost: localhost\r\n\r\n").await;

    assert!(resp.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(resp.contains("connection: close\r\n"));
    assert!(resp.contains("content-length: 11\r\n"));
    assert!(resp.ends_with("\r\n\r\nGET /hello "));

    server.close().await.unwrap();
    assert!(!server.is_open());
}

#[tokio::test]
async fn test_serve_request_with_body() {
    let mut server = Server::serve(0, Echo).await.unwrap();

    let resp = send(
        loopback(&server),
        b"POST /submit HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello",
    )
    .await;

    assert!(resp.ends_with("POST /submit hello"));
    server.close().await.unwrap();
}

#[tokio::test]
async fn test_malformed_request_gets_500_with_message() {
    let mut server = Server::serve(0, Echo).await.unwrap();

    let resp = send(loopback(&server), b"get / HTTP/1.1\r\n\r\n").await;

    assert!(resp.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    assert!(resp.ends_with("\r\n\r\nmalformed method: get"));
    server.close().await.unwrap();
}

#[tokio::test]
async fn test_incomplete_request_gets_500() {
    let mut server = Server::serve(0, Echo).await.unwrap();

    let mut stream = TcpStream::connect(loopback(&server)).await.unwrap();
    stream.write_all(b"GET / HTTP/1.1\r\nHost: loc").await.unwrap();
    stream.shutdown().await.unwrap();

    let mut out = String::new();
    timeout(Duration::from_secs(5), stream.read_to_string(&mut out))
        .await
        .unwrap()
        .unwrap();

    assert!(out.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    assert!(out.ends_with("incomplete request"));
    server.close().await.unwrap();
}

#[tokio::test]
async fn test_handler_error_is_written_for_handler() {
    let mut server = Server::serve(0, Refuse).await.unwrap();

    let resp = send(loopback(&server), b"GET /nope HTTP/1.1\r\n\r\n").await;

    assert!(resp.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    assert!(resp.ends_with("\r\n\r\nno thanks: /nope"));
    server.close().await.unwrap();
}

#[tokio::test]
async fn test_handler_error_after_writing_is_not_appended() {
    let mut server = Server::serve(0, HalfWritten).await.unwrap();

    let resp = send(loopback(&server), b"GET / HTTP/1.1\r\n\r\n").await;

    assert!(resp.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(resp.ends_with("\r\n\r\n7\r\npartial\r\n"));
    assert!(!resp.contains("upstream went away"));
    server.close().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_connections() {
    let mut server = Server::serve(0, Echo).await.unwrap();
    let addr = loopback(&server);

    let clients: Vec<_> = (0..16)
        .map(|i| {
            tokio::spawn(async move {
                let raw = format!("GET /client/{} HTTP/1.1\r\n\r\n", i);
                let resp = send(addr, raw.as_bytes()).await;
                assert!(resp.ends_with(&format!("GET /client/{} ", i)));
            })
        })
        .collect();

    for client in clients {
        client.await.unwrap();
    }
    server.close().await.unwrap();
}

#[tokio::test]
async fn test_close_with_connection_blocked_on_read() {
    let mut server = Server::serve(0, Echo).await.unwrap();
    let addr = loopback(&server);

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"GET /slow HTTP/1.1\r\n").await.unwrap();

    // Let the accept loop pick the connection up before closing.
    tokio::time::sleep(Duration::from_millis(200)).await;

    timeout(Duration::from_secs(5), server.close())
        .await
        .expect("close does not wait on connections")
        .unwrap();

    // The in-flight connection still completes.
    stream.write_all(b"\r\n").await.unwrap();
    let mut out = String::new();
    timeout(Duration::from_secs(5), stream.read_to_string(&mut out))
        .await
        .unwrap()
        .unwrap();
    assert!(out.ends_with("GET /slow "));

    // New connections are refused.
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_close_twice_is_an_error() {
    let mut server = Server::serve(0, Echo).await.unwrap();

    server.close().await.unwrap();
    let err = server.close().await.unwrap_err();

    assert_eq!(err.to_string(), "server already closed");
}

#[tokio::test]
async fn test_bind_failure_is_reported() {
    let first = Server::bind("127.0.0.1:0", Echo).await.unwrap();
    let taken = first.local_addr();

    assert!(Server::bind(taken, Echo).await.is_err());
}
