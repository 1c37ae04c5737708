use rawhttp::config::Config;
use rawhttp::http::request::Request;
use rawhttp::http::response::{get_default_headers, StatusCode};
use rawhttp::http::writer::ResponseWriter;
use rawhttp::server::{Handler, HandlerError, Server};
use tokio::io::AsyncWrite;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::load()?;

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_max_level(cfg.log_level()?)
        .init();

    let mut server = Server::bind(cfg.listen_addr(), Demo).await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    server.close().await
}

struct Demo;

impl Handler for Demo {
    async fn handle<W>(
        &self,
        w: &mut ResponseWriter<W>,
        req: &Request,
    ) -> Result<(), HandlerError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let target = req.request_line.target.as_str();

        let result = if let Some(count) = target.strip_prefix("/chunked/") {
            let count: usize = count
                .parse()
                .map_err(|_| HandlerError::bad_request(format!("not a chunk count: {}", count)))?;
            write_chunked(w, count).await
        } else {
            let (status, message) = match target {
                "/yourproblem" => (StatusCode::BadRequest, "Your request honestly kinda sucked."),
                "/myproblem" => (StatusCode::InternalServerError, "Okay, you know what? This one is on me."),
                _ => (StatusCode::Ok, "Your request was an absolute banger."),
            };
            write_page(w, status, message).await
        };

        result.map_err(|e| HandlerError::internal(e.to_string()))
    }
}

async fn write_page<W>(
    w: &mut ResponseWriter<W>,
    status: StatusCode,
    message: &str,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let body = format!(
        "<html>\n<head><title>{status}</title></head>\n<body>\n<h1>{}</h1>\n<p>{message}</p>\n</body>\n</html>\n",
        status.reason_phrase()
    );

    let mut headers = get_default_headers(body.len());
    headers.overwrite("content-type", "text/html");

    w.write_status_line(status).await?;
    w.write_headers(&headers).await?;
    w.write_body(body.as_bytes()).await
}

async fn write_chunked<W>(w: &mut ResponseWriter<W>, count: usize) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut headers = get_default_headers(0);
    headers.remove("content-length");
    headers.set("transfer-encoding", "chunked");
    headers.set("trailer", "X-Content-Length");

    w.write_status_line(StatusCode::Ok).await?;
    w.write_headers(&headers).await?;

    let mut total = 0;
    for i in 0..count {
        let line = format!("line {}\n", i);
        total += line.len();
        w.write_chunked_body(line.as_bytes()).await?;
    }

    w.write_chunked_body_done().await?;
    w.write_trailers([("X-Content-Length", total.to_string())]).await
}
