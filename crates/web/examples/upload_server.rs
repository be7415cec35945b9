use std::error::Error;

use ferry_http::connection::ConnectionId;
use ferry_http::multipart::{boundary_from_headers, collect_parts};
use ferry_http::protocol::body::ReqBody;
use ferry_web::{DispatchTable, RequestHandler, Server, handler_fn};
use http::{Request, Response, StatusCode};
use http_body_util::BodyExt;
use tracing::info;

async fn hello(_request: Request<ReqBody>) -> Result<Response<&'static str>, Box<dyn Error + Send + Sync>> {
    Ok(Response::new("Hello World!\r\n"))
}

async fn echo(request: Request<ReqBody>) -> Result<Response<String>, Box<dyn Error + Send + Sync>> {
    let connection = request.extensions().get::<ConnectionId>().map(ConnectionId::id);
    let body = request.into_body().collect().await?.to_bytes();
    info!(?connection, size = body.len(), "echo request body");
    Ok(Response::new(String::from_utf8_lossy(&body).into_owned()))
}

async fn upload(request: Request<ReqBody>) -> Result<Response<String>, Box<dyn Error + Send + Sync>> {
    let boundary = match boundary_from_headers(request.headers()) {
        Ok(boundary) => boundary,
        Err(e) => {
            let mut response = Response::new(e.to_string());
            *response.status_mut() = StatusCode::BAD_REQUEST;
            return Ok(response);
        }
    };

    let parts = collect_parts(request.into_body(), &boundary).await?;

    let mut summary = String::new();
    for part in &parts {
        let name = part.headers().field_name().unwrap_or_default();
        summary.push_str(&format!("{name}: {} bytes\r\n", part.body().len()));
    }
    Ok(Response::new(summary))
}

#[tokio::main]
async fn main() {
    let dispatch_table = DispatchTable::<Box<dyn RequestHandler>>::builder()
        .add_exact_match("/", Box::new(handler_fn(hello)))
        .add_prefix_match("/echo", Box::new(handler_fn(echo)))
        .add_prefix_match("/upload", Box::new(handler_fn(upload)))
        .add_name_match("hello", Box::new(handler_fn(hello)))
        .build();

    let server = match Server::builder().bind("127.0.0.1:8080").dispatch_table(dispatch_table).build() {
        Ok(server) => server,
        Err(e) => {
            eprintln!("can't build server: {e}");
            return;
        }
    };

    server.start().await;
}
