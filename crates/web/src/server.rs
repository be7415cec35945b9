use std::error::Error;
use std::future::Future;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::pin::Pin;
use std::sync::Arc;

use ferry_http::connection::HttpConnection;
use ferry_http::handler::Handler;
use ferry_http::protocol::body::ReqBody;
use http::{Request, Response, StatusCode};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::body::ResponseBody;
use crate::dispatch::DispatchTable;
use crate::handler::RequestHandler;

type BoxedHandler = Box<dyn RequestHandler>;

pub struct ServerBuilder {
    dispatch_table: Option<DispatchTable<BoxedHandler>>,
    address: Option<io::Result<Vec<SocketAddr>>>,
}

impl ServerBuilder {
    fn new() -> Self {
        Self { dispatch_table: None, address: None }
    }

    /// Address to listen on. Resolution errors are reported by [`ServerBuilder::build`].
    pub fn bind<A: ToSocketAddrs>(mut self, address: A) -> Self {
        self.address = Some(address.to_socket_addrs().map(Iterator::collect));
        self
    }

    pub fn dispatch_table(mut self, dispatch_table: DispatchTable<BoxedHandler>) -> Self {
        self.dispatch_table = Some(dispatch_table);
        self
    }

    pub fn build(self) -> Result<Server, ServerBuildError> {
        let dispatch_table = self.dispatch_table.ok_or(ServerBuildError::MissingDispatchTable)?;
        let address = self.address.ok_or(ServerBuildError::MissingAddress)?.map_err(ServerBuildError::from)?;
        if address.is_empty() {
            return Err(ServerBuildError::InvalidAddress { source: io::ErrorKind::AddrNotAvailable.into() });
        }
        Ok(Server { dispatch_table, address })
    }
}

impl std::fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerBuilder").field("dispatch_table", &self.dispatch_table).finish_non_exhaustive()
    }
}

/// Accepts connections and dispatches every request through a [`DispatchTable`].
///
/// Requests whose path resolves to no handler are answered with `404 Not Found`.
pub struct Server {
    dispatch_table: DispatchTable<BoxedHandler>,
    address: Vec<SocketAddr>,
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("dispatch table must be set")]
    MissingDispatchTable,
    #[error("address must be set")]
    MissingAddress,
    #[error("address can't be resolved: {source}")]
    InvalidAddress {
        #[from]
        source: io::Error,
    },
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn dispatch_table(&self) -> &DispatchTable<BoxedHandler> {
        &self.dispatch_table
    }

    /// Invokes the handler registered under `name`, bypassing path resolution.
    pub async fn call_named(
        &self,
        name: &str,
        request: Request<ReqBody>,
    ) -> Result<Response<ResponseBody>, Box<dyn Error + Send + Sync>> {
        match self.dispatch_table.resolve_by_name(name) {
            Some(handler) => handler.invoke(request).await,
            None => {
                warn!(name, "no handler registered under this name");
                Ok(not_found())
            }
        }
    }

    pub async fn start(self) {
        let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            debug!("global subscriber already set");
        }

        info!("start listening at {:?}", self.address);
        let tcp_listener = match TcpListener::bind(self.address.as_slice()).await {
            Ok(tcp_listener) => tcp_listener,
            Err(e) => {
                error!(cause = %e, "bind server error");
                return;
            }
        };

        let handler = Arc::new(self);
        loop {
            let (tcp_stream, remote_addr) = match tcp_listener.accept().await {
                Ok(stream_and_addr) => stream_and_addr,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            };

            let handler = handler.clone();

            tokio::spawn(async move {
                let (reader, writer) = tcp_stream.into_split();
                let connection = HttpConnection::new(reader, writer);
                let id = connection.identity().id();
                debug!(connection = id, %remote_addr, "accepted connection");
                match connection.process(handler).await {
                    Ok(()) => {
                        info!(connection = id, "finished process, connection shutdown");
                    }
                    Err(e) => {
                        error!(connection = id, cause = %e, "service has error, connection shutdown");
                    }
                }
            });
        }
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server").field("dispatch_table", &self.dispatch_table).field("address", &self.address).finish()
    }
}

fn not_found() -> Response<ResponseBody> {
    let mut response = Response::new(ResponseBody::empty());
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}

impl Handler for Server {
    type RespBody = ResponseBody;
    type Error = Box<dyn Error + Send + Sync>;
    type Fut<'fut> = Pin<Box<dyn Future<Output = Result<Response<Self::RespBody>, Self::Error>> + Send + 'fut>>;

    fn call(&self, req: Request<ReqBody>) -> Self::Fut<'_> {
        Box::pin(async move {
            match self.dispatch_table.resolve_by_path(req.uri().path()) {
                Some(handler) => handler.invoke(req).await,
                None => {
                    info!(path = req.uri().path(), "no handler for path");
                    Ok(not_found())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler_fn;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn text_handler(text: &'static str) -> BoxedHandler {
        Box::new(handler_fn(move |_request: Request<ReqBody>| async move {
            Ok::<_, Box<dyn Error + Send + Sync>>(Response::new(text))
        }))
    }

    fn server() -> Server {
        let dispatch_table = DispatchTable::builder()
            .add_exact_match("/hello", text_handler("exact"))
            .add_prefix_match("/static", text_handler("static"))
            .add_extension_match("/static", "css", text_handler("css"))
            .add_name_match("status", text_handler("named"))
            .build();

        Server::builder().bind("127.0.0.1:0").dispatch_table(dispatch_table).build().unwrap()
    }

    async fn roundtrip(server: Server, input: &str) -> String {
        let (mut client, server_side) = tokio::io::duplex(16 * 1024);
        let (reader, writer) = tokio::io::split(server_side);
        let connection = HttpConnection::new(reader, writer);

        let client_side = async {
            client.write_all(input.as_bytes()).await.unwrap();
            client.shutdown().await.unwrap();
            let mut output = String::new();
            client.read_to_string(&mut output).await.unwrap();
            output
        };

        let (result, output) = tokio::join!(connection.process(Arc::new(server)), client_side);
        result.unwrap();
        output
    }

    #[test]
    fn build_requires_table_and_address() {
        let missing_table = Server::builder().bind("127.0.0.1:0").build();
        assert!(matches!(missing_table, Err(ServerBuildError::MissingDispatchTable)));

        let missing_address = Server::builder().dispatch_table(DispatchTable::builder().build()).build();
        assert!(matches!(missing_address, Err(ServerBuildError::MissingAddress)));

        let invalid = Server::builder().bind("not an address").dispatch_table(DispatchTable::builder().build()).build();
        assert!(matches!(invalid, Err(ServerBuildError::InvalidAddress { .. })));
    }

    #[tokio::test]
    async fn dispatches_by_path() {
        let output = roundtrip(
            server(),
            "GET /hello HTTP/1.1\r\n\r\nGET /static/site.css HTTP/1.1\r\n\r\nGET /static/logo.png HTTP/1.1\r\n\r\n",
        )
        .await;

        let exact = output.find("exact").unwrap();
        let css = output.find("css").unwrap();
        let fallback = output.rfind("static").unwrap();
        assert!(exact < css && css < fallback);
    }

    #[tokio::test]
    async fn unresolved_path_is_not_found() {
        let output = roundtrip(server(), "GET /missing HTTP/1.1\r\n\r\n").await;
        assert!(output.starts_with("HTTP/1.1 404 Not Found\r\n"));
    }

    #[tokio::test]
    async fn call_named_bypasses_paths() {
        let server = server();

        let response = server.call_named("status", Request::new(empty_body())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = server.call_named("/hello", Request::new(empty_body())).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    fn empty_body() -> ReqBody {
        use ferry_http::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestHeader};

        let mut payload = futures::stream::iter(vec![Ok::<Message<(RequestHeader, PayloadSize)>, ParseError>(
            Message::Payload(PayloadItem::Eof),
        )]);
        let (req_body, _sender) = ReqBody::body_channel(&mut payload, PayloadSize::Empty);
        req_body
    }
}
