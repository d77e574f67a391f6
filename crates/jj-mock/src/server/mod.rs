//! HTTP transport.
//!
//! Accepts connections with hyper, converts each request into the engine's
//! [`Request`](crate::request::Request), hands it to a [`Dispatcher`] and
//! writes the resulting response back.

mod conversion;
mod dispatch;

pub use conversion::{into_hyper, read_request, ServerBody};
pub use dispatch::Dispatcher;

use crate::config::ServerConfig;
use crate::history::HistoryRepository;
use crate::mock::{error_response, not_found_handler, MockService};
use crate::packing::UnpackContext;
use crate::resolver::Resolver;
use crate::response::build_client;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

async fn handle(
    req: hyper::Request<Incoming>,
    dispatcher: Arc<Dispatcher>,
) -> Result<hyper::Response<ServerBody>, Infallible> {
    let response = match read_request(req).await {
        Ok(request) => dispatcher.dispatch(request).await,
        Err(e) => {
            debug!("Failed to read request body: {}", e);
            error_response(400, format!("Failed to read request body: {e}"))
        }
    };
    Ok(into_hyper(response))
}

/// A bound mock server.
pub struct MockServer {
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    service: Arc<MockService>,
}

impl MockServer {
    /// Build the resolver and control plane and bind the listener.
    ///
    /// Port 0 binds an ephemeral port; see [`MockServer::local_addr`].
    pub async fn bind(config: &ServerConfig) -> Result<Self, anyhow::Error> {
        let client = build_client(
            config.relay.connect_timeout(),
            config.relay.request_timeout(),
        )?;
        let resolver = Arc::new(Resolver::reversed(not_found_handler()));
        let service = Arc::new(MockService::new(
            Arc::clone(&resolver),
            HistoryRepository::with_limit(config.history.limit),
            UnpackContext {
                client: Some(client),
            },
        ));
        let app = Arc::clone(&service).install()?;
        let dispatcher = Arc::new(Dispatcher::new(resolver, app));

        let addr = config.socket_addr()?;
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            dispatcher,
            service,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    pub fn service(&self) -> &Arc<MockService> {
        &self.service
    }

    /// Serve until `shutdown` fires.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), anyhow::Error> {
        let addr = self.listener.local_addr()?;
        info!("jj-mock listening on http://{}", addr);

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            let dispatcher = Arc::clone(&self.dispatcher);
                            tokio::spawn(async move {
                                let io = TokioIo::new(stream);
                                let service = service_fn(move |req| {
                                    handle(req, Arc::clone(&dispatcher))
                                });
                                if let Err(e) = http1::Builder::new()
                                    .serve_connection(io, service)
                                    .await
                                {
                                    debug!("Connection error from {}: {}", peer, e);
                                }
                            });
                        }
                        Err(e) => error!("Accept error on {}: {}", addr, e),
                    }
                }
                _ = shutdown.recv() => {
                    info!("jj-mock on {} shutting down", addr);
                    break;
                }
            }
        }
        Ok(())
    }
}

/// A server running on a background task.
pub struct RunningServer {
    addr: SocketAddr,
    service: Arc<MockService>,
    shutdown: broadcast::Sender<()>,
    task: JoinHandle<Result<(), anyhow::Error>>,
}

impl RunningServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// `http://host:port` of the server.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn service(&self) -> &Arc<MockService> {
        &self.service
    }

    /// Stop accepting connections and wait for the accept loop to exit.
    pub async fn shutdown(self) -> Result<(), anyhow::Error> {
        let _ = self.shutdown.send(());
        self.task.await?
    }
}

/// Bind and spawn a server in the background.
pub async fn start(config: &ServerConfig) -> Result<RunningServer, anyhow::Error> {
    let server = MockServer::bind(config).await?;
    let addr = server.local_addr()?;
    let service = Arc::clone(server.service());
    let (shutdown, rx) = broadcast::channel(1);
    let task = tokio::spawn(server.run(rx));
    Ok(RunningServer {
        addr,
        service,
        shutdown,
        task,
    })
}
