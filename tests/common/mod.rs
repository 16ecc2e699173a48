use std::convert::Infallible;
use std::net::{SocketAddr, TcpListener};
use std::sync::OnceLock;
use std::task::{Context, Poll};
use std::time::Duration;

use cachering::proto::{GetRequest, GetResponse, PEER_SERVICE_GET_PATH};
use tokio_retry::Retry;
use tokio_retry::strategy::FixedInterval;
use tonic::body::Body;
use tonic::codec::ProstCodec;
use tonic::codegen::{Body as HttpBody, BoxFuture, Service, StdError};
use tonic::server::{Grpc, NamedService, UnaryService};
use tonic::{Request, Response, Status};
use tracing::Level;
use tracing_subscriber::fmt;

/// Key the test peer never has.
pub const MISSING_KEY: &str = "missing";

/// Key the test peer answers only after `SLOW_DELAY`.
pub const SLOW_KEY: &str = "slow";
pub const SLOW_DELAY: Duration = Duration::from_secs(2);

pub struct ServerState {
    pub addr: SocketAddr,
    server_handle: tokio::task::JoinHandle<Result<(), tonic::transport::Error>>,
}

impl ServerState {
    pub async fn shutdown(self) {
        self.server_handle.abort();
    }
}

static TRACING_INIT: OnceLock<()> = OnceLock::new();

pub fn init_tracing() {
    TRACING_INIT.get_or_init(|| {
        fmt().with_max_level(Level::INFO).init();
    });
}

pub fn find_free_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind to random port");
    listener.local_addr().expect("Failed to get local address")
}

/// Serves `cachering.v1.PeerService/Get`, answering every key with
/// `"{group}/{key}"` except `MISSING_KEY` and `SLOW_KEY`.
#[derive(Clone, Default)]
pub struct TestPeerServer;

impl NamedService for TestPeerServer {
    const NAME: &'static str = "cachering.v1.PeerService";
}

struct GetSvc;

impl UnaryService<GetRequest> for GetSvc {
    type Response = GetResponse;
    type Future = BoxFuture<Response<GetResponse>, Status>;

    fn call(&mut self, request: Request<GetRequest>) -> Self::Future {
        Box::pin(async move {
            let request = request.into_inner();
            match request.key.as_str() {
                MISSING_KEY => Err(Status::not_found(format!("{} not cached", request.key))),
                key => {
                    if key == SLOW_KEY {
                        tokio::time::sleep(SLOW_DELAY).await;
                    }
                    Ok(Response::new(GetResponse {
                        value: format!("{}/{}", request.group, request.key).into(),
                    }))
                },
            }
        })
    }
}

impl<B> Service<http::Request<B>> for TestPeerServer
where
    B: HttpBody + Send + 'static,
    B::Error: Into<StdError> + Send + 'static,
{
    type Response = http::Response<Body>;
    type Error = Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<B>) -> Self::Future {
        if req.uri().path() == PEER_SERVICE_GET_PATH {
            return Box::pin(async move {
                let mut grpc = Grpc::new(ProstCodec::<GetResponse, GetRequest>::default());
                Ok(grpc.unary(GetSvc, req).await)
            });
        }

        Box::pin(async move {
            let mut response = http::Response::new(Body::default());
            let headers = response.headers_mut();
            headers.insert(
                Status::GRPC_STATUS,
                (tonic::Code::Unimplemented as i32).into(),
            );
            headers.insert(
                http::header::CONTENT_TYPE,
                tonic::metadata::GRPC_CONTENT_TYPE,
            );
            Ok(response)
        })
    }
}

pub async fn start_test_server() -> ServerState {
    init_tracing();

    let addr = find_free_port();
    tracing::info!(address = %addr, "Starting test peer server");

    let server_handle = tokio::spawn(async move {
        tonic::transport::Server::builder()
            .add_service(TestPeerServer)
            .serve(addr)
            .await
    });

    let retry_strategy = FixedInterval::from_millis(20).take(100);
    Retry::spawn(retry_strategy, || tokio::net::TcpStream::connect(addr))
        .await
        .expect("Test peer server failed to start listening");

    ServerState { addr, server_handle }
}
