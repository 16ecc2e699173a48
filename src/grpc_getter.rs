use std::time::{Duration, Instant};

use async_trait::async_trait;
use http::uri::PathAndQuery;
use opentelemetry::{
    KeyValue,
    global,
    metrics::{
        Counter,
        Histogram,
    },
};
use tonic::client::Grpc;
use tonic::codec::ProstCodec;
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Status};

use crate::peers::{PeerGetter, RemoteFetchError};
use crate::proto::{GetRequest, GetResponse, PEER_SERVICE_GET_PATH};

/// Fetches values from a remote peer over gRPC.
#[derive(Clone)]
pub struct GrpcPeerGetter {
    peer: String,
    grpc: Grpc<Channel>,
    timeout: Duration,

    request_counter: Counter<u64>,
    duration_histogram: Histogram<f64>,
}

impl GrpcPeerGetter {
    /// Build a getter for `addr` (`host:port`). The connection is established
    /// on first use; `timeout` bounds both connecting and each request.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect_lazy(addr: &str, timeout: Duration) -> Result<Self, RemoteFetchError> {
        let endpoint = Endpoint::from_shared(format!("http://{addr}"))
            .map_err(|e| RemoteFetchError::InvalidAddress {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?
            .connect_timeout(timeout);

        let meter = global::meter("cachering");
        Ok(Self {
            peer: addr.to_string(),
            grpc: Grpc::new(endpoint.connect_lazy()),
            timeout,
            request_counter: meter.u64_counter("cachering_peer_fetch_total").build(),
            duration_histogram: meter
                .f64_histogram("cachering_peer_fetch_duration_seconds")
                .build(),
        })
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    async fn call(&self, request: &GetRequest) -> Result<GetResponse, RemoteFetchError> {
        let mut grpc = self.grpc.clone();
        let fetch = async {
            if let Err(e) = grpc.ready().await {
                return Err(RemoteFetchError::Unreachable {
                    peer: self.peer.clone(),
                    message: e.to_string(),
                });
            }

            let path = PathAndQuery::from_static(PEER_SERVICE_GET_PATH);
            let codec = ProstCodec::<GetRequest, GetResponse>::default();
            grpc.unary(tonic::Request::new(request.clone()), path, codec)
                .await
                .map(tonic::Response::into_inner)
                .map_err(|status| map_status(&self.peer, request, status))
        };

        // One deadline covers waiting for the channel and the call itself.
        match tokio::time::timeout(self.timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(RemoteFetchError::Timeout {
                peer: self.peer.clone(),
                message: format!("no response within {:?}", self.timeout),
            }),
        }
    }
}

#[async_trait]
impl PeerGetter for GrpcPeerGetter {
    async fn get(&self, request: &GetRequest) -> Result<GetResponse, RemoteFetchError> {
        let start = Instant::now();
        let result = self.call(request).await;

        let status = match &result {
            Ok(_) => "ok",
            Err(RemoteFetchError::NotFound { .. }) => "not_found",
            Err(RemoteFetchError::Timeout { .. }) => "timeout",
            Err(_) => "error",
        };
        self.request_counter.add(
            1,
            &[
                KeyValue::new("peer", self.peer.clone()),
                KeyValue::new("status", status),
            ],
        );
        self.duration_histogram.record(
            start.elapsed().as_secs_f64(),
            &[KeyValue::new("peer", self.peer.clone())],
        );

        result
    }
}

fn map_status(peer: &str, request: &GetRequest, status: Status) -> RemoteFetchError {
    let peer = peer.to_string();
    let message = status.message().to_string();
    match status.code() {
        Code::NotFound => RemoteFetchError::NotFound {
            peer,
            group: request.group.clone(),
            key: request.key.clone(),
        },
        Code::Unavailable => RemoteFetchError::Unreachable { peer, message },
        Code::DeadlineExceeded => RemoteFetchError::Timeout { peer, message },
        code => RemoteFetchError::Status { peer, code, message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_status() {
        let request = GetRequest::new("scores", "Tom");

        let err = map_status("b:8002", &request, Status::not_found("no such key"));
        assert!(matches!(
            err,
            RemoteFetchError::NotFound { ref group, ref key, .. } if group == "scores" && key == "Tom"
        ));

        let err = map_status("b:8002", &request, Status::unavailable("connection refused"));
        assert!(matches!(err, RemoteFetchError::Unreachable { .. }));

        let err = map_status("b:8002", &request, Status::deadline_exceeded("slow"));
        assert!(matches!(err, RemoteFetchError::Timeout { .. }));

        let err = map_status("b:8002", &request, Status::internal("boom"));
        assert!(matches!(
            err,
            RemoteFetchError::Status { code: Code::Internal, ref message, .. } if message == "boom"
        ));
    }

    #[tokio::test]
    async fn test_invalid_address() {
        let result = GrpcPeerGetter::connect_lazy("not a host", Duration::from_millis(100));
        assert!(matches!(result, Err(RemoteFetchError::InvalidAddress { .. })));
    }

    #[tokio::test]
    async fn test_unreachable_peer_fails() {
        let getter = GrpcPeerGetter::connect_lazy("127.0.0.1:1", Duration::from_millis(500)).unwrap();
        assert_eq!(getter.peer(), "127.0.0.1:1");

        let err = getter
            .get(&GetRequest::new("scores", "Tom"))
            .await
            .unwrap_err();
        assert!(!matches!(err, RemoteFetchError::NotFound { .. }));
    }
}
