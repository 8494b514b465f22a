//! The HTTP service: request routing, body handling, and the accept loop.

use std::convert::Infallible;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{debug, warn};
use ulid::Ulid;
use warden_common::now_ms;
use warden_envelope::{Envelope, Identity, KeyAuthority};
use warden_ledger::{LimitSpec, RequestLimitEvaluator, ResourceRequest, UsageEnforcer};
use warden_storage::{StorageBackend, TransactionalStorageBackend, WardenStorageError};
use warden_trust::TrustGraphStore;

use crate::admit_user;
use crate::api::{self, Failure};

/// Declared cost of an example resource request, in bytes.
const EXAMPLE_REQUEST_SIZE_BYTES: u64 = 1024;

/// Default self-declared limit attached to example resource requests:
/// 2048 bytes per rolling second.
const EXAMPLE_BANDWIDTH_BYTES: u64 = 2048;
const EXAMPLE_BANDWIDTH_WINDOW_MS: u64 = 1000;

/// The assembled server-side components behind the HTTP surface.
///
/// The service owns one storage backend and builds the trust graph,
/// evaluator and enforcer over it; everything is cheaply cloneable so
/// each connection task gets its own handle.
#[derive(Clone)]
pub struct WardenService<Backend>
where
    Backend: StorageBackend<Key = Vec<u8>, Value = Vec<u8>, Error = WardenStorageError>
        + TransactionalStorageBackend<
            Address = Vec<u8>,
            Value = Vec<u8>,
            Error = WardenStorageError,
        > + Clone
        + Send
        + Sync,
{
    authority: KeyAuthority,
    trust: TrustGraphStore<Backend>,
    evaluator: RequestLimitEvaluator<Backend>,
    enforcer: UsageEnforcer<Backend>,
}

impl<Backend> WardenService<Backend>
where
    Backend: StorageBackend<Key = Vec<u8>, Value = Vec<u8>, Error = WardenStorageError>
        + TransactionalStorageBackend<
            Address = Vec<u8>,
            Value = Vec<u8>,
            Error = WardenStorageError,
        > + Clone
        + Send
        + Sync,
{
    /// Assemble the service over one backend, signing as `authority`.
    pub fn new(backend: Backend, authority: KeyAuthority) -> Self {
        let trust = TrustGraphStore::new(backend.clone());
        let evaluator = RequestLimitEvaluator::new(backend.clone(), authority.clone());
        let enforcer = UsageEnforcer::new(backend, trust.clone());

        Self {
            authority,
            trust,
            evaluator,
            enforcer,
        }
    }

    /// The identity this server signs and issues as.
    pub fn identity(&self) -> &Identity {
        self.authority.identity()
    }

    /// The trust graph underlying this service.
    pub fn trust(&self) -> &TrustGraphStore<Backend> {
        &self.trust
    }

    fn banner(&self) -> Response<Full<Bytes>> {
        text_response(
            StatusCode::OK,
            format!("warden resource server, serving as {}\n", self.identity()),
        )
    }

    async fn example_resource_request(&self, path: &str) -> Response<Full<Bytes>> {
        let request = ResourceRequest {
            resource_url: path.to_owned(),
            timestamp: now_ms(),
            limits: vec![LimitSpec::Bandwidth {
                bytes: EXAMPLE_BANDWIDTH_BYTES,
                per_ms: EXAMPLE_BANDWIDTH_WINDOW_MS,
            }],
            size_bytes: EXAMPLE_REQUEST_SIZE_BYTES,
            request_id: Ulid::new().to_string(),
        };

        match Envelope::seal(&request, &self.authority).await {
            Ok(envelope) => json_response(StatusCode::OK, &envelope),
            Err(error) => failure_response(api::from_envelope(error)),
        }
    }

    async fn authorize_request(&self, body: &[u8]) -> Response<Full<Bytes>> {
        let Some(envelope) = parse_envelope(body) else {
            return invalid_body_response();
        };

        match self.evaluator.authorize(&envelope, now_ms(), false).await {
            Ok(authorization) => json_response(StatusCode::OK, &authorization),
            Err(error) => failure_response(api::from_authorize(error)),
        }
    }

    async fn add_user(&self, body: &[u8]) -> Response<Full<Bytes>> {
        let Some(envelope) = parse_envelope(body) else {
            return invalid_body_response();
        };

        match admit_user(&self.trust, &envelope, now_ms()).await {
            Ok(()) => json_response(
                StatusCode::OK,
                &json!({ "message": "User added successfully" }),
            ),
            Err(error) => failure_response(api::from_admission(error)),
        }
    }

    async fn get_protected_resource(&self, body: &[u8]) -> Response<Full<Bytes>> {
        let Some(envelope) = parse_envelope(body) else {
            return invalid_body_response();
        };

        match self
            .enforcer
            .serve(&envelope, self.authority.identity(), now_ms())
            .await
        {
            Ok(payload) => Response::builder()
                .status(StatusCode::OK)
                .header(hyper::header::CONTENT_TYPE, "application/octet-stream")
                .body(Full::new(Bytes::from_static(payload)))
                .unwrap(),
            Err(error) => failure_response(api::from_serve(error)),
        }
    }
}

fn parse_envelope(body: &[u8]) -> Option<Envelope> {
    serde_json::from_slice(body).ok()
}

fn invalid_body_response() -> Response<Full<Bytes>> {
    failure_response(Failure {
        status: StatusCode::BAD_REQUEST,
        error: "Invalid Request Schema",
        issues: json!([{ "detail": "request body is not a signed envelope" }]),
    })
}

fn text_response(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header(hyper::header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

fn json_response<T: serde::Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(bytes) => Response::builder()
            .status(status)
            .header(hyper::header::CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(bytes)))
            .unwrap(),
        Err(error) => failure_response(Failure {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: "Server Error",
            issues: json!([{ "detail": error.to_string() }]),
        }),
    }
}

fn failure_response(failure: Failure) -> Response<Full<Bytes>> {
    let body = json!({ "error": failure.error, "issues": failure.issues });
    Response::builder()
        .status(failure.status)
        .header(hyper::header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

/// Handle one incoming HTTP request.
async fn handle_request<Backend>(
    service: WardenService<Backend>,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    Backend: StorageBackend<Key = Vec<u8>, Value = Vec<u8>, Error = WardenStorageError>
        + TransactionalStorageBackend<
            Address = Vec<u8>,
            Value = Vec<u8>,
            Error = WardenStorageError,
        > + Clone
        + Send
        + Sync,
{
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    debug!(%method, %path, "handling request");

    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(error) => {
            return Ok(text_response(
                StatusCode::BAD_REQUEST,
                format!("Failed to read body: {error}"),
            ));
        }
    };

    let response = match (&method, path.as_str()) {
        (&Method::GET, "/") => service.banner(),
        (&Method::GET, "/example_expensive_resource") => {
            service.example_resource_request(&path).await
        }
        (&Method::POST, "/authorize_request") => service.authorize_request(&body).await,
        (&Method::POST, "/add_user") => service.add_user(&body).await,
        (&Method::POST, "/get_protected_resource") => {
            service.get_protected_resource(&body).await
        }
        _ => text_response(StatusCode::NOT_FOUND, "Not found\n".to_owned()),
    };

    Ok(response)
}

/// A running server instance.
pub struct WardenServer {
    /// The endpoint URL where the server is listening
    pub endpoint: String,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

impl WardenServer {
    /// Bind `listen` and serve `service` until [`WardenServer::stop`].
    pub async fn start<Backend>(
        service: WardenService<Backend>,
        listen: &str,
    ) -> anyhow::Result<Self>
    where
        Backend: StorageBackend<Key = Vec<u8>, Value = Vec<u8>, Error = WardenStorageError>
            + TransactionalStorageBackend<
                Address = Vec<u8>,
                Value = Vec<u8>,
                Error = WardenStorageError,
            > + Clone
            + Send
            + Sync
            + 'static,
    {
        let listener = TcpListener::bind(listen).await?;
        let addr = listener.local_addr()?;
        let endpoint = format!("http://{addr}");

        let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    result = listener.accept() => {
                        if let Ok((stream, _)) = result {
                            let service = service.clone();
                            tokio::spawn(async move {
                                let handler = hyper::service::service_fn(move |req| {
                                    let service = service.clone();
                                    async move { handle_request(service, req).await }
                                });
                                if let Err(error) = http1::Builder::new()
                                    .serve_connection(TokioIo::new(stream), handler)
                                    .await
                                {
                                    warn!(%error, "connection closed with an error");
                                }
                            });
                        }
                    }
                }
            }
        });

        Ok(WardenServer {
            endpoint,
            shutdown_tx,
        })
    }

    /// Stop accepting connections.
    pub fn stop(self) {
        let _ = self.shutdown_tx.send(());
    }
}
