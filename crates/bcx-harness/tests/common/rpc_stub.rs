#![allow(dead_code)]

//! JSON-RPC server standing in for the daemon.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::http::header;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::post;
use serde_json::Value;
use serde_json::json;
use tokio::sync::oneshot;

#[derive(Debug, Clone)]
pub struct StubRequest {
    pub method: String,
    pub params: Value,
    pub body: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone)]
pub enum StubReply {
    Result(Value),
    /// Answered with status 500 and a JSON body, as the daemon does.
    Error(Value),
    /// Raw status and body.
    Status(u16, String),
}

type Handler = dyn Fn(&str, &Value) -> StubReply + Send + Sync;

#[derive(Clone)]
struct StubState {
    handler: Arc<Handler>,
    requests: Arc<Mutex<Vec<StubRequest>>>,
}

pub struct RpcStub {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<StubRequest>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl RpcStub {
    pub fn start<F>(handler: F) -> Self
    where
        F: Fn(&str, &Value) -> StubReply + Send + Sync + 'static,
    {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind stub listener");
        let addr = listener.local_addr().expect("stub address");
        Self::spawn(addr, Some(listener), Duration::ZERO, Arc::new(handler))
    }

    /// Binds `port` only after `delay`, so earlier connections are refused.
    pub fn start_later<F>(port: u16, delay: Duration, handler: F) -> Self
    where
        F: Fn(&str, &Value) -> StubReply + Send + Sync + 'static,
    {
        let addr: SocketAddr = ([127, 0, 0, 1], port).into();
        Self::spawn(addr, None, delay, Arc::new(handler))
    }

    fn spawn(
        addr: SocketAddr,
        listener: Option<std::net::TcpListener>,
        delay: Duration,
        handler: Arc<Handler>,
    ) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = StubState {
            handler,
            requests: Arc::clone(&requests),
        };
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let join = thread::Builder::new()
            .name("rpc-stub".to_string())
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("stub runtime");
                runtime.block_on(async move {
                    let mut shutdown_rx = shutdown_rx;
                    let listener = match listener {
                        Some(listener) => {
                            listener.set_nonblocking(true).expect("nonblocking listener");
                            tokio::net::TcpListener::from_std(listener).expect("adopt listener")
                        }
                        None => {
                            tokio::select! {
                                _ = tokio::time::sleep(delay) => {}
                                _ = &mut shutdown_rx => return,
                            }
                            tokio::net::TcpListener::bind(addr)
                                .await
                                .expect("bind delayed stub listener")
                        }
                    };
                    let app = Router::new().route("/", post(rpc)).with_state(state);
                    let _ = axum::serve(listener, app)
                        .with_graceful_shutdown(async move {
                            let _ = shutdown_rx.await;
                        })
                        .await;
                });
            })
            .expect("spawn stub thread");

        Self {
            addr,
            requests,
            shutdown_tx: Some(shutdown_tx),
            join: Some(join),
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn requests(&self) -> Vec<StubRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn methods(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.method).collect()
    }
}

impl Drop for RpcStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

async fn rpc(State(state): State<StubState>, headers: HeaderMap, body: String) -> Response {
    let header_value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    let parsed: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
    let method = parsed
        .get("method")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let params = parsed.get("params").cloned().unwrap_or(Value::Null);

    let reply = (state.handler)(&method, &params);
    state.requests.lock().unwrap().push(StubRequest {
        method,
        params,
        authorization: header_value(header::AUTHORIZATION),
        content_type: header_value(header::CONTENT_TYPE),
        body,
    });

    let (status, payload) = match reply {
        StubReply::Result(result) => (
            StatusCode::OK,
            json!({"result": result, "error": null}).to_string(),
        ),
        StubReply::Error(error) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"result": null, "error": error}).to_string(),
        ),
        StubReply::Status(status, body) => (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body,
        ),
    };
    (status, [(header::CONTENT_TYPE, "application/json")], payload).into_response()
}

/// A port nothing listens on.
pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind port listener");
    listener.local_addr().expect("port address").port()
}

/// Replies `{"version": 1}` to `getinfo` and null to everything else.
pub fn getinfo_handler(method: &str, _params: &Value) -> StubReply {
    match method {
        "getinfo" => StubReply::Result(json!({"version": 1})),
        _ => StubReply::Result(Value::Null),
    }
}
