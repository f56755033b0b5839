//! JSON-RPC transport implementations.

use std::error::Error as StdError;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::trace;

use crate::error::HarnessError;
use crate::error::Result;
use crate::error::TransportErrorKind;
use crate::rpc::RpcEndpoint;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Posts one serialized request and returns the raw response body.
pub trait RpcTransport: Send + Sync {
    fn post(&self, endpoint: &RpcEndpoint, body: &str) -> Result<String>;
}

/// HTTP POST with basic auth, as the daemon's RPC server expects.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| HarnessError::environment("build RPC HTTP client", err))?;
        Ok(Self { client })
    }
}

impl RpcTransport for HttpTransport {
    fn post(&self, endpoint: &RpcEndpoint, body: &str) -> Result<String> {
        let url = endpoint.url();
        let transport_error = |err: reqwest::Error| HarnessError::Transport {
            kind: classify(&err),
            endpoint: url.clone(),
            message: err.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .basic_auth(endpoint.user(), Some(endpoint.password()))
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .map_err(transport_error)?;

        // The daemon answers RPC rejections with a 500 and a JSON body, so the
        // status only matters when there is nothing to parse.
        let status = response.status();
        let text = response.text().map_err(transport_error)?;
        trace!(url = %url, status = status.as_u16(), bytes = text.len(), "RPC response body read");
        if !status.is_success() && text.trim().is_empty() {
            return Err(HarnessError::Transport {
                kind: TransportErrorKind::Other,
                endpoint: url,
                message: format!("HTTP {status} with empty body"),
            });
        }
        Ok(text)
    }
}

/// Finds the underlying cause of a request failure. Boot-time failures show
/// up as I/O errors or as hyper reporting an incomplete message.
fn classify(err: &reqwest::Error) -> TransportErrorKind {
    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(current) = source {
        if let Some(io_err) = current.downcast_ref::<std::io::Error>() {
            let kind = TransportErrorKind::from(io_err.kind());
            if kind != TransportErrorKind::Other {
                return kind;
            }
        }
        if let Some(hyper_err) = current.downcast_ref::<hyper::Error>()
            && hyper_err.is_incomplete_message()
        {
            return TransportErrorKind::UnexpectedEof;
        }
        source = current.source();
    }
    if err.is_connect() {
        return TransportErrorKind::ConnectionRefused;
    }
    TransportErrorKind::Other
}

#[cfg(any(test, feature = "test-support"))]
pub mod mock {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use bcx_harness_common::mutex_lock_or_recover;
    use serde_json::Value;

    use super::*;

    /// One scripted outcome of a `post`.
    #[derive(Debug, Clone)]
    pub enum MockReply {
        Body(String),
        Fail(TransportErrorKind),
    }

    impl MockReply {
        pub fn result(result: Value) -> Self {
            MockReply::Body(serde_json::json!({ "result": result, "error": null }).to_string())
        }

        pub fn error(error: Value) -> Self {
            MockReply::Body(serde_json::json!({ "result": null, "error": error }).to_string())
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct RecordedPost {
        pub url: String,
        pub user: String,
        pub password: String,
        pub body: String,
    }

    /// Replays queued replies, then repeats the fallback.
    #[derive(Debug)]
    pub struct MockTransport {
        queue: Mutex<VecDeque<MockReply>>,
        fallback: Mutex<MockReply>,
        posts: Mutex<Vec<RecordedPost>>,
    }

    impl Default for MockTransport {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self {
                queue: Mutex::new(VecDeque::new()),
                fallback: Mutex::new(MockReply::result(Value::Null)),
                posts: Mutex::new(Vec::new()),
            }
        }

        pub fn with_reply(self, reply: MockReply) -> Self {
            mutex_lock_or_recover(&self.queue).push_back(reply);
            self
        }

        pub fn with_fallback(self, reply: MockReply) -> Self {
            *mutex_lock_or_recover(&self.fallback) = reply;
            self
        }

        pub fn push_reply(&self, reply: MockReply) {
            mutex_lock_or_recover(&self.queue).push_back(reply);
        }

        pub fn posts(&self) -> Vec<RecordedPost> {
            mutex_lock_or_recover(&self.posts).clone()
        }

        /// Method names of every request body posted so far.
        pub fn methods(&self) -> Vec<String> {
            self.posts()
                .iter()
                .filter_map(|post| serde_json::from_str::<Value>(&post.body).ok())
                .filter_map(|body| body.get("method").and_then(Value::as_str).map(String::from))
                .collect()
        }
    }

    impl RpcTransport for MockTransport {
        fn post(&self, endpoint: &RpcEndpoint, body: &str) -> Result<String> {
            mutex_lock_or_recover(&self.posts).push(RecordedPost {
                url: endpoint.url(),
                user: endpoint.user().to_string(),
                password: endpoint.password().to_string(),
                body: body.to_string(),
            });
            let reply = mutex_lock_or_recover(&self.queue)
                .pop_front()
                .unwrap_or_else(|| mutex_lock_or_recover(&self.fallback).clone());
            match reply {
                MockReply::Body(body) => Ok(body),
                MockReply::Fail(kind) => Err(HarnessError::Transport {
                    kind,
                    endpoint: endpoint.url(),
                    message: kind.as_str().to_string(),
                }),
            }
        }
    }
}
