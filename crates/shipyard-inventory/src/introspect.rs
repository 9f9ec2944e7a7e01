//! Per-host introspection endpoint client.
//!
//! Every host-bound node runs an agent that answers
//! `GET http://<host>:51678/v1/tasks` with the tasks it knows about and the
//! runtime ids of their containers. The call is best-effort: callers map
//! every `IntrospectionError` to a degraded unit rather than failing.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Well-known agent port.
pub const INTROSPECTION_PORT: u16 = 51678;

/// Task listing path on the agent.
pub const INTROSPECTION_PATH: &str = "/v1/tasks";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Agent response body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IntrospectionResponse {
    #[serde(default)]
    pub tasks: Vec<IntrospectedTask>,
}

impl IntrospectionResponse {
    pub fn find(&self, task_arn: &str) -> Option<&IntrospectedTask> {
        self.tasks.iter().find(|t| t.arn == task_arn)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IntrospectedTask {
    pub arn: String,
    #[serde(default)]
    pub known_status: Option<String>,
    #[serde(default)]
    pub containers: Vec<IntrospectedContainer>,
}

impl IntrospectedTask {
    /// The container with the given name, or the first one.
    pub fn container(&self, name: Option<&str>) -> Option<&IntrospectedContainer> {
        name.and_then(|n| {
            self.containers
                .iter()
                .find(|c| c.name.as_deref() == Some(n))
        })
        .or_else(|| self.containers.first())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IntrospectedContainer {
    pub docker_id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Why an introspection call produced no usable answer.
#[derive(Debug, Error)]
pub enum IntrospectionError {
    #[error("connect to {address} failed: {message}")]
    Connect { address: String, message: String },

    #[error("http exchange failed: {0}")]
    Http(String),

    #[error("endpoint answered with status {0}")]
    Status(u16),

    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("no answer within {0:?}")]
    TimedOut(Duration),
}

/// Queries a host's local task listing.
#[async_trait]
pub trait HostIntrospector: Send + Sync {
    async fn tasks(&self, host_address: &str) -> Result<IntrospectionResponse, IntrospectionError>;
}

/// `HostIntrospector` over plain HTTP/1.1.
#[derive(Debug, Clone)]
pub struct HttpIntrospector {
    port: u16,
    path: String,
    timeout: Duration,
}

impl Default for HttpIntrospector {
    fn default() -> Self {
        Self::new(INTROSPECTION_PORT, INTROSPECTION_PATH, DEFAULT_TIMEOUT)
    }
}

impl HttpIntrospector {
    pub fn new(port: u16, path: &str, timeout: Duration) -> Self {
        Self {
            port,
            path: path.to_string(),
            timeout,
        }
    }

    async fn fetch(&self, host: &str) -> Result<IntrospectionResponse, IntrospectionError> {
        let address = format!("{host}:{}", self.port);

        let stream = tokio::net::TcpStream::connect(&address)
            .await
            .map_err(|e| IntrospectionError::Connect {
                address: address.clone(),
                message: e.to_string(),
            })?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| IntrospectionError::Http(e.to_string()))?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "introspection connection closed with error");
            }
        });

        let req = http::Request::builder()
            .method(http::Method::GET)
            .uri(self.path.as_str())
            .header(http::header::HOST, address.as_str())
            .header(http::header::ACCEPT, "application/json")
            .header(
                http::header::USER_AGENT,
                concat!("shipyard-inventory/", env!("CARGO_PKG_VERSION")),
            )
            .body(Empty::<Bytes>::new())
            .map_err(|e| IntrospectionError::Http(e.to_string()))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| IntrospectionError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(IntrospectionError::Status(resp.status().as_u16()));
        }

        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| IntrospectionError::Http(e.to_string()))?
            .to_bytes();

        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl HostIntrospector for HttpIntrospector {
    async fn tasks(&self, host_address: &str) -> Result<IntrospectionResponse, IntrospectionError> {
        let result = tokio::time::timeout(self.timeout, self.fetch(host_address)).await;
        match result {
            Ok(inner) => inner,
            Err(_) => {
                debug!(host = host_address, timeout = ?self.timeout, "introspection timed out");
                Err(IntrospectionError::TimedOut(self.timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    const BODY: &str = r#"{"Tasks":[
        {"Arn":"arn:sim:ecs:task/prod/t1","KnownStatus":"RUNNING",
         "Containers":[{"DockerId":"0123456789abcdef0123","Name":"app"}]},
        {"Arn":"arn:sim:ecs:task/prod/t2","Containers":[]}
    ]}"#;

    /// Answer every connection with a fixed response.
    async fn responder(status: &'static str, body: &'static str) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                tokio::spawn(async move {
                    let mut buf = [0u8; 2048];
                    let _ = socket.read(&mut buf).await;
                    let response = format!(
                        "HTTP/1.1 {status}\r\ncontent-type: application/json\r\n\
                         content-length: {}\r\nconnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        addr
    }

    fn introspector(addr: SocketAddr) -> HttpIntrospector {
        HttpIntrospector::new(addr.port(), INTROSPECTION_PATH, Duration::from_secs(2))
    }

    #[test]
    fn response_lookup_by_arn_and_name() {
        let resp: IntrospectionResponse = serde_json::from_str(BODY).unwrap();
        let t1 = resp.find("arn:sim:ecs:task/prod/t1").unwrap();
        assert_eq!(t1.known_status.as_deref(), Some("RUNNING"));
        assert_eq!(t1.container(Some("app")).unwrap().docker_id, "0123456789abcdef0123");
        assert_eq!(t1.container(Some("other")).unwrap().docker_id, "0123456789abcdef0123");
        assert!(resp.find("arn:sim:ecs:task/prod/t2").unwrap().container(None).is_none());
        assert!(resp.find("arn:sim:ecs:task/prod/t3").is_none());
    }

    #[tokio::test]
    async fn fetches_and_decodes_task_listing() {
        let addr = responder("200 OK", BODY).await;
        let resp = introspector(addr).tasks("127.0.0.1").await.unwrap();
        assert_eq!(resp.tasks.len(), 2);
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let addr = responder("503 Service Unavailable", "{}").await;
        let err = introspector(addr).tasks("127.0.0.1").await.unwrap_err();
        assert!(matches!(err, IntrospectionError::Status(503)));
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let addr = responder("200 OK", "not json").await;
        let err = introspector(addr).tasks("127.0.0.1").await.unwrap_err();
        assert!(matches!(err, IntrospectionError::Decode(_)));
    }

    #[tokio::test]
    async fn refused_connection_is_a_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = introspector(addr).tasks("127.0.0.1").await.unwrap_err();
        assert!(matches!(err, IntrospectionError::Connect { .. }));
    }

    #[tokio::test]
    async fn silent_host_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            // Accept and hold the connection without answering.
            let held = listener.accept().await;
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(held);
        });

        let client =
            HttpIntrospector::new(addr.port(), INTROSPECTION_PATH, Duration::from_millis(200));
        let err = client.tasks("127.0.0.1").await.unwrap_err();
        assert!(matches!(err, IntrospectionError::TimedOut(_)));
    }
}
