//! RequestIssuer - fire one GET, wait for it to finish, never retry.

use async_trait::async_trait;
use http_body_util::{BodyExt, Empty};
use hyper::body::Bytes;
use hyper::{Method, Request, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use perfshot_common::{ShotError, ShotResult};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::debug;

/// What a completed request produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestOutcome {
    pub status: u16,
    pub body_bytes: usize,
    pub elapsed: Duration,
}

/// One blocking request against a fully-qualified URL.
///
/// Implementations must not retry; the scheduler counts each call as exactly
/// one shot.
#[async_trait]
pub trait RequestIssuer: Send + Sync {
    async fn issue(&self, url: &str) -> ShotResult<RequestOutcome>;
}

/// Parse an endpoint URL the way [`HttpIssuer`] will request it.
///
/// Only absolute `http://` URLs with a host are accepted; IPv6 literals such
/// as `http://[::1]:8080/maps` are fine.
pub fn parse_endpoint(url: &str) -> ShotResult<Uri> {
    let uri: Uri = url
        .parse()
        .map_err(|e| ShotError::request(url, format!("Invalid URI: {}", e)))?;

    if uri.scheme_str() != Some("http") {
        return Err(ShotError::request(url, "Invalid URI: scheme must be http"));
    }
    let Some(authority) = uri.authority().filter(|a| !a.host().is_empty()) else {
        return Err(ShotError::request(url, "Invalid URI: missing host"));
    };
    if !authority.as_str().ends_with(authority.host()) && authority.port().is_none() {
        return Err(ShotError::request(url, "Invalid URI: invalid port"));
    }
    Ok(uri)
}

/// Plain HTTP/1 GET over a pooled hyper client.
///
/// Any response outside 2xx is reported as [`ShotError::Request`].
pub struct HttpIssuer {
    client: Client<HttpConnector, Empty<Bytes>>,
    timeout: Duration,
}

impl HttpIssuer {
    pub const USER_AGENT: &'static str = "perfshot/0.1";

    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::builder(TokioExecutor::new()).build_http(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn send(&self, url: &str, uri: Uri) -> ShotResult<RequestOutcome> {
        let started = Instant::now();

        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header("Accept", "application/json, */*")
            .header("User-Agent", Self::USER_AGENT)
            .body(Empty::<Bytes>::new())
            .map_err(|e| ShotError::request(url, format!("Failed to build request: {}", e)))?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| ShotError::request(url, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| ShotError::request(url, format!("Failed to read response: {}", e)))?
            .to_bytes();

        if !status.is_success() {
            return Err(ShotError::request(url, format!("HTTP {}", status.as_u16())));
        }

        Ok(RequestOutcome {
            status: status.as_u16(),
            body_bytes: body.len(),
            elapsed: started.elapsed(),
        })
    }
}

impl Default for HttpIssuer {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl RequestIssuer for HttpIssuer {
    async fn issue(&self, url: &str) -> ShotResult<RequestOutcome> {
        let uri = parse_endpoint(url)?;

        match tokio::time::timeout(self.timeout, self.send(url, uri)).await {
            Ok(result) => {
                if let Ok(outcome) = &result {
                    debug!("GET {} -> {} in {:?}", url, outcome.status, outcome.elapsed);
                }
                result
            }
            Err(_) => Err(ShotError::request(
                url,
                format!("timed out after {:?}", self.timeout),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Response, StatusCode};
    use hyper_util::rt::TokioIo;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    /// Serves `/ok` with a short body, `/slow` after two seconds, everything
    /// else with 404.
    async fn spawn_server() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let io = TokioIo::new(stream);
                tokio::spawn(async move {
                    let service = service_fn(|req: Request<hyper::body::Incoming>| async move {
                        let response = match req.uri().path() {
                            "/ok" => Response::new(Full::new(Bytes::from("{\"maps\":[]}"))),
                            "/slow" => {
                                tokio::time::sleep(Duration::from_secs(2)).await;
                                Response::new(Full::new(Bytes::from("late")))
                            }
                            _ => {
                                let mut response = Response::new(Full::new(Bytes::from("missing")));
                                *response.status_mut() = StatusCode::NOT_FOUND;
                                response
                            }
                        };
                        Ok::<_, hyper::Error>(response)
                    });
                    let _ = http1::Builder::new().serve_connection(io, service).await;
                });
            }
        });

        addr
    }

    #[tokio::test]
    async fn test_successful_get() {
        let addr = spawn_server().await;
        let issuer = HttpIssuer::default();

        let outcome = issuer.issue(&format!("http://{}/ok", addr)).await.unwrap();
        assert_eq!(outcome.status, 200);
        assert_eq!(outcome.body_bytes, 11);
    }

    #[tokio::test]
    async fn test_error_status_is_request_error() {
        let addr = spawn_server().await;
        let issuer = HttpIssuer::default();

        let err = issuer.issue(&format!("http://{}/nope", addr)).await.unwrap_err();
        assert!(matches!(err, ShotError::Request { .. }));
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_timeout_is_request_error() {
        let addr = spawn_server().await;
        let issuer = HttpIssuer::new(Duration::from_millis(200));

        let err = issuer.issue(&format!("http://{}/slow", addr)).await.unwrap_err();
        assert!(err.to_string().contains("timed out"), "unexpected: {err}");
    }

    #[tokio::test]
    async fn test_connection_refused_is_request_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = HttpIssuer::default()
            .issue(&format!("http://{}/ok", addr))
            .await
            .unwrap_err();
        assert!(matches!(err, ShotError::Request { .. }));
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let err = HttpIssuer::default().issue("not a url").await.unwrap_err();
        assert!(err.to_string().contains("Invalid URI"));

        let err = HttpIssuer::default().issue("https://localhost/").await.unwrap_err();
        assert!(err.to_string().contains("scheme must be http"));
    }

    #[test]
    fn test_parse_endpoint() {
        let uri = parse_endpoint("http://localhost:8080/api/v1/maps").unwrap();
        assert_eq!(uri.host(), Some("localhost"));
        assert_eq!(uri.port_u16(), Some(8080));

        let uri = parse_endpoint("http://[::1]:8080/maps").unwrap();
        assert_eq!(uri.host(), Some("[::1]"));
        assert_eq!(uri.port_u16(), Some(8080));
        parse_endpoint("http://[::1]/maps").unwrap();
        parse_endpoint("http://example.com").unwrap();

        assert!(parse_endpoint("localhost:8080/api/v1/maps").is_err());
        assert!(parse_endpoint("https://example.com/").is_err());
        assert!(parse_endpoint("http:///path").is_err());
        assert!(parse_endpoint("http://host:port/").is_err());
        assert!(parse_endpoint("http://host/a b").is_err());
    }

    #[tokio::test]
    async fn test_ipv6_loopback_endpoint() {
        let listener = match TcpListener::bind("[::1]:0").await {
            Ok(listener) => listener,
            // No IPv6 loopback on this host.
            Err(_) => return,
        };
        let addr = listener.local_addr().unwrap();
        drop(listener);

        // Parses and reaches the connector; nothing listens, so it is refused.
        let err = HttpIssuer::default()
            .issue(&format!("http://[::1]:{}/maps", addr.port()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("HTTP request failed"), "unexpected: {err}");
    }
}
