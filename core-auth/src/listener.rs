//! Loopback Redirect Listener
//!
//! A minimal single-shot HTTP endpoint on `127.0.0.1` that captures the
//! OAuth redirect. It serves exactly one request — the one carrying the
//! query parameters — replies with a static confirmation page, and stops.
//!
//! The listener is a scoped resource: it is released on flow completion, on
//! error, on cancellation and on shutdown, through one idempotent stop
//! operation ([`ListenerStopper::stop`]). A stopped listener completes the
//! waiting capture with `AuthError::Cancelled`, never a generic failure.

use crate::error::{AuthError, Result};
use crate::oauth::{parse_redirect_query, RedirectQuery};
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Idempotent stop handle for a bound [`RedirectListener`].
///
/// Safe to call when nothing is listening and safe to call repeatedly.
#[derive(Clone)]
pub struct ListenerStopper {
    cancel: CancellationToken,
}

impl ListenerStopper {
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

/// Single-shot loopback HTTP listener for the OAuth redirect.
pub struct RedirectListener {
    listener: TcpListener,
    port: u16,
    cancel: CancellationToken,
}

impl RedirectListener {
    /// Bind the listener.
    ///
    /// With `fixed_port: Some(p)` the pre-registered port is probed first —
    /// an occupied port surfaces as [`AuthError::PortUnavailable`] before
    /// any authorize URL exists. With `None` an ephemeral port is chosen by
    /// binding port 0; read it back through [`port`](Self::port) to build
    /// the redirect URI.
    pub async fn bind(fixed_port: Option<u16>) -> Result<Self> {
        if let Some(port) = fixed_port {
            // Precondition, not a bind failure discovered mid-flow
            if !port_available(port) {
                warn!(port = port, "Required loopback port is occupied");
                return Err(AuthError::PortUnavailable { port });
            }
        }

        let addr = SocketAddr::from(([127, 0, 0, 1], fixed_port.unwrap_or(0)));
        let listener = TcpListener::bind(addr).await.map_err(|e| match fixed_port {
            Some(port) => AuthError::PortUnavailable { port },
            None => AuthError::Listener(e.to_string()),
        })?;

        let port = listener
            .local_addr()
            .map_err(|e| AuthError::Listener(e.to_string()))?
            .port();

        info!(port = port, "Redirect listener bound");
        Ok(Self {
            listener,
            port,
            cancel: CancellationToken::new(),
        })
    }

    /// The bound loopback port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The redirect URI this listener answers on.
    pub fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}/", self.port)
    }

    /// A stop handle usable from another task.
    pub fn stopper(&self) -> ListenerStopper {
        ListenerStopper {
            cancel: self.cancel.clone(),
        }
    }

    /// Serve exactly one request and hand back its query parameters.
    ///
    /// The browser gets a static confirmation page in return. Consumes the
    /// listener — the socket is closed when this returns, on every path.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Cancelled`] when the stopper fired while waiting
    /// - [`AuthError::Listener`] on socket or connection failures
    pub async fn capture(self) -> Result<RedirectQuery> {
        let (stream, _addr) = tokio::select! {
            _ = self.cancel.cancelled() => {
                debug!("Redirect listener stopped before a connection arrived");
                return Err(AuthError::Cancelled);
            }
            accepted = self.listener.accept() => {
                accepted.map_err(|e| AuthError::Listener(e.to_string()))?
            }
        };

        debug!("Redirect listener accepted a connection");
        let io = TokioIo::new(stream);

        let (tx, rx) = oneshot::channel::<RedirectQuery>();
        let tx = Arc::new(Mutex::new(Some(tx)));

        let service = service_fn(move |req: Request<hyper::body::Incoming>| {
            let tx = tx.clone();
            async move {
                let query = parse_redirect_query(&req.uri().to_string());
                debug!("Redirect listener received the callback request");

                let html = if query.error.is_some() {
                    denied_html()
                } else {
                    confirmation_html()
                };

                if let Some(sender) = tx.lock().unwrap_or_else(|p| p.into_inner()).take() {
                    let _ = sender.send(query);
                }

                let mut response = Response::new(Full::new(Bytes::from(html)));
                response.headers_mut().insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static("text/html; charset=utf-8"),
                );
                Ok::<_, Infallible>(response)
            }
        });

        // Serve the single connection; it ends once the response is written
        tokio::spawn(async move {
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                warn!("Redirect listener connection error: {}", e);
            }
        });

        tokio::select! {
            _ = self.cancel.cancelled() => {
                debug!("Redirect listener stopped while serving");
                Err(AuthError::Cancelled)
            }
            received = rx => {
                received.map_err(|_| {
                    AuthError::Listener(
                        "connection closed before the redirect parameters arrived".to_string(),
                    )
                })
            }
        }
    }
}

/// Probe whether a loopback port can be bound right now.
fn port_available(port: u16) -> bool {
    std::net::TcpListener::bind(("127.0.0.1", port)).is_ok()
}

fn confirmation_html() -> String {
    r#"<!DOCTYPE html>
<html>
<head><title>Cumulus - Authentication Successful</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 50px;">
    <h1>Authentication Successful</h1>
    <p>You can close this tab and return to the application.</p>
</body>
</html>"#
        .to_string()
}

fn denied_html() -> String {
    r#"<!DOCTYPE html>
<html>
<head><title>Cumulus - Authentication Failed</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 50px;">
    <h1>Authentication Failed</h1>
    <p>Authorization was not granted. You can close this tab and try again.</p>
</body>
</html>"#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn send_callback_request(port: u16, path_and_query: &str) -> String {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: 127.0.0.1:{}\r\nConnection: close\r\n\r\n",
            path_and_query, port
        );
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let listener = RedirectListener::bind(None).await.unwrap();
        assert_ne!(listener.port(), 0);
        assert_eq!(
            listener.redirect_uri(),
            format!("http://127.0.0.1:{}/", listener.port())
        );
    }

    #[tokio::test]
    async fn test_fixed_port_unavailable_is_precondition_error() {
        // Occupy a port, then ask for it as the fixed port
        let occupier = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = occupier.local_addr().unwrap().port();

        let result = RedirectListener::bind(Some(port)).await;
        assert!(matches!(
            result,
            Err(AuthError::PortUnavailable { port: p }) if p == port
        ));
    }

    #[tokio::test]
    async fn test_capture_returns_query_and_serves_page() {
        let listener = RedirectListener::bind(None).await.unwrap();
        let port = listener.port();

        let capture = tokio::spawn(listener.capture());

        let response = send_callback_request(port, "/?code=abc&state=xyz").await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("Authentication Successful"));

        let query = capture.await.unwrap().unwrap();
        assert_eq!(query.code.as_deref(), Some("abc"));
        assert_eq!(query.state.as_deref(), Some("xyz"));
    }

    #[tokio::test]
    async fn test_capture_error_redirect_serves_denied_page() {
        let listener = RedirectListener::bind(None).await.unwrap();
        let port = listener.port();

        let capture = tokio::spawn(listener.capture());

        let response = send_callback_request(port, "/?error=access_denied&state=xyz").await;
        assert!(response.contains("Authentication Failed"));

        let query = capture.await.unwrap().unwrap();
        assert_eq!(query.error.as_deref(), Some("access_denied"));
    }

    #[tokio::test]
    async fn test_stop_while_waiting_yields_cancelled() {
        let listener = RedirectListener::bind(None).await.unwrap();
        let stopper = listener.stopper();

        let capture = tokio::spawn(listener.capture());
        stopper.stop();

        let result = capture.await.unwrap();
        assert!(matches!(result, Err(AuthError::Cancelled)));
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let listener = RedirectListener::bind(None).await.unwrap();
        let stopper = listener.stopper();

        // Repeated stops, including after the listener is gone
        stopper.stop();
        stopper.stop();
        let result = listener.capture().await;
        assert!(matches!(result, Err(AuthError::Cancelled)));
        stopper.stop();
    }
}
