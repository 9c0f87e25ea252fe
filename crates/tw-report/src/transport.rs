//! Best-effort delivery of payloads to a collector.
//!
//! The transport resolves its strategy once, from the configured preference
//! order. A send either reaches the wire or it doesn't; failure surfaces as
//! `false` and is never retried here.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use thiserror::Error;

use crate::payload::Payload;

const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
/// Fire-and-forget channels only accept safelisted content types, so
/// structured payloads ride on the form encoding there.
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport errors. Only construction can fail; a send reports success as a
/// plain bool.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Failed to build the HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

/// Delivery strategies in preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Detached send that outlives the caller.
    FireAndForget,
    /// Awaited streaming request on the shared client.
    Streaming,
    /// Synchronous dispatch on a blocking thread; last resort.
    Blocking,
}

/// Which strategies a [`Transport`] may use.
#[derive(Debug, Clone, Copy)]
pub struct TransportOptions {
    pub enable_fire_and_forget: bool,
    pub enable_streaming: bool,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            enable_fire_and_forget: true,
            enable_streaming: true,
        }
    }
}

impl TransportOptions {
    /// First available strategy in preference order. The blocking fallback is
    /// always available.
    pub const fn resolve(self) -> Strategy {
        if self.enable_fire_and_forget {
            Strategy::FireAndForget
        } else if self.enable_streaming {
            Strategy::Streaming
        } else {
            Strategy::Blocking
        }
    }
}

/// Anything a flush can hand a payload to.
///
/// The production implementation is [`Transport`]; tests substitute
/// invocation counters.
pub trait Sink: Send + Sync {
    /// Attempts one best-effort delivery. Failure is reported, never retried.
    fn deliver<'a>(
        &'a self,
        destination: &'a str,
        payload: Payload,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>>;
}

/// HTTP delivery adapter.
pub struct Transport {
    http: reqwest::Client,
    strategy: Strategy,
}

impl Transport {
    /// Builds the adapter, resolving the strategy from the given options.
    pub fn new(options: TransportOptions) -> Result<Self, ReportError> {
        let http = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(ReportError::ClientBuild)?;
        Ok(Self {
            http,
            strategy: options.resolve(),
        })
    }

    /// The strategy this transport resolved to.
    pub const fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// One POST to `destination`. Returns whether the attempt succeeded; a
    /// detached send only reports whether it was dispatched.
    pub async fn send(&self, destination: &str, payload: Payload) -> bool {
        match self.strategy {
            Strategy::FireAndForget => self.send_detached(destination, payload),
            Strategy::Streaming => self.send_streaming(destination, payload).await,
            Strategy::Blocking => send_blocking(destination, payload).await,
        }
    }

    fn send_detached(&self, destination: &str, payload: Payload) -> bool {
        let request = apply_payload(self.http.post(destination), payload, true);
        tokio::spawn(async move {
            match request.send().await {
                Ok(response) => {
                    tracing::debug!(status = %response.status(), "detached send finished");
                }
                Err(err) => tracing::debug!(error = %err, "detached send failed"),
            }
        });
        true
    }

    async fn send_streaming(&self, destination: &str, payload: Payload) -> bool {
        let request = apply_payload(self.http.post(destination), payload, false);
        match request.send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                tracing::debug!(error = %err, "streaming send failed");
                false
            }
        }
    }
}

impl Sink for Transport {
    fn deliver<'a>(
        &'a self,
        destination: &'a str,
        payload: Payload,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        Box::pin(self.send(destination, payload))
    }
}

async fn send_blocking(destination: &str, payload: Payload) -> bool {
    let destination = destination.to_string();
    let handle = tokio::task::spawn_blocking(move || {
        let client = match reqwest::blocking::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
        {
            Ok(client) => client,
            Err(err) => {
                tracing::debug!(error = %err, "blocking client build failed");
                return false;
            }
        };
        let request = apply_payload_blocking(client.post(&destination), payload);
        match request.send() {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                tracing::debug!(error = %err, "blocking send failed");
                false
            }
        }
    });
    handle.await.unwrap_or(false)
}

/// Content type for a payload. Safelisted channels downgrade structured
/// payloads to the form encoding.
fn content_type(payload: &Payload, safelisted: bool) -> String {
    match payload {
        Payload::Text(_) => TEXT_CONTENT_TYPE.to_string(),
        Payload::Binary { mime, .. } => mime.clone(),
        Payload::Json(_) if safelisted => FORM_CONTENT_TYPE.to_string(),
        Payload::Json(_) => JSON_CONTENT_TYPE.to_string(),
    }
}

fn apply_payload(
    request: reqwest::RequestBuilder,
    payload: Payload,
    safelisted: bool,
) -> reqwest::RequestBuilder {
    let header = content_type(&payload, safelisted);
    let body = payload_body(payload);
    request.header(CONTENT_TYPE, header).body(body)
}

fn apply_payload_blocking(
    request: reqwest::blocking::RequestBuilder,
    payload: Payload,
) -> reqwest::blocking::RequestBuilder {
    let header = content_type(&payload, false);
    let body = payload_body(payload);
    request.header(CONTENT_TYPE, header).body(body)
}

fn payload_body(payload: Payload) -> Vec<u8> {
    match payload {
        Payload::Text(text) => text.into_bytes(),
        Payload::Binary { bytes, .. } => bytes,
        Payload::Json(value) => value.to_string().into_bytes(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strategy_preference_order() {
        let all = TransportOptions::default();
        assert_eq!(all.resolve(), Strategy::FireAndForget);

        let no_beacon = TransportOptions {
            enable_fire_and_forget: false,
            enable_streaming: true,
        };
        assert_eq!(no_beacon.resolve(), Strategy::Streaming);

        let last_resort = TransportOptions {
            enable_fire_and_forget: false,
            enable_streaming: false,
        };
        assert_eq!(last_resort.resolve(), Strategy::Blocking);
    }

    #[test]
    fn content_type_classification() {
        let text = Payload::Text("a=1".to_string());
        assert_eq!(content_type(&text, false), TEXT_CONTENT_TYPE);
        assert_eq!(content_type(&text, true), TEXT_CONTENT_TYPE);

        let binary = Payload::Binary {
            mime: "application/msgpack".to_string(),
            bytes: vec![0x80],
        };
        assert_eq!(content_type(&binary, false), "application/msgpack");

        let structured = Payload::Json(json!([{"name": "a"}]));
        assert_eq!(content_type(&structured, false), JSON_CONTENT_TYPE);
        // Fire-and-forget channels downgrade JSON to the form encoding.
        assert_eq!(content_type(&structured, true), FORM_CONTENT_TYPE);
    }

    #[test]
    fn json_body_is_serialized_once() {
        let body = payload_body(Payload::Json(json!({"k": 1})));
        assert_eq!(body, br#"{"k":1}"#);
    }

    #[tokio::test]
    async fn streaming_send_to_unroutable_destination_reports_failure() {
        let transport = Transport::new(TransportOptions {
            enable_fire_and_forget: false,
            enable_streaming: true,
        })
        .unwrap();
        let delivered = transport
            .send("http://127.0.0.1:9/collect", Payload::Text("x".to_string()))
            .await;
        assert!(!delivered);
    }
}
