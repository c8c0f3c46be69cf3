//! One request/response exchange with the trip server.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};

use crate::auth::UserToken;
use crate::error::{Error, Result};
use crate::models::{TraceId, TraceMessage, TripGuid, TripStatus};

/// Outbound upload body: one trip's metadata plus a batch of its traces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripPayload {
    pub guid: TripGuid,
    pub distance: f64,
    pub status: TripStatus,
    pub traces: Vec<TraceMessage>,
}

/// What a successful session hands back to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub guid: TripGuid,
    pub status: TripStatus,
    /// Row ids of the traces the server acknowledged, for mark-synced
    pub trace_ids: Vec<TraceId>,
}

/// Transport seam for one upload exchange. Implementations perform exactly
/// one request with a fixed timeout and no request-level retries; retrying
/// is the scheduler's job.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    async fn send(&self, payload: &TripPayload, token: &UserToken) -> Result<()>;
}

/// `reqwest` implementation of [`UploadTransport`].
pub struct HttpUploadTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpUploadTransport {
    /// Build a transport for the given endpoint with a fixed timeout.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl UploadTransport for HttpUploadTransport {
    async fn send(&self, payload: &TripPayload, token: &UserToken) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, format!("JWT {}", token.jwt))
            .json(payload)
            .send()
            .await?
            .error_for_status()?;

        // the body content is unused, but an unparseable response means the
        // server did not actually acknowledge the batch
        response
            .json::<serde_json::Value>()
            .await
            .map_err(|error| Error::MalformedResponse(error.to_string()))?;
        Ok(())
    }
}

/// One logical upload of a trace batch. All-or-nothing: either the whole
/// batch is acknowledged or the session reports a single failure with no
/// partial side effects.
pub struct UploadSession {
    payload: TripPayload,
    token: UserToken,
}

impl UploadSession {
    #[must_use]
    pub const fn new(payload: TripPayload, token: UserToken) -> Self {
        Self { payload, token }
    }

    #[must_use]
    pub const fn payload(&self) -> &TripPayload {
        &self.payload
    }

    /// Perform the exchange over the given transport.
    pub async fn execute<T: UploadTransport + ?Sized>(&self, transport: &T) -> Result<UploadOutcome> {
        transport.send(&self.payload, &self.token).await?;

        Ok(UploadOutcome {
            guid: self.payload.guid,
            status: self.payload.status,
            trace_ids: self
                .payload
                .traces
                .iter()
                .filter_map(|message| message.rowid)
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GpsFix, TracePayload};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn token() -> UserToken {
        UserToken {
            email: "a@b.c".to_string(),
            firstname: None,
            lastname: None,
            jwt: "h.p.s".to_string(),
        }
    }

    fn payload() -> TripPayload {
        TripPayload {
            guid: TripGuid::new(),
            distance: 1200.0,
            status: TripStatus::Finalized,
            traces: vec![
                TraceMessage {
                    payload: TracePayload::Gps(GpsFix {
                        time: 1,
                        lat: 43.07,
                        lng: -89.40,
                        speed: 10.0,
                    }),
                    rowid: Some(11),
                },
                TraceMessage {
                    payload: TracePayload::Gps(GpsFix {
                        time: 2,
                        lat: 43.08,
                        lng: -89.40,
                        speed: 10.0,
                    }),
                    rowid: Some(12),
                },
            ],
        }
    }

    struct RecordingTransport {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl UploadTransport for RecordingTransport {
        async fn send(&self, _payload: &TripPayload, _token: &UserToken) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(Error::MalformedResponse("boom".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_payload_wire_shape() {
        let body: serde_json::Value = serde_json::to_value(payload()).unwrap();
        assert!(body["guid"].is_string());
        assert_eq!(body["status"], 2);
        assert_eq!(body["traces"][0]["type"], "gps");
        assert_eq!(body["traces"][0]["rowId"], 11);
    }

    #[tokio::test]
    async fn test_success_returns_sent_rowids() {
        let transport = RecordingTransport {
            calls: AtomicUsize::new(0),
            fail: false,
        };
        let session = UploadSession::new(payload(), token());

        let outcome = session.execute(&transport).await.unwrap();
        assert_eq!(outcome.trace_ids, vec![11, 12]);
        assert_eq!(outcome.status, TripStatus::Finalized);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_propagates_without_outcome() {
        let transport = RecordingTransport {
            calls: AtomicUsize::new(0),
            fail: true,
        };
        let session = UploadSession::new(payload(), token());

        let error = session.execute(&transport).await.unwrap_err();
        assert!(matches!(error, Error::MalformedResponse(_)));
    }
}
