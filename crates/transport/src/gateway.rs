//! Push gateway client — batched delivery and receipt polling.
//!
//! The gateway accepts at most [`PUSH_BATCH_LIMIT`] messages per request and
//! answers with a ticket per message, aligned by index. Actual device
//! delivery is confirmed later through the receipt endpoint. A failed chunk
//! (timeout, non-2xx, decode error) marks only that chunk's messages failed;
//! retries are the caller's responsibility on the next scheduled run, behind
//! the dedupe key already consumed upstream.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use pulse_common::error::AppError;

/// Hard per-request message limit documented by the push gateway.
pub const PUSH_BATCH_LIMIT: usize = 100;

/// Receipt error code that means the device token is permanently dead.
pub const DEVICE_NOT_REGISTERED: &str = "DeviceNotRegistered";

/// One outbound push message in the gateway's wire format.
#[derive(Debug, Clone, Serialize)]
pub struct PushMessage {
    pub to: String,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
    pub ttl: u64,
    #[serde(rename = "channelId")]
    pub channel_id: String,
}

/// Per-message outcome of a batch send, order-aligned with the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResult {
    pub ticket_id: Option<String>,
    pub error: Option<String>,
}

impl DeliveryResult {
    pub fn is_ok(&self) -> bool {
        self.ticket_id.is_some()
    }

    fn failed(reason: impl Into<String>) -> Self {
        Self {
            ticket_id: None,
            error: Some(reason.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TicketEnvelope {
    data: Vec<Ticket>,
}

#[derive(Debug, Deserialize)]
struct Ticket {
    status: String,
    id: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReceiptEnvelope {
    data: HashMap<String, Receipt>,
}

/// Delivery receipt for one ticket.
#[derive(Debug, Clone, Deserialize)]
pub struct Receipt {
    pub status: String,
    #[serde(default)]
    pub details: Option<ReceiptDetails>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReceiptDetails {
    #[serde(default)]
    pub error: Option<String>,
}

impl Receipt {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    /// Whether this receipt reports a permanently unreachable device.
    pub fn is_device_not_registered(&self) -> bool {
        self.details
            .as_ref()
            .and_then(|d| d.error.as_deref())
            .is_some_and(|e| e == DEVICE_NOT_REGISTERED)
    }

    pub fn error_reason(&self) -> String {
        self.details
            .as_ref()
            .and_then(|d| d.error.clone())
            .unwrap_or_else(|| self.status.clone())
    }
}

#[derive(Serialize)]
struct ReceiptRequest<'a> {
    ids: &'a [String],
}

/// HTTP client for the push gateway.
#[derive(Clone)]
pub struct PushGatewayClient {
    http: reqwest::Client,
    send_url: String,
    receipt_url: String,
}

impl PushGatewayClient {
    pub fn new(send_url: &str, receipt_url: &str, timeout_secs: u64) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            http,
            send_url: send_url.to_string(),
            receipt_url: receipt_url.to_string(),
        })
    }

    /// Send a batch of messages, chunked to the gateway's hard limit.
    ///
    /// The result vector preserves input order so callers can correlate by
    /// index. A chunk-level failure fails only that chunk's messages; the
    /// remaining chunks are still attempted.
    pub async fn send_batch(&self, messages: &[PushMessage]) -> Vec<DeliveryResult> {
        let mut results = Vec::with_capacity(messages.len());

        for chunk in messages.chunks(PUSH_BATCH_LIMIT) {
            match self.send_chunk(chunk).await {
                Ok(tickets) => results.extend(align_tickets(tickets, chunk.len())),
                Err(e) => {
                    tracing::warn!(
                        chunk_size = chunk.len(),
                        error = %e,
                        "Push gateway chunk failed"
                    );
                    let reason = e.to_string();
                    results.extend(chunk.iter().map(|_| DeliveryResult::failed(reason.clone())));
                }
            }
        }

        results
    }

    async fn send_chunk(&self, chunk: &[PushMessage]) -> Result<Vec<Ticket>, AppError> {
        let response = self
            .http
            .post(&self.send_url)
            .json(chunk)
            .send()
            .await
            .map_err(|e| AppError::Gateway(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Gateway(format!("gateway returned {status}")));
        }

        let envelope: TicketEnvelope = response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("ticket decode failed: {e}")))?;

        Ok(envelope.data)
    }

    /// Fetch delivery receipts for a set of ticket ids in one call.
    ///
    /// Tickets the gateway has not resolved yet are simply absent from the
    /// returned map and will be polled again on the next run.
    pub async fn fetch_receipts(
        &self,
        ticket_ids: &[String],
    ) -> Result<HashMap<String, Receipt>, AppError> {
        let response = self
            .http
            .post(&self.receipt_url)
            .json(&ReceiptRequest { ids: ticket_ids })
            .send()
            .await
            .map_err(|e| AppError::Gateway(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Gateway(format!("receipt endpoint returned {status}")));
        }

        let envelope: ReceiptEnvelope = response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("receipt decode failed: {e}")))?;

        Ok(envelope.data)
    }
}

/// Map a chunk's tickets onto per-message results, index-aligned.
///
/// A short response pads the tail as failed; extras are dropped. The caller
/// must never lose the index correlation, even against a misbehaving gateway.
fn align_tickets(tickets: Vec<Ticket>, expected: usize) -> Vec<DeliveryResult> {
    let mut results: Vec<DeliveryResult> = tickets
        .into_iter()
        .take(expected)
        .map(|t| {
            if t.status == "ok" && t.id.is_some() {
                DeliveryResult {
                    ticket_id: t.id,
                    error: None,
                }
            } else {
                DeliveryResult::failed(t.message.unwrap_or_else(|| "gateway error".to_string()))
            }
        })
        .collect();

    while results.len() < expected {
        results.push(DeliveryResult::failed("missing ticket in gateway response"));
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_ticket(id: &str) -> Ticket {
        Ticket {
            status: "ok".to_string(),
            id: Some(id.to_string()),
            message: None,
        }
    }

    fn err_ticket(msg: &str) -> Ticket {
        Ticket {
            status: "error".to_string(),
            id: None,
            message: Some(msg.to_string()),
        }
    }

    #[test]
    fn test_chunking_250_messages_is_three_calls() {
        let messages = vec![(); 250];
        let chunks: Vec<_> = messages.chunks(PUSH_BATCH_LIMIT).collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 100);
        assert_eq!(chunks[1].len(), 100);
        assert_eq!(chunks[2].len(), 50);
    }

    #[test]
    fn test_failed_chunk_marks_only_its_own_messages() {
        // Simulate chunk 1 ok, chunk 2 failed, chunk 3 ok
        let mut results = Vec::new();
        results.extend(align_tickets((0..100).map(|i| ok_ticket(&format!("t{i}"))).collect(), 100));
        let reason = "gateway returned 502".to_string();
        results.extend((0..100).map(|_| DeliveryResult::failed(reason.clone())));
        results.extend(align_tickets((0..50).map(|i| ok_ticket(&format!("u{i}"))).collect(), 50));

        assert_eq!(results.len(), 250);
        assert!(results[..100].iter().all(DeliveryResult::is_ok));
        assert!(results[100..200].iter().all(|r| !r.is_ok()));
        assert!(results[200..].iter().all(DeliveryResult::is_ok));
        assert_eq!(results[0].ticket_id.as_deref(), Some("t0"));
        assert_eq!(results[200].ticket_id.as_deref(), Some("u0"));
    }

    #[test]
    fn test_align_tickets_preserves_order_and_errors() {
        let results = align_tickets(
            vec![ok_ticket("a"), err_ticket("invalid token"), ok_ticket("b")],
            3,
        );
        assert_eq!(results[0].ticket_id.as_deref(), Some("a"));
        assert_eq!(results[1].error.as_deref(), Some("invalid token"));
        assert_eq!(results[2].ticket_id.as_deref(), Some("b"));
    }

    #[test]
    fn test_align_tickets_pads_short_response() {
        let results = align_tickets(vec![ok_ticket("a")], 3);
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(!results[1].is_ok());
        assert!(!results[2].is_ok());
    }

    #[test]
    fn test_align_tickets_drops_extras() {
        let results = align_tickets(vec![ok_ticket("a"), ok_ticket("b")], 1);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_receipt_device_not_registered() {
        let receipt = Receipt {
            status: "error".to_string(),
            details: Some(ReceiptDetails {
                error: Some(DEVICE_NOT_REGISTERED.to_string()),
            }),
        };
        assert!(!receipt.is_ok());
        assert!(receipt.is_device_not_registered());
        assert_eq!(receipt.error_reason(), DEVICE_NOT_REGISTERED);
    }

    #[test]
    fn test_receipt_transient_error_keeps_token() {
        let receipt = Receipt {
            status: "error".to_string(),
            details: Some(ReceiptDetails {
                error: Some("MessageRateExceeded".to_string()),
            }),
        };
        assert!(!receipt.is_device_not_registered());
        assert_eq!(receipt.error_reason(), "MessageRateExceeded");
    }

    #[test]
    fn test_receipt_ok() {
        let receipt = Receipt {
            status: "ok".to_string(),
            details: None,
        };
        assert!(receipt.is_ok());
        assert!(!receipt.is_device_not_registered());
    }
}
