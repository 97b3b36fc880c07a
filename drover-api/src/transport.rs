//! Push transport implementations
//!
//! The production transport POSTs wake-up payloads to an HTTP push gateway
//! (the external notification service). The loopback transport accepts every
//! send and is the development default when no gateway is configured; with
//! it, delivery outcomes come entirely from device callbacks.

use async_trait::async_trait;
use drover_core::{
    DeviceId, DeviceStatusSource, DeviceStatusUpdate, ExecutionId, PushTransport,
    StatusSourceError, TransportError,
};
use serde::Serialize;
use std::time::Duration;

/// JSON body sent to the push gateway for one device.
#[derive(Debug, Serialize)]
struct PushMessage<'a> {
    device_id: &'a str,
    payload: &'a str,
}

/// [`PushTransport`] over an HTTP push gateway.
///
/// One POST per device; 404 from the gateway means the device has no
/// registered channel, any other non-success status is a rejection. The
/// batcher owns retries; this client makes exactly one attempt per call.
pub struct HttpPushTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpPushTransport {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl PushTransport for HttpPushTransport {
    async fn send(&self, device_id: &DeviceId, payload: &str) -> Result<(), TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&PushMessage {
                device_id: device_id.as_str(),
                payload,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout {
                        device_id: device_id.clone(),
                    }
                } else {
                    TransportError::Rejected {
                        device_id: device_id.clone(),
                        reason: e.to_string(),
                    }
                }
            })?;

        match response.status() {
            status if status.is_success() => Ok(()),
            reqwest::StatusCode::NOT_FOUND => Err(TransportError::NoChannel {
                device_id: device_id.clone(),
            }),
            status => Err(TransportError::Rejected {
                device_id: device_id.clone(),
                reason: format!("gateway returned {status}"),
            }),
        }
    }
}

/// Transport that accepts every send without delivering anything.
///
/// Used when no push gateway is configured: devices learn about work through
/// their regular manifest checks and report through the status callback.
#[derive(Debug, Default)]
pub struct LoopbackTransport;

#[async_trait]
impl PushTransport for LoopbackTransport {
    async fn send(&self, device_id: &DeviceId, _payload: &str) -> Result<(), TransportError> {
        tracing::trace!(device_id = %device_id, "Loopback transport accepted send");
        Ok(())
    }
}

/// Status source for deployments where devices report exclusively through
/// the callback endpoint: polling never observes anything new, and silent
/// devices end in `timeout`.
#[derive(Debug, Default)]
pub struct CallbackOnlyStatusSource;

#[async_trait]
impl DeviceStatusSource for CallbackOnlyStatusSource {
    async fn poll(
        &self,
        _exec_id: ExecutionId,
        _device_ids: &[DeviceId],
    ) -> Result<Vec<DeviceStatusUpdate>, StatusSourceError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drover_core::new_execution_id;

    #[tokio::test]
    async fn test_loopback_accepts_everything() {
        let transport = LoopbackTransport;
        assert!(transport.send(&DeviceId::new("d-1"), "payload").await.is_ok());
    }

    #[tokio::test]
    async fn test_callback_only_source_reports_nothing() {
        let source = CallbackOnlyStatusSource;
        let updates = source
            .poll(new_execution_id(), &[DeviceId::new("d-1")])
            .await
            .unwrap();
        assert!(updates.is_empty());
    }
}
