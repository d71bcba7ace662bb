//! Operation Context
//!
//! Request metadata carried into the engines so that every money movement
//! can be traced back to the call that caused it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::net::IpAddr;
use uuid::Uuid;

/// Who asked for an operation, and under which correlation id.
///
/// The boundary builds one per request; engines only read it.
#[derive(Debug, Clone, Serialize)]
pub struct OperationContext {
    pub correlation_id: Uuid,

    /// User id forwarded by the upstream authentication layer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_user_id: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<IpAddr>,

    pub received_at: DateTime<Utc>,
}

impl OperationContext {
    /// Fresh context with a generated correlation id
    pub fn new() -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            request_user_id: None,
            client_ip: None,
            received_at: Utc::now(),
        }
    }

    /// Reuse a correlation id supplied by the caller
    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    pub fn with_request_user(mut self, user_id: i64) -> Self {
        self.request_user_id = Some(user_id);
        self
    }

    pub fn with_client_ip(mut self, ip: IpAddr) -> Self {
        self.client_ip = Some(ip);
        self
    }

    /// Span wrapping the work done for this context
    pub fn span(&self, operation: &'static str) -> tracing::Span {
        tracing::info_span!(
            "operation",
            operation,
            correlation_id = %self.correlation_id,
            request_user_id = ?self.request_user_id,
            client_ip = ?self.client_ip,
        )
    }
}

impl Default for OperationContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_new_context_has_correlation_id() {
        let first = OperationContext::new();
        let second = OperationContext::new();

        assert_ne!(first.correlation_id, second.correlation_id);
        assert!(first.request_user_id.is_none());
    }

    #[test]
    fn test_builder_overrides() {
        let correlation_id = Uuid::new_v4();
        let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);

        let context = OperationContext::new()
            .with_correlation_id(correlation_id)
            .with_request_user(7)
            .with_client_ip(ip);

        assert_eq!(context.correlation_id, correlation_id);
        assert_eq!(context.request_user_id, Some(7));
        assert_eq!(context.client_ip, Some(ip));
    }

    #[test]
    fn test_serialization_skips_missing_fields() {
        let json = serde_json::to_value(OperationContext::new()).unwrap();

        assert!(json.get("correlation_id").is_some());
        assert!(json.get("request_user_id").is_none());
        assert!(json.get("client_ip").is_none());
    }
}
