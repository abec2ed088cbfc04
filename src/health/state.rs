use serde::{Deserialize, Serialize};

use crate::error::HealthProbeError;
use crate::traits::Response;

/// Message published when no server address is known.
pub const NOT_CONFIGURED_MESSAGE: &str = "server not configured";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Checking,
    Ok,
    Error,
}

/// Health of the currently active server.
///
/// Held in memory only; every process starts in [`HealthStatus::Checking`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthState {
    pub status: HealthStatus,
    pub is_available: bool,
    pub message: Option<String>,
}

impl HealthState {
    pub fn checking() -> Self {
        Self {
            status: HealthStatus::Checking,
            is_available: false,
            message: None,
        }
    }

    pub fn ok() -> Self {
        Self {
            status: HealthStatus::Ok,
            is_available: true,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Error,
            is_available: false,
            message: Some(message.into()),
        }
    }

    pub fn not_configured() -> Self {
        Self::error(NOT_CONFIGURED_MESSAGE)
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::checking()
    }
}

#[derive(Debug, Deserialize)]
struct HealthBody {
    status: String,
}

/// Judge a health endpoint response: HTTP 200 with a JSON body whose
/// `status` field is `"ok"`. Anything else is a failure.
pub fn probe_response(response: &Response) -> Result<(), HealthProbeError> {
    if response.status != 200 {
        return Err(HealthProbeError::Status(response.status));
    }
    let body: HealthBody = response
        .json()
        .map_err(|e| HealthProbeError::InvalidBody(e.to_string()))?;
    if body.status == "ok" {
        Ok(())
    } else {
        Err(HealthProbeError::NotOk(body.status))
    }
}

/// Shorthand for [`probe_response`] when only the verdict matters.
pub fn is_healthy_response(response: &Response) -> bool {
    probe_response(response).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_initial_state_is_checking() {
        let state = HealthState::default();
        assert_eq!(state.status, HealthStatus::Checking);
        assert!(!state.is_available);
        assert!(state.message.is_none());
    }

    #[test]
    fn test_probe_response_requires_200_and_ok() {
        let ok = Response::json_body(200, &serde_json::json!({"status": "ok", "uptime": 12}));
        assert!(probe_response(&ok).is_ok());

        let degraded = Response::json_body(200, &serde_json::json!({"status": "degraded"}));
        assert_eq!(
            probe_response(&degraded),
            Err(HealthProbeError::NotOk("degraded".to_string()))
        );

        let created = Response::json_body(201, &serde_json::json!({"status": "ok"}));
        assert_eq!(probe_response(&created), Err(HealthProbeError::Status(201)));

        let html = Response::new(200, Bytes::from("<html></html>"));
        assert!(matches!(
            probe_response(&html),
            Err(HealthProbeError::InvalidBody(_))
        ));
    }

    #[test]
    fn test_state_serializes_camel_case() {
        let json = serde_json::to_value(HealthState::not_configured()).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["isAvailable"], false);
        assert_eq!(json["message"], NOT_CONFIGURED_MESSAGE);
    }
}
