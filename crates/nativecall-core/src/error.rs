// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for nativecall.

use serde_json::Value;
use thiserror::Error;

use crate::types::ModuleMethodError;

/// Top-level error type for all bridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    // -- Call outcomes --
    /// The native layer answered with an error payload. The payload is kept
    /// exactly as native sent it.
    #[error("native call failed: {0}")]
    Native(ModuleMethodError),

    #[error("module `{module}` has no callable method `{method}`")]
    UnknownMethod { module: String, method: String },

    #[error("native call raised while being triggered: {0}")]
    Trigger(String),

    #[error("no callback for {slot} within {after_ms} ms")]
    Timeout { slot: String, after_ms: u64 },

    #[error("call {0} was dropped before native code answered")]
    Cancelled(String),

    // -- Configuration / persistence --
    #[error("invalid bridge configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BridgeError {
    /// The raw native error payload, if this is a native-signaled failure.
    pub fn native_payload(&self) -> Option<&Value> {
        match self {
            Self::Native(err) => Some(err.payload()),
            _ => None,
        }
    }

    /// Whether the failure came from the native layer rather than the bridge.
    pub fn is_native(&self) -> bool {
        matches!(self, Self::Native(_) | Self::Trigger(_))
    }
}

impl From<ModuleMethodError> for BridgeError {
    fn from(err: ModuleMethodError) -> Self {
        Self::Native(err)
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn native_error_exposes_raw_payload() {
        let payload = json!({ "isError": true, "message": "boom", "code": 7 });
        let err = BridgeError::from(ModuleMethodError::from_payload(payload.clone()));
        assert_eq!(err.native_payload(), Some(&payload));
        assert!(err.is_native());
        assert_eq!(err.to_string(), "native call failed: boom");
    }

    #[test]
    fn bridge_errors_have_no_payload() {
        let err = BridgeError::UnknownMethod {
            module: "Foo".into(),
            method: "nope".into(),
        };
        assert!(err.native_payload().is_none());
        assert!(!err.is_native());
        assert_eq!(err.to_string(), "module `Foo` has no callable method `nope`");
    }
}
