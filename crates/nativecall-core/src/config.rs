// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bridge configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// Settings shared by every wrapped module in one environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Appended to `<module>_<method>` to name the callback slot.
    pub callback_suffix: String,
    /// Payload field carrying the method name on the message channel.
    pub method_field: String,
    /// Timeout applied to every `invoke`. `None` waits for native forever.
    pub call_timeout_ms: Option<u64>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            callback_suffix: "Callback".into(),
            method_field: "method".into(),
            call_timeout_ms: None,
        }
    }
}

impl BridgeConfig {
    /// Parse and validate a JSON config. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    /// Write the config as pretty JSON.
    pub fn persist(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.callback_suffix.is_empty() {
            return Err(BridgeError::Config("callback_suffix must not be empty".into()));
        }
        if self.method_field.is_empty() {
            return Err(BridgeError::Config("method_field must not be empty".into()));
        }
        if self.call_timeout_ms == Some(0) {
            return Err(BridgeError::Config(
                "call_timeout_ms must be positive; omit it to wait forever".into(),
            ));
        }
        Ok(())
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }
}
