// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Value types that cross the web/native boundary: call parameters, error
// payloads, call outcomes and callback slot keys.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// A named argument passed to `invoke`.
///
/// The direct-object shape only uses `param_value` (positionally); the
/// message-channel shape serialises both into a named-field payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleMethodParameter {
    pub param_name: String,
    pub param_value: Value,
}

impl ModuleMethodParameter {
    pub fn new(param_name: impl Into<String>, param_value: impl Into<Value>) -> Self {
        Self {
            param_name: param_name.into(),
            param_value: param_value.into(),
        }
    }
}

/// Build a call parameter. Pure; equal inputs give equal parameters.
pub fn make_parameter(
    param_name: impl Into<String>,
    param_value: impl Into<Value>,
) -> ModuleMethodParameter {
    ModuleMethodParameter::new(param_name, param_value)
}

/// JavaScript truthiness of a JSON value.
///
/// `null`, `false`, `0`, `NaN` and `""` are falsy; every object and array is
/// truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Failure reported by the native layer, `{ isError: true, message, ... }`.
///
/// The payload is retained untouched so callers see exactly what native sent.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleMethodError {
    message: String,
    payload: Value,
}

impl ModuleMethodError {
    /// A fresh error payload with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        let mut body = Map::new();
        body.insert("isError".into(), Value::Bool(true));
        body.insert("message".into(), Value::String(message.clone()));
        Self {
            message,
            payload: Value::Object(body),
        }
    }

    /// Wrap a payload native code already built.
    pub fn from_payload(payload: Value) -> Self {
        let message = match payload.get("message") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        Self { message, payload }
    }

    /// Attach an extra field to the payload (ignored for non-object payloads).
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if let Value::Object(body) = &mut self.payload {
            body.insert(key.into(), value.into());
        }
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn into_payload(self) -> Value {
        self.payload
    }
}

impl std::fmt::Display for ModuleMethodError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.payload)
        } else {
            f.write_str(&self.message)
        }
    }
}

impl Serialize for ModuleMethodError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.payload.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ModuleMethodError {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from_payload)
    }
}

/// Result of one native call, as decided by the native layer.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    Success(Value),
    Failure(ModuleMethodError),
}

impl CallOutcome {
    /// Decode a payload sent through the untyped callback contract.
    ///
    /// A truthy `isError` field marks a failure; every other payload,
    /// whatever its shape, is a success value.
    pub fn from_payload(payload: Value) -> Self {
        if payload.get("isError").is_some_and(is_truthy) {
            Self::Failure(ModuleMethodError::from_payload(payload))
        } else {
            Self::Success(payload)
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    pub fn into_result(self) -> Result<Value, ModuleMethodError> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(err) => Err(err),
        }
    }
}

impl From<Result<Value, ModuleMethodError>> for CallOutcome {
    fn from(result: Result<Value, ModuleMethodError>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(err) => Self::Failure(err),
        }
    }
}

/// Callback slot name for a (module, method) pair: `<module>_<method><suffix>`.
pub fn slot_name(module: &str, method: &str, suffix: &str) -> String {
    format!("{module}_{method}{suffix}")
}

/// Identity of one in-flight call.
///
/// Calls to the same method share a slot name but never a `call_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotKey {
    module: String,
    method: String,
    name: String,
    call_id: u64,
}

impl SlotKey {
    pub fn new(module: &str, method: &str, suffix: &str, call_id: u64) -> Self {
        Self {
            module: module.to_owned(),
            method: method.to_owned(),
            name: slot_name(module, method, suffix),
            call_id,
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Slot name shared by every call to this (module, method).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call_id(&self) -> u64 {
        self.call_id
    }
}

impl std::fmt::Display for SlotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.name, self.call_id)
    }
}

/// How a native module is exposed to web content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlatformShape {
    /// An injected object with synchronously callable members.
    DirectObject,
    /// A `webkit.messageHandlers[name]` channel with a post-message primitive.
    MessageChannel,
}

impl PlatformShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectObject => "direct-object",
            Self::MessageChannel => "message-channel",
        }
    }
}

impl std::fmt::Display for PlatformShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
