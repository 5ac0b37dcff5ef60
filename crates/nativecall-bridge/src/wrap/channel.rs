// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Wrapper for message-channel modules (`webkit.messageHandlers[name]`).
//
// The channel only understands one primitive, post-message, so a call is
// flattened into a single named-field payload. Nothing is validated here:
// rejecting malformed payloads is the native side's job.

use std::sync::Arc;
use std::time::Duration;

use nativecall_core::error::Result;
use nativecall_core::types::{ModuleMethodParameter, PlatformShape};
use serde_json::{Map, Value};

use crate::callback::{CallbackRegistry, PendingCall, await_callback};
use crate::traits::{MessageHandler, ModuleInvoker, PostedMessage};

/// Promise-style façade over a [`MessageHandler`].
pub struct MessageChannelModule {
    module_name: String,
    registry: CallbackRegistry,
    handler: Arc<dyn MessageHandler>,
    method_field: String,
    call_timeout: Option<Duration>,
}

impl MessageChannelModule {
    pub fn wrap(
        registry: &CallbackRegistry,
        module_name: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        Self {
            module_name: module_name.to_owned(),
            registry: registry.clone(),
            handler,
            method_field: "method".into(),
            call_timeout: None,
        }
    }

    /// Use `field` instead of `method` to carry the method name.
    pub fn with_method_field(mut self, field: &str) -> Self {
        self.method_field = field.to_owned();
        self
    }

    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// `{ <method_field>: method }` merged with one field per parameter.
    /// Later fields overwrite earlier ones, the method field included.
    pub fn build_payload(&self, method: &str, params: Vec<ModuleMethodParameter>) -> Map<String, Value> {
        let mut body = Map::new();
        body.insert(self.method_field.clone(), Value::String(method.to_owned()));
        for param in params {
            body.insert(param.param_name, param.param_value);
        }
        body
    }
}

impl ModuleInvoker for MessageChannelModule {
    fn module_name(&self) -> &str {
        &self.module_name
    }

    fn shape(&self) -> PlatformShape {
        PlatformShape::MessageChannel
    }

    fn invoke(&self, method: &str, params: Vec<ModuleMethodParameter>) -> Result<PendingCall> {
        let body = self.build_payload(method, params);
        let handler = Arc::clone(&self.handler);
        let call = await_callback(&self.registry, &self.module_name, method, move |responder| {
            handler.post_message(PostedMessage { body, responder })
        });

        Ok(match self.call_timeout {
            Some(limit) => call.with_timeout(limit),
            None => call,
        })
    }
}
