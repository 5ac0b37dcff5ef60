// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Wrapper for direct-object modules (Android `addJavascriptInterface` style).
//
// Every callable key the reflector finds becomes an invocable method. The
// native method runs synchronously with the positional parameter values and
// answers through its callback slot.

use std::collections::HashMap;
use std::time::Duration;

use nativecall_core::error::{BridgeError, Result};
use nativecall_core::types::{ModuleMethodParameter, PlatformShape};
use serde_json::Value;
use tracing::{debug, warn};

use crate::callback::{CallbackRegistry, PendingCall, await_callback};
use crate::object::{NativeCall, NativeMethod, NativeObject};
use crate::reflect::get_keys;
use crate::traits::ModuleInvoker;

/// Promise-style façade over a [`NativeObject`].
pub struct DirectObjectModule {
    module_name: String,
    registry: CallbackRegistry,
    methods: HashMap<String, NativeMethod>,
    /// Discovery order, without duplicates.
    order: Vec<String>,
    call_timeout: Option<Duration>,
}

impl DirectObjectModule {
    /// Discover the callable members of `module` and wrap them.
    ///
    /// Each key resolves through the prototype chain, so an own member
    /// shadows an inherited one with the same name.
    pub fn wrap(registry: &CallbackRegistry, module_name: &str, module: &NativeObject) -> Self {
        let mut methods = HashMap::new();
        let mut order = Vec::new();
        for key in get_keys(module) {
            let Some(method) = module.get(&key).and_then(|p| p.as_method()) else {
                continue;
            };
            if !methods.contains_key(&key) {
                order.push(key.clone());
                methods.insert(key, NativeMethod::clone(method));
            }
        }
        debug!(module = module_name, methods = ?order, "wrapped direct-object module");

        Self {
            module_name: module_name.to_owned(),
            registry: registry.clone(),
            methods,
            order,
            call_timeout: None,
        }
    }

    /// Apply `timeout` to every call made through this wrapper.
    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }
}

impl ModuleInvoker for DirectObjectModule {
    fn module_name(&self) -> &str {
        &self.module_name
    }

    fn shape(&self) -> PlatformShape {
        PlatformShape::DirectObject
    }

    fn invoke(&self, method: &str, params: Vec<ModuleMethodParameter>) -> Result<PendingCall> {
        let Some(native) = self.methods.get(method) else {
            warn!(module = %self.module_name, method, "invoke of unknown method");
            return Err(BridgeError::UnknownMethod {
                module: self.module_name.clone(),
                method: method.to_owned(),
            });
        };

        let args: Vec<Value> = params.into_iter().map(|p| p.param_value).collect();
        let native = NativeMethod::clone(native);
        let call = await_callback(&self.registry, &self.module_name, method, move |responder| {
            native(NativeCall { args, responder })
        });

        Ok(match self.call_timeout {
            Some(limit) => call.with_timeout(limit),
            None => call,
        })
    }

    fn methods(&self) -> Vec<String> {
        self.order.clone()
    }
}
