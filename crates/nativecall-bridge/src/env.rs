// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The shared web-content environment the host injects native modules into.
//
// `GlobalEnv` stands in for the page's global object: named globals, the
// optional `webkit.messageHandlers` namespace, and the callback slots native
// code answers through.

use std::collections::HashMap;
use std::sync::Arc;

use nativecall_core::config::BridgeConfig;
use nativecall_core::types::is_truthy;
use serde_json::Value;

use crate::callback::CallbackRegistry;
use crate::object::NativeObject;
use crate::traits::{MessageHandler, WrappedModule};

/// A named global.
#[derive(Debug, Clone)]
pub enum Global {
    /// A raw direct-object module injected by the host.
    Native(Arc<NativeObject>),
    /// A module already replaced by its promise-style wrapper.
    Wrapped(WrappedModule),
    /// Any other data.
    Value(Value),
}

impl Global {
    /// Objects are always truthy; plain values follow JavaScript rules.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Native(_) | Self::Wrapped(_) => true,
            Self::Value(value) => is_truthy(value),
        }
    }
}

/// An entry of `webkit.messageHandlers`.
#[derive(Clone)]
pub enum Handler {
    Native(Arc<dyn MessageHandler>),
    Wrapped(WrappedModule),
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Native(_) => f.write_str("Native(..)"),
            Self::Wrapped(module) => f.debug_tuple("Wrapped").field(module).finish(),
        }
    }
}

/// The `webkit` namespace of an iOS `WKWebView` page.
#[derive(Debug, Clone, Default)]
pub struct Webkit {
    message_handlers: HashMap<String, Handler>,
}

impl Webkit {
    pub fn message_handler(&self, name: &str) -> Option<&Handler> {
        self.message_handlers.get(name)
    }

    pub fn set_message_handler(&mut self, name: &str, handler: Handler) {
        self.message_handlers.insert(name.to_owned(), handler);
    }

    pub fn message_handler_names(&self) -> impl Iterator<Item = &str> {
        self.message_handlers.keys().map(String::as_str)
    }
}

/// The page's global object.
#[derive(Debug)]
pub struct GlobalEnv {
    globals: HashMap<String, Global>,
    webkit: Option<Webkit>,
    callbacks: CallbackRegistry,
    config: BridgeConfig,
}

impl Default for GlobalEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalEnv {
    pub fn new() -> Self {
        Self::with_config(BridgeConfig::default())
    }

    pub fn with_config(config: BridgeConfig) -> Self {
        Self {
            globals: HashMap::new(),
            webkit: None,
            callbacks: CallbackRegistry::new(&config.callback_suffix),
            config,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Callback slots for this environment. Clone it into native code that
    /// needs to answer calls.
    pub fn callbacks(&self) -> &CallbackRegistry {
        &self.callbacks
    }

    /// Invoke callback slot `name` with an untyped payload, as native code
    /// would. Returns `false` if no call is waiting on that slot.
    pub fn call_slot(&self, name: &str, payload: Value) -> bool {
        self.callbacks.call_slot(name, payload)
    }

    // -- Globals --

    pub fn get(&self, name: &str) -> Option<&Global> {
        self.globals.get(name)
    }

    pub fn set(&mut self, name: &str, global: Global) -> Option<Global> {
        self.globals.insert(name.to_owned(), global)
    }

    pub fn remove(&mut self, name: &str) -> Option<Global> {
        self.globals.remove(name)
    }

    /// Inject a direct-object module.
    pub fn set_native(&mut self, name: &str, module: NativeObject) {
        self.set(name, Global::Native(Arc::new(module)));
    }

    pub fn set_value(&mut self, name: &str, value: impl Into<Value>) {
        self.set(name, Global::Value(value.into()));
    }

    // -- webkit.messageHandlers --

    pub fn webkit(&self) -> Option<&Webkit> {
        self.webkit.as_ref()
    }

    /// The `webkit` namespace, created empty if the page has none yet.
    pub fn webkit_mut(&mut self) -> &mut Webkit {
        self.webkit.get_or_insert_with(Webkit::default)
    }

    /// Register a message-channel module under `webkit.messageHandlers[name]`.
    pub fn set_message_handler(&mut self, name: &str, handler: impl MessageHandler + 'static) {
        self.webkit_mut()
            .set_message_handler(name, Handler::Native(Arc::new(handler)));
    }

    pub fn message_handler(&self, name: &str) -> Option<&Handler> {
        self.webkit.as_ref()?.message_handler(name)
    }

    /// The installed wrapper for `name`, whichever shape it came from.
    /// A direct-object global takes precedence.
    pub fn module(&self, name: &str) -> Option<WrappedModule> {
        if let Some(Global::Wrapped(module)) = self.get(name) {
            return Some(module.clone());
        }
        match self.message_handler(name) {
            Some(Handler::Wrapped(module)) => Some(module.clone()),
            _ => None,
        }
    }
}
