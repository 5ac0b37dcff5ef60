// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for the two native module shapes.
//
// Native hosts expose modules in one of two ways. The wrappers in `wrap`
// turn either into a `ModuleInvoker`, so web-side callers only ever see
// `invoke(method, params)`.

use std::sync::Arc;

use nativecall_core::error::Result;
use nativecall_core::types::{ModuleMethodParameter, PlatformShape};
use serde_json::{Map, Value};

use crate::callback::{PendingCall, Responder};

/// Uniform call surface over a native module.
pub trait ModuleInvoker: Send + Sync {
    /// Name the module was installed under.
    fn module_name(&self) -> &str;

    /// Which native shape this invoker wraps.
    fn shape(&self) -> PlatformShape;

    /// Start a native call and return a future for its answer.
    ///
    /// Errors returned here (rather than through the future) are programmer
    /// errors, e.g. a method the module does not have.
    fn invoke(&self, method: &str, params: Vec<ModuleMethodParameter>) -> Result<PendingCall>;

    /// Methods known up front. Message channels cannot know theirs.
    fn methods(&self) -> Vec<String> {
        Vec::new()
    }
}

/// A message posted to a native channel.
#[derive(Debug)]
pub struct PostedMessage {
    /// `{ method, <paramName>: <paramValue>, ... }`
    pub body: Map<String, Value>,
    /// Answers this particular call.
    pub responder: Responder,
}

impl PostedMessage {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.body.get(name)
    }
}

/// The post-message primitive of a `webkit.messageHandlers[name]` channel.
pub trait MessageHandler: Send + Sync {
    fn post_message(&self, message: PostedMessage) -> Result<()>;
}

impl<F> MessageHandler for F
where
    F: Fn(PostedMessage) -> Result<()> + Send + Sync,
{
    fn post_message(&self, message: PostedMessage) -> Result<()> {
        self(message)
    }
}

/// A native module after installation. Cheap to clone.
#[derive(Clone)]
pub struct WrappedModule(Arc<dyn ModuleInvoker>);

impl WrappedModule {
    pub fn new(invoker: impl ModuleInvoker + 'static) -> Self {
        Self(Arc::new(invoker))
    }

    pub fn invoke(&self, method: &str, params: Vec<ModuleMethodParameter>) -> Result<PendingCall> {
        self.0.invoke(method, params)
    }

    pub fn module_name(&self) -> &str {
        self.0.module_name()
    }

    pub fn shape(&self) -> PlatformShape {
        self.0.shape()
    }

    pub fn methods(&self) -> Vec<String> {
        self.0.methods()
    }

    /// Whether both handles wrap the same invoker.
    pub fn same_as(&self, other: &WrappedModule) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for WrappedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WrappedModule")
            .field("module", &self.module_name())
            .field("shape", &self.shape())
            .finish()
    }
}
