// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Nativecall — promise-style `invoke()` over WebView native modules.
//
// Hosts expose native modules to web content either as an injected object
// with callable members (Android) or as a `webkit.messageHandlers` channel
// (iOS). This crate detects which one is present, wraps it, and answers
// every call through a per-call callback slot.

pub mod callback;
pub mod env;
pub mod install;
pub mod object;
pub mod reflect;
pub mod traits;
pub mod wrap;

pub use callback::{CallbackRegistry, PendingCall, Responder, await_callback};
pub use env::{Global, GlobalEnv, Handler, Webkit};
pub use install::{InstalledModule, detect, install, wrap_detected};
pub use nativecall_core::{
    BridgeConfig, BridgeError, CallOutcome, ModuleMethodError, ModuleMethodParameter,
    PlatformShape, Result, make_parameter,
};
pub use object::{NativeCall, NativeObject, Property};
pub use reflect::get_keys;
pub use traits::{MessageHandler, ModuleInvoker, PostedMessage, WrappedModule};

/// The module shape the current target's WebView normally provides.
///
/// Detection never depends on this; it only tells integrators what to
/// expect.
pub fn native_shape() -> Option<PlatformShape> {
    #[cfg(target_os = "ios")]
    {
        // WKWebView: `webkit.messageHandlers[name].postMessage(...)`
        Some(PlatformShape::MessageChannel)
    }
    #[cfg(target_os = "android")]
    {
        // android.webkit.WebView: `addJavascriptInterface(object, name)`
        Some(PlatformShape::DirectObject)
    }
    #[cfg(not(any(target_os = "ios", target_os = "android")))]
    {
        None
    }
}
