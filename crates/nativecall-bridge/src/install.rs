// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shape detection and installation.
//
// Detection order (first match wins):
//   1. a truthy global `name`                 -> direct-object wrapper
//   2. `webkit.messageHandlers[name]`         -> message-channel wrapper
//   3. neither                                -> nothing happens
//
// Installing twice returns the wrapper already in place instead of wrapping
// the wrapper.

use std::sync::Arc;

use nativecall_core::types::PlatformShape;
use tracing::{debug, info};

use crate::env::{Global, GlobalEnv, Handler};
use crate::object::NativeObject;
use crate::traits::WrappedModule;
use crate::wrap::{DirectObjectModule, MessageChannelModule};

/// Result of a successful [`install`].
#[derive(Debug, Clone)]
pub struct InstalledModule {
    pub shape: PlatformShape,
    pub module: WrappedModule,
}

/// Which native shape, if any, `name` is exposed as.
pub fn detect(env: &GlobalEnv, name: &str) -> Option<PlatformShape> {
    if env.get(name).is_some_and(Global::is_truthy) {
        return Some(PlatformShape::DirectObject);
    }
    if env.message_handler(name).is_some() {
        return Some(PlatformShape::MessageChannel);
    }
    None
}

/// Build the wrapper for `name` without touching the environment.
///
/// Returns the existing wrapper if `name` is already installed.
pub fn wrap_detected(env: &GlobalEnv, name: &str) -> Option<WrappedModule> {
    match detect(env, name)? {
        PlatformShape::DirectObject => env.get(name).map(|global| wrap_global(env, name, global)),
        PlatformShape::MessageChannel => {
            env.message_handler(name).map(|handler| wrap_handler(env, name, handler))
        }
    }
}

/// Detect the shape of `name`, wrap it, and put the wrapper where the raw
/// module was. Returns `None` (and changes nothing) if no shape is detected.
pub fn install(env: &mut GlobalEnv, name: &str) -> Option<InstalledModule> {
    let Some(shape) = detect(env, name) else {
        debug!(module = name, "no native module found; nothing installed");
        return None;
    };
    if let Some(expected) = crate::native_shape().filter(|expected| *expected != shape) {
        debug!(module = name, detected = %shape, %expected, "shape differs from the platform default");
    }
    let module = wrap_detected(env, name)?;

    match shape {
        PlatformShape::DirectObject => {
            env.set(name, Global::Wrapped(module.clone()));
        }
        PlatformShape::MessageChannel => {
            env.webkit_mut()
                .set_message_handler(name, Handler::Wrapped(module.clone()));
        }
    }
    info!(module = name, shape = %shape, "installed native module");

    Some(InstalledModule { shape, module })
}

fn wrap_global(env: &GlobalEnv, name: &str, global: &Global) -> WrappedModule {
    let object = match global {
        Global::Wrapped(existing) => {
            debug!(module = name, "already installed; keeping existing wrapper");
            return existing.clone();
        }
        Global::Native(object) => Arc::clone(object),
        Global::Value(value) => Arc::new(NativeObject::from_value(value)),
    };
    let config = env.config();
    WrappedModule::new(
        DirectObjectModule::wrap(env.callbacks(), name, &object)
            .with_call_timeout(config.call_timeout()),
    )
}

fn wrap_handler(env: &GlobalEnv, name: &str, handler: &Handler) -> WrappedModule {
    match handler {
        Handler::Wrapped(existing) => {
            debug!(module = name, "already installed; keeping existing wrapper");
            existing.clone()
        }
        Handler::Native(raw) => {
            let config = env.config();
            WrappedModule::new(
                MessageChannelModule::wrap(env.callbacks(), name, Arc::clone(raw))
                    .with_method_field(&config.method_field)
                    .with_call_timeout(config.call_timeout()),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::CallbackRegistry;
    use crate::traits::PostedMessage;
    use nativecall_core::config::BridgeConfig;
    use nativecall_core::error::{BridgeError, Result};
    use nativecall_core::types::make_parameter;
    use serde_json::json;
    use std::time::Duration;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .with_test_writer()
            .try_init();
    }

    /// `Foo.bar()` answers 42 through the global `Foo_barCallback` slot.
    fn env_with_foo() -> GlobalEnv {
        let mut env = GlobalEnv::new();
        let slots = env.callbacks().clone();
        env.set_native(
            "Foo",
            NativeObject::builder()
                .method("bar", move |_| {
                    slots.call_slot("Foo_barCallback", json!(42));
                    Ok(())
                })
                .build(),
        );
        env
    }

    fn baz_handler(slots: CallbackRegistry) -> impl Fn(PostedMessage) -> Result<()> + Send + Sync {
        move |message: PostedMessage| {
            let x = message.field("x").and_then(|v| v.as_i64()).unwrap_or_default();
            slots.call_slot("Baz_quxCallback", json!(x + 1));
            Ok(())
        }
    }

    #[tokio::test]
    async fn direct_object_resolves() {
        init_tracing();
        let mut env = env_with_foo();
        let installed = install(&mut env, "Foo").unwrap();
        assert_eq!(installed.shape, PlatformShape::DirectObject);

        let foo = env.module("Foo").unwrap();
        assert!(foo.same_as(&installed.module));
        assert_eq!(foo.invoke("bar", vec![]).unwrap().await.unwrap(), json!(42));
    }

    #[tokio::test]
    async fn direct_object_rejects_with_payload() {
        let mut env = GlobalEnv::new();
        let slots = env.callbacks().clone();
        env.set_native(
            "Foo",
            NativeObject::builder()
                .method("bar", move |_| {
                    slots.call_slot("Foo_barCallback", json!({ "isError": true, "message": "boom" }));
                    Ok(())
                })
                .build(),
        );
        install(&mut env, "Foo").unwrap();

        let err = env.module("Foo").unwrap().invoke("bar", vec![]).unwrap().await.unwrap_err();
        assert_eq!(
            err.native_payload(),
            Some(&json!({ "isError": true, "message": "boom" }))
        );
    }

    #[tokio::test]
    async fn message_channel_resolves() {
        init_tracing();
        let mut env = GlobalEnv::new();
        let handler = baz_handler(env.callbacks().clone());
        env.set_message_handler("Baz", handler);

        let installed = install(&mut env, "Baz").unwrap();
        assert_eq!(installed.shape, PlatformShape::MessageChannel);
        assert!(matches!(env.message_handler("Baz"), Some(Handler::Wrapped(_))));

        let baz = env.module("Baz").unwrap();
        let result = baz.invoke("qux", vec![make_parameter("x", 5)]).unwrap().await.unwrap();
        assert_eq!(result, json!(6));
    }

    #[test]
    fn nothing_detected_is_a_no_op() {
        let mut env = GlobalEnv::new();
        assert!(detect(&env, "Nope").is_none());
        assert!(install(&mut env, "Nope").is_none());
        assert!(env.get("Nope").is_none());
        assert!(env.webkit().is_none());
    }

    #[test]
    fn empty_webkit_namespace_is_not_a_match() {
        let mut env = GlobalEnv::new();
        env.webkit_mut();
        assert!(install(&mut env, "Nope").is_none());
    }

    #[test]
    fn direct_object_wins_when_both_present() {
        let mut env = env_with_foo();
        let handler = baz_handler(env.callbacks().clone());
        env.set_message_handler("Foo", handler);

        assert_eq!(detect(&env, "Foo"), Some(PlatformShape::DirectObject));
        let installed = install(&mut env, "Foo").unwrap();
        assert_eq!(installed.shape, PlatformShape::DirectObject);
        // The channel entry is left untouched.
        assert!(matches!(env.message_handler("Foo"), Some(Handler::Native(_))));
    }

    #[test]
    fn falsy_global_falls_through_to_channel() {
        let mut env = GlobalEnv::new();
        env.set_value("Baz", json!(null));
        let handler = baz_handler(env.callbacks().clone());
        env.set_message_handler("Baz", handler);
        assert_eq!(detect(&env, "Baz"), Some(PlatformShape::MessageChannel));
    }

    #[tokio::test]
    async fn reinstall_keeps_the_working_wrapper() {
        let mut env = env_with_foo();
        let first = install(&mut env, "Foo").unwrap();
        let second = install(&mut env, "Foo").unwrap();
        assert!(first.module.same_as(&second.module));
        assert_eq!(second.module.methods(), vec!["bar"]);
        assert_eq!(
            env.module("Foo").unwrap().invoke("bar", vec![]).unwrap().await.unwrap(),
            json!(42)
        );
    }

    #[test]
    fn wrap_detected_leaves_env_untouched() {
        let env = env_with_foo();
        let module = wrap_detected(&env, "Foo").unwrap();
        assert_eq!(module.module_name(), "Foo");
        assert!(matches!(env.get("Foo"), Some(Global::Native(_))));
        assert!(env.module("Foo").is_none());
    }

    #[test]
    fn unknown_method_after_install_fails_synchronously() {
        let mut env = env_with_foo();
        install(&mut env, "Foo").unwrap();
        let err = env.module("Foo").unwrap().invoke("nope", vec![]).unwrap_err();
        assert!(matches!(err, BridgeError::UnknownMethod { .. }));
    }

    #[test]
    fn data_global_wraps_with_no_methods() {
        let mut env = GlobalEnv::new();
        env.set_value("Cfg", json!({ "debug": true }));
        let installed = install(&mut env, "Cfg").unwrap();
        assert!(installed.module.methods().is_empty());
    }

    #[tokio::test]
    async fn config_timeout_applies_to_installed_modules() {
        let config = BridgeConfig {
            call_timeout_ms: Some(15),
            ..Default::default()
        };
        let mut env = GlobalEnv::with_config(config);
        env.set_native(
            "Slow",
            NativeObject::builder().method("wait", |_| Ok(())).build(),
        );
        install(&mut env, "Slow").unwrap();
        let err = env.module("Slow").unwrap().invoke("wait", vec![]).unwrap().await.unwrap_err();
        assert!(matches!(err, BridgeError::Timeout { after_ms: 15, .. }));
        assert_eq!(env.callbacks().pending_count(), 0);
    }

    #[tokio::test]
    async fn config_suffix_and_method_field_reach_channel() {
        let config = BridgeConfig {
            callback_suffix: "Reply".into(),
            method_field: "action".into(),
            ..Default::default()
        };
        let mut env = GlobalEnv::with_config(config);
        let slots = env.callbacks().clone();
        env.set_message_handler("Baz", move |message: PostedMessage| -> Result<()> {
            assert_eq!(message.responder.slot_name(), "Baz_quxReply");
            let action = message.field("action").cloned().unwrap_or_default();
            slots.call_slot("Baz_quxReply", action);
            Ok(())
        });
        install(&mut env, "Baz").unwrap();
        let call = env.module("Baz").unwrap().invoke("qux", vec![]).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(1), call).await.unwrap().unwrap();
        assert_eq!(result, json!("qux"));
    }
}
