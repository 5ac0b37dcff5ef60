// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Callback-to-future adapter.
//
// Native code never returns a value to the caller directly: it answers later
// by calling a named callback slot. The registry below hands every call its
// own one-shot completion keyed by `SlotKey`, so two outstanding calls to the
// same method cannot steal each other's answer. Entries are removed as soon
// as they settle, time out, or the waiting future is dropped.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use nativecall_core::error::{BridgeError, Result};
use nativecall_core::types::{CallOutcome, ModuleMethodError, SlotKey};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Sleep;
use tracing::{debug, warn};

type Completion = oneshot::Sender<CallOutcome>;

/// Outstanding completions: slot name -> call id -> sender.
///
/// Call ids grow monotonically, so the first entry of each bucket is the
/// oldest outstanding call for that slot name.
#[derive(Default)]
struct Slots {
    by_name: HashMap<String, BTreeMap<u64, Completion>>,
}

impl Slots {
    fn take(&mut self, key: &SlotKey) -> Option<Completion> {
        let bucket = self.by_name.get_mut(key.name())?;
        let tx = bucket.remove(&key.call_id());
        if bucket.is_empty() {
            self.by_name.remove(key.name());
        }
        tx
    }

    fn take_oldest(&mut self, name: &str) -> Option<(u64, Completion)> {
        let bucket = self.by_name.get_mut(name)?;
        let entry = bucket.pop_first();
        if bucket.is_empty() {
            self.by_name.remove(name);
        }
        entry
    }
}

/// Registry of in-flight native calls for one environment.
///
/// Cheap to clone; clones share the same slots.
#[derive(Clone)]
pub struct CallbackRegistry {
    slots: Arc<Mutex<Slots>>,
    next_id: Arc<AtomicU64>,
    suffix: Arc<str>,
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new("Callback")
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("suffix", &self.suffix)
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl CallbackRegistry {
    /// Create a registry whose slot names end in `suffix`.
    pub fn new(suffix: &str) -> Self {
        Self {
            slots: Arc::new(Mutex::new(Slots::default())),
            next_id: Arc::new(AtomicU64::new(1)),
            suffix: Arc::from(suffix),
        }
    }

    // Every critical section is a single map operation, so a panic elsewhere
    // cannot leave the slots half-updated.
    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserve a fresh slot for a call to `module.method`.
    pub fn register(&self, module: &str, method: &str) -> (SlotKey, oneshot::Receiver<CallOutcome>) {
        let call_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let key = SlotKey::new(module, method, &self.suffix, call_id);
        let (tx, rx) = oneshot::channel();
        self.lock()
            .by_name
            .entry(key.name().to_owned())
            .or_default()
            .insert(call_id, tx);
        debug!(slot = %key, "registered callback slot");
        (key, rx)
    }

    /// Settle exactly the call identified by `key`.
    ///
    /// Returns `false` if the call was already settled, timed out, or
    /// abandoned by its caller.
    pub fn settle(&self, key: &SlotKey, outcome: CallOutcome) -> bool {
        let tx = self.lock().take(key);
        match tx {
            Some(tx) => send_outcome(tx, key, outcome),
            None => {
                warn!(slot = %key, "callback for a call that is no longer pending");
                false
            }
        }
    }

    /// Settle the oldest outstanding call whose slot is named `name`.
    ///
    /// This is the untyped native contract, `window[name](payload)`.
    pub fn settle_by_name(&self, name: &str, outcome: CallOutcome) -> bool {
        let oldest = self.lock().take_oldest(name);
        match oldest {
            Some((call_id, tx)) => {
                debug!(slot = name, call_id, "settling oldest call by slot name");
                send_outcome(tx, format_args!("{name}#{call_id}"), outcome)
            }
            None => {
                warn!(slot = name, "callback slot invoked with no pending call");
                false
            }
        }
    }

    /// Legacy entry point: decode `payload` by its `isError` field and settle
    /// the oldest call on `name`.
    pub fn call_slot(&self, name: &str, payload: Value) -> bool {
        self.settle_by_name(name, CallOutcome::from_payload(payload))
    }

    /// Drop a pending call without settling it.
    pub fn cancel(&self, key: &SlotKey) -> bool {
        let removed = self.lock().take(key).is_some();
        if removed {
            debug!(slot = %key, "cancelled pending call");
        }
        removed
    }

    pub fn is_pending(&self, key: &SlotKey) -> bool {
        self.lock()
            .by_name
            .get(key.name())
            .is_some_and(|bucket| bucket.contains_key(&key.call_id()))
    }

    /// Number of calls still waiting for native code.
    pub fn pending_count(&self) -> usize {
        self.lock().by_name.values().map(BTreeMap::len).sum()
    }

    /// Number of calls waiting on one slot name.
    pub fn pending_for(&self, name: &str) -> usize {
        self.lock().by_name.get(name).map_or(0, BTreeMap::len)
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }
}

fn send_outcome(tx: Completion, slot: impl std::fmt::Display, outcome: CallOutcome) -> bool {
    let failed = outcome.is_failure();
    if tx.send(outcome).is_err() {
        debug!(%slot, "caller stopped waiting before the callback arrived");
        return false;
    }
    debug!(%slot, failed, "settled native call");
    true
}

/// Handle given to native code for answering one call.
///
/// Clone it freely (e.g. into a worker thread); only the first settlement
/// has an effect.
#[derive(Debug, Clone)]
pub struct Responder {
    registry: CallbackRegistry,
    key: SlotKey,
}

impl Responder {
    pub fn slot(&self) -> &SlotKey {
        &self.key
    }

    /// The slot name native code would see on the global object.
    pub fn slot_name(&self) -> &str {
        self.key.name()
    }

    pub fn resolve(&self, value: impl Into<Value>) -> bool {
        self.settle(CallOutcome::Success(value.into()))
    }

    pub fn reject(&self, error: ModuleMethodError) -> bool {
        self.settle(CallOutcome::Failure(error))
    }

    /// Answer with an untyped payload; a truthy `isError` makes it a failure.
    pub fn deliver(&self, payload: Value) -> bool {
        self.settle(CallOutcome::from_payload(payload))
    }

    pub fn settle(&self, outcome: CallOutcome) -> bool {
        self.registry.settle(&self.key, outcome)
    }
}

enum CallState {
    Waiting(oneshot::Receiver<CallOutcome>),
    Failed(BridgeError),
    Done,
}

/// Future returned by `invoke`: resolves when native code answers the call.
///
/// Dropping it before native answers removes the registry entry.
#[must_use = "a pending call does nothing unless awaited"]
pub struct PendingCall {
    key: SlotKey,
    registry: CallbackRegistry,
    state: CallState,
    limit: Option<Duration>,
    timer: Option<Pin<Box<Sleep>>>,
}

impl PendingCall {
    pub fn slot(&self) -> &SlotKey {
        &self.key
    }

    /// Give up after `after`, removing the registry entry.
    ///
    /// The timer starts on first poll.
    pub fn with_timeout(mut self, after: Duration) -> Self {
        self.limit = Some(after);
        self.timer = None;
        self
    }

    fn finish(&mut self, result: Result<Value>) -> Poll<Result<Value>> {
        self.state = CallState::Done;
        self.timer = None;
        Poll::Ready(result)
    }
}

impl std::fmt::Debug for PendingCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state {
            CallState::Waiting(_) => "waiting",
            CallState::Failed(_) => "failed",
            CallState::Done => "done",
        };
        f.debug_struct("PendingCall")
            .field("slot", &self.key.to_string())
            .field("state", &state)
            .field("limit", &self.limit)
            .finish()
    }
}

impl Future for PendingCall {
    type Output = Result<Value>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match std::mem::replace(&mut this.state, CallState::Done) {
            CallState::Failed(err) => return this.finish(Err(err)),
            CallState::Done => {
                return Poll::Ready(Err(BridgeError::Cancelled(this.key.to_string())));
            }
            CallState::Waiting(mut rx) => {
                let polled = Pin::new(&mut rx).poll(cx);
                match polled {
                    Poll::Ready(Ok(outcome)) => {
                        let result = outcome.into_result().map_err(BridgeError::Native);
                        return this.finish(result);
                    }
                    Poll::Ready(Err(_)) => {
                        let err = BridgeError::Cancelled(this.key.to_string());
                        return this.finish(Err(err));
                    }
                    Poll::Pending => this.state = CallState::Waiting(rx),
                }
            }
        }

        if let Some(limit) = this.limit {
            let timer = this
                .timer
                .get_or_insert_with(|| Box::pin(tokio::time::sleep(limit)));
            if timer.as_mut().poll(cx).is_ready() {
                this.registry.cancel(&this.key);
                warn!(slot = %this.key, after_ms = limit.as_millis() as u64, "native call timed out");
                let err = BridgeError::Timeout {
                    slot: this.key.to_string(),
                    after_ms: limit.as_millis() as u64,
                };
                return this.finish(Err(err));
            }
        }

        Poll::Pending
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        if matches!(self.state, CallState::Waiting(_)) {
            self.registry.cancel(&self.key);
        }
    }
}

/// Register a slot for `module.method`, then run `trigger` to start the
/// native call.
///
/// The slot exists before `trigger` runs, so native code may answer
/// synchronously from inside it. If `trigger` fails, the slot is removed and
/// the returned future resolves to [`BridgeError::Trigger`].
pub fn await_callback<F>(
    registry: &CallbackRegistry,
    module: &str,
    method: &str,
    trigger: F,
) -> PendingCall
where
    F: FnOnce(Responder) -> Result<()>,
{
    let (key, rx) = registry.register(module, method);
    let responder = Responder {
        registry: registry.clone(),
        key: key.clone(),
    };

    let state = match trigger(responder) {
        Ok(()) => CallState::Waiting(rx),
        Err(err) => {
            registry.cancel(&key);
            warn!(slot = %key, error = %err, "native trigger failed");
            CallState::Failed(match err {
                BridgeError::Trigger(_) => err,
                other => BridgeError::Trigger(other.to_string()),
            })
        }
    };

    PendingCall {
        key,
        registry: registry.clone(),
        state,
        limit: None,
        timer: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn resolves_with_exact_payload() {
        let registry = CallbackRegistry::default();
        let payload = json!({ "nested": [1, 2, { "ok": true }] });
        let sent = payload.clone();
        let call = await_callback(&registry, "Foo", "bar", move |responder| {
            assert_eq!(responder.slot_name(), "Foo_barCallback");
            responder.deliver(sent);
            Ok(())
        });
        assert_eq!(call.await.unwrap(), payload);
        assert_eq!(registry.pending_count(), 0);
    }

    #[tokio::test]
    async fn rejects_with_exact_payload() {
        let registry = CallbackRegistry::default();
        let payload = json!({ "isError": true, "message": "boom" });
        let sent = payload.clone();
        let call = await_callback(&registry, "Foo", "bar", move |responder| {
            responder.deliver(sent);
            Ok(())
        });
        let err = call.await.unwrap_err();
        assert_eq!(err.native_payload(), Some(&payload));
    }

    #[tokio::test]
    async fn slot_exists_before_trigger_runs() {
        let registry = CallbackRegistry::default();
        let seen = registry.clone();
        let call = await_callback(&registry, "Foo", "bar", move |responder| {
            assert!(seen.is_pending(responder.slot()));
            Ok(())
        });
        assert!(registry.is_pending(call.slot()));
        assert!(registry.call_slot("Foo_barCallback", json!(1)));
        assert_eq!(call.await.unwrap(), json!(1));
    }

    #[tokio::test]
    async fn only_first_settlement_counts() {
        let registry = CallbackRegistry::default();
        let mut kept = None;
        let call = await_callback(&registry, "Foo", "bar", |responder| {
            kept = Some(responder);
            Ok(())
        });
        let responder = kept.unwrap();
        assert!(responder.resolve(1));
        assert!(!responder.resolve(2));
        assert!(!responder.reject(ModuleMethodError::new("late")));
        assert_eq!(call.await.unwrap(), json!(1));
    }

    #[tokio::test]
    async fn concurrent_calls_to_same_method_do_not_strand() {
        let registry = CallbackRegistry::default();
        let mut responders = Vec::new();
        let first = await_callback(&registry, "Foo", "bar", |r| {
            responders.push(r);
            Ok(())
        });
        let second = await_callback(&registry, "Foo", "bar", |r| {
            responders.push(r);
            Ok(())
        });
        assert_eq!(registry.pending_for("Foo_barCallback"), 2);
        assert_ne!(first.slot(), second.slot());

        // Answer out of order.
        responders[1].resolve("second");
        responders[0].resolve("first");
        assert_eq!(first.await.unwrap(), json!("first"));
        assert_eq!(second.await.unwrap(), json!("second"));
    }

    #[tokio::test]
    async fn settle_by_name_picks_oldest() {
        let registry = CallbackRegistry::default();
        let first = await_callback(&registry, "Foo", "bar", |_| Ok(()));
        let second = await_callback(&registry, "Foo", "bar", |_| Ok(()));
        assert!(registry.call_slot("Foo_barCallback", json!("a")));
        assert!(registry.call_slot("Foo_barCallback", json!("b")));
        assert!(!registry.call_slot("Foo_barCallback", json!("c")));
        assert_eq!(first.await.unwrap(), json!("a"));
        assert_eq!(second.await.unwrap(), json!("b"));
    }

    #[tokio::test]
    async fn different_methods_do_not_interfere() {
        let registry = CallbackRegistry::default();
        let bar = await_callback(&registry, "Foo", "bar", |_| Ok(()));
        let baz = await_callback(&registry, "Foo", "baz", |_| Ok(()));
        let other = await_callback(&registry, "Qux", "bar", |_| Ok(()));
        registry.call_slot("Foo_bazCallback", json!("baz"));
        registry.call_slot("Qux_barCallback", json!("qux"));
        registry.call_slot("Foo_barCallback", json!("bar"));
        assert_eq!(bar.await.unwrap(), json!("bar"));
        assert_eq!(baz.await.unwrap(), json!("baz"));
        assert_eq!(other.await.unwrap(), json!("qux"));
    }

    #[tokio::test]
    async fn trigger_failure_surfaces_through_future() {
        let registry = CallbackRegistry::default();
        let call = await_callback(&registry, "Foo", "bar", |_| {
            Err(BridgeError::Trigger("native threw".into()))
        });
        assert_eq!(registry.pending_count(), 0);
        match call.await {
            Err(BridgeError::Trigger(msg)) => assert_eq!(msg, "native threw"),
            other => panic!("expected trigger error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn dropping_the_future_frees_the_slot() {
        let registry = CallbackRegistry::default();
        let call = await_callback(&registry, "Foo", "bar", |_| Ok(()));
        let key = call.slot().clone();
        drop(call);
        assert!(!registry.is_pending(&key));
        assert!(!registry.call_slot("Foo_barCallback", json!(1)));
    }

    #[tokio::test]
    async fn timeout_frees_the_slot() {
        let registry = CallbackRegistry::default();
        let call = await_callback(&registry, "Foo", "slow", |_| Ok(()))
            .with_timeout(Duration::from_millis(20));
        match call.await {
            Err(BridgeError::Timeout { slot, after_ms }) => {
                assert!(slot.starts_with("Foo_slowCallback#"));
                assert_eq!(after_ms, 20);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(registry.pending_count(), 0);
    }

    #[tokio::test]
    async fn answer_before_timeout_wins() {
        let registry = CallbackRegistry::default();
        let call = await_callback(&registry, "Foo", "fast", |r| {
            r.resolve(5);
            Ok(())
        })
        .with_timeout(Duration::from_secs(5));
        assert_eq!(call.await.unwrap(), json!(5));
    }

    #[tokio::test]
    async fn answers_from_another_thread() {
        let registry = CallbackRegistry::default();
        let call = await_callback(&registry, "Foo", "bar", |responder| {
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(5));
                responder.resolve("from thread");
            });
            Ok(())
        });
        assert_eq!(call.await.unwrap(), json!("from thread"));
    }

    #[tokio::test]
    async fn unanswered_call_never_settles() {
        let registry = CallbackRegistry::default();
        let call = await_callback(&registry, "Foo", "silent", |_| Ok(()));
        assert_eq!(registry.pending_count(), 1);

        let outer = tokio::time::timeout(Duration::from_millis(50), call).await;
        assert!(outer.is_err(), "call settled without an answer: {outer:?}");
        // The elapsed outer timeout dropped the call, which frees its slot.
        assert_eq!(registry.pending_count(), 0);
    }

    #[test]
    fn settle_by_name_reports_abandoned_receiver() {
        let registry = CallbackRegistry::default();
        let (key, rx) = registry.register("Foo", "bar");
        drop(rx);
        assert!(!registry.call_slot(key.name(), json!(1)));
        assert!(!registry.is_pending(&key));
    }

    #[test]
    fn custom_suffix_names_slots() {
        let registry = CallbackRegistry::new("Done");
        let (key, _rx) = registry.register("Foo", "bar");
        assert_eq!(key.name(), "Foo_barDone");
        assert_eq!(registry.suffix(), "Done");
    }
}
