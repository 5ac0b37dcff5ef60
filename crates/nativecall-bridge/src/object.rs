// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Direct-object native modules.
//
// A direct-object module is what the host injects into the page (Android's
// `addJavascriptInterface` style): a bag of properties, some of them
// callable, plus an optional prototype it inherits members from. Modules are
// declared up front with `NativeObject::builder()` so the callable surface is
// known when the wrapper is built.

use std::sync::Arc;

use nativecall_core::error::Result;
use serde_json::Value;

use crate::callback::Responder;

/// A native method body.
///
/// Runs synchronously on the caller's thread. It must eventually answer via
/// the call's responder (or the environment's callback slot); returning `Err`
/// means the call raised before it could start.
pub type NativeMethod = Arc<dyn Fn(NativeCall) -> Result<()> + Send + Sync>;

/// One invocation as seen by native code.
#[derive(Debug)]
pub struct NativeCall {
    /// Positional argument values, in the order the caller passed them.
    pub args: Vec<Value>,
    pub responder: Responder,
}

impl NativeCall {
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    pub fn resolve(&self, value: impl Into<Value>) -> bool {
        self.responder.resolve(value)
    }

    /// Answer with an untyped payload (`isError` decides failure).
    pub fn deliver(&self, payload: Value) -> bool {
        self.responder.deliver(payload)
    }
}

/// A property value on a native object.
#[derive(Clone)]
pub enum Property {
    Method(NativeMethod),
    Value(Value),
}

impl Property {
    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Method(_))
    }

    pub fn as_method(&self) -> Option<&NativeMethod> {
        match self {
            Self::Method(method) => Some(method),
            Self::Value(_) => None,
        }
    }
}

impl std::fmt::Debug for Property {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Method(_) => f.write_str("Method(..)"),
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    property: Property,
    enumerable: bool,
}

/// A native module object with ordered own properties and an optional
/// prototype.
#[derive(Debug, Clone, Default)]
pub struct NativeObject {
    entries: Vec<Entry>,
    prototype: Option<Arc<NativeObject>>,
}

impl NativeObject {
    pub fn builder() -> NativeObjectBuilder {
        NativeObjectBuilder::default()
    }

    /// An object whose own properties mirror the fields of a JSON object.
    /// Non-object values have no properties.
    pub fn from_value(value: &Value) -> Self {
        let mut builder = Self::builder();
        if let Value::Object(fields) = value {
            for (name, field) in fields {
                builder = builder.value(name.as_str(), field.clone());
            }
        }
        builder.build()
    }

    /// Own enumerable property names, in declaration order.
    pub fn own_keys(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.enumerable)
            .map(|e| e.name.clone())
            .collect()
    }

    /// Every own property name, enumerable or not, in declaration order.
    pub fn own_property_names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    pub fn prototype(&self) -> Option<&NativeObject> {
        self.prototype.as_deref()
    }

    pub fn get_own(&self, name: &str) -> Option<&Property> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| &e.property)
    }

    /// Look a property up on the object, then along its prototype chain.
    pub fn get(&self, name: &str) -> Option<&Property> {
        let mut current = Some(self);
        while let Some(object) = current {
            if let Some(property) = object.get_own(name) {
                return Some(property);
            }
            current = object.prototype();
        }
        None
    }
}

/// Declares a [`NativeObject`]. Re-declaring a name replaces the earlier
/// property in place.
#[derive(Default)]
pub struct NativeObjectBuilder {
    entries: Vec<Entry>,
    prototype: Option<Arc<NativeObject>>,
}

impl NativeObjectBuilder {
    /// An enumerable method.
    pub fn method<F>(self, name: &str, body: F) -> Self
    where
        F: Fn(NativeCall) -> Result<()> + Send + Sync + 'static,
    {
        self.property(name, Property::Method(Arc::new(body)), true)
    }

    /// A method that does not show up in own-key enumeration, like members
    /// defined on a class.
    pub fn hidden_method<F>(self, name: &str, body: F) -> Self
    where
        F: Fn(NativeCall) -> Result<()> + Send + Sync + 'static,
    {
        self.property(name, Property::Method(Arc::new(body)), false)
    }

    /// A plain data property.
    pub fn value(self, name: &str, value: impl Into<Value>) -> Self {
        self.property(name, Property::Value(value.into()), true)
    }

    pub fn property(mut self, name: &str, property: Property, enumerable: bool) -> Self {
        let entry = Entry {
            name: name.to_owned(),
            property,
            enumerable,
        };
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
        self
    }

    pub fn prototype(mut self, prototype: NativeObject) -> Self {
        self.prototype = Some(Arc::new(prototype));
        self
    }

    pub fn build(self) -> NativeObject {
        NativeObject {
            entries: self.entries,
            prototype: self.prototype,
        }
    }
}
