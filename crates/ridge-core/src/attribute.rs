//! Per-session attribute store.
//!
//! Keys and values are opaque to the session. Values compare by identity,
//! so `replace` and `remove_if` act as compare-and-swap against the exact
//! value a caller previously read. That is enough to build lazily
//! initialised per-session state without extra locks:
//!
//! ```
//! use ridge_core::attribute::{AttributeKey, AttributeMap, AttributeValue};
//!
//! const COUNTER: AttributeKey = AttributeKey::new("app.counter");
//!
//! let attrs = AttributeMap::new();
//! let fresh = AttributeValue::new(0u32);
//! let winner = attrs.set_if_absent(COUNTER, fresh.clone()).unwrap_or(fresh);
//! assert_eq!(winner.downcast_ref::<u32>(), Some(&0));
//! ```

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Name of an attribute. Cheap to clone; `const` when built from a literal.
///
/// The attachment slot uses a reserved key that no name can collide with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributeKey {
    name: Cow<'static, str>,
    reserved: bool,
}

impl AttributeKey {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            reserved: false,
        }
    }

    /// `scope.name`, for keys built at runtime.
    pub fn scoped(scope: &str, name: &str) -> Self {
        Self {
            name: Cow::Owned(format!("{scope}.{name}")),
            reserved: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_reserved(&self) -> bool {
        self.reserved
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reserved {
            write!(f, "<{}>", self.name)
        } else {
            f.write_str(&self.name)
        }
    }
}

/// Reserved key backing `Session::attachment`.
pub const ATTACHMENT_KEY: AttributeKey = AttributeKey {
    name: Cow::Borrowed("attachment"),
    reserved: true,
};

/// A shared, type-erased attribute value.
#[derive(Clone)]
pub struct AttributeValue(Arc<dyn Any + Send + Sync>);

impl AttributeValue {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn from_arc(value: Arc<dyn Any + Send + Sync>) -> Self {
        Self(value)
    }

    /// The value stored by a bare `set_flag`.
    pub fn flag() -> Self {
        Self::new(true)
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.0).downcast::<T>().ok()
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }
}

impl PartialEq for AttributeValue {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for AttributeValue {}

impl fmt::Debug for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttributeValue({:p})", self.addr())
    }
}

/// Thread-safe attribute map. All operations are atomic per key.
#[derive(Default)]
pub struct AttributeMap {
    entries: DashMap<AttributeKey, AttributeValue>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn get(&self, key: &AttributeKey) -> Option<AttributeValue> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    pub fn get_or(&self, key: &AttributeKey, default: AttributeValue) -> AttributeValue {
        self.get(key).unwrap_or(default)
    }

    /// Typed lookup. None if absent or of a different type.
    pub fn get_as<T: Any + Send + Sync>(&self, key: &AttributeKey) -> Option<Arc<T>> {
        self.get(key).and_then(|v| v.downcast::<T>())
    }

    /// Overwrite, returning the previous value.
    pub fn set(&self, key: AttributeKey, value: AttributeValue) -> Option<AttributeValue> {
        self.entries.insert(key, value)
    }

    pub fn set_flag(&self, key: AttributeKey) -> Option<AttributeValue> {
        self.set(key, AttributeValue::flag())
    }

    /// Insert only if absent. Returns the existing value when one was there,
    /// None when `value` was stored.
    pub fn set_if_absent(&self, key: AttributeKey, value: AttributeValue) -> Option<AttributeValue> {
        match self.entries.entry(key) {
            Entry::Occupied(existing) => Some(existing.get().clone()),
            Entry::Vacant(slot) => {
                slot.insert(value);
                None
            }
        }
    }

    pub fn remove(&self, key: &AttributeKey) -> Option<AttributeValue> {
        self.entries.remove(key).map(|(_, v)| v)
    }

    /// Remove only if the current value is `expected`.
    pub fn remove_if(&self, key: &AttributeKey, expected: &AttributeValue) -> bool {
        self.entries.remove_if(key, |_, v| v == expected).is_some()
    }

    /// Swap in `new` only if the current value is `expected`.
    pub fn replace(
        &self,
        key: &AttributeKey,
        expected: &AttributeValue,
        new: AttributeValue,
    ) -> bool {
        match self.entries.get_mut(key) {
            Some(mut current) if *current == *expected => {
                *current = new;
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, key: &AttributeKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> Vec<AttributeKey> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
