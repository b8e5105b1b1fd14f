//! Value sources: where identity-relevant request values come from

use std::collections::{BTreeMap, HashMap};

/// A lookup of request values by key (route parameters, query string, ...)
pub trait ValueSource: Send + Sync {
    /// The value for `key`, if present
    fn value(&self, key: &str) -> Option<String>;
}

impl ValueSource for HashMap<String, String> {
    fn value(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl ValueSource for BTreeMap<String, String> {
    fn value(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl<T: ValueSource + ?Sized> ValueSource for &T {
    fn value(&self, key: &str) -> Option<String> {
        (**self).value(key)
    }
}

impl<T: ValueSource + ?Sized> ValueSource for Box<T> {
    fn value(&self, key: &str) -> Option<String> {
        (**self).value(key)
    }
}
