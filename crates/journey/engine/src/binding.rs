//! Request binding: ordered request-value sources behind one lookup

use journey_types::ValueSource;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Where a set of request values came from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValueOrigin {
    Path,
    Query,
    Custom(String),
}

impl std::fmt::Display for ValueOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueOrigin::Path => write!(f, "path"),
            ValueOrigin::Query => write!(f, "query"),
            ValueOrigin::Custom(name) => write!(f, "{name}"),
        }
    }
}

/// Values from one origin of the request
#[derive(Clone, Debug)]
pub struct RequestValues {
    origin: ValueOrigin,
    values: HashMap<String, String>,
}

impl RequestValues {
    pub fn new(origin: ValueOrigin, values: HashMap<String, String>) -> Self {
        Self { origin, values }
    }

    /// Parse a form-encoded query string. The first occurrence of a key wins.
    pub fn query(raw: &str) -> Self {
        let raw = raw.strip_prefix('?').unwrap_or(raw);
        let mut values = HashMap::new();
        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            values
                .entry(key.into_owned())
                .or_insert_with(|| value.into_owned());
        }
        Self::new(ValueOrigin::Query, values)
    }

    /// Wrap decoded route parameters
    pub fn path<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let values = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::new(ValueOrigin::Path, values)
    }

    pub fn origin(&self) -> &ValueOrigin {
        &self.origin
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl ValueSource for RequestValues {
    fn value(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Ordered list of value sources; the first non-empty match wins.
///
/// Lookups are cached per key for the lifetime of the composite, which is one
/// request.
#[derive(Default)]
pub struct CompositeValueSource {
    sources: Vec<Box<dyn ValueSource>>,
    cache: Mutex<HashMap<String, Option<String>>>,
}

impl CompositeValueSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source with lower precedence than those already added
    pub fn with_source(mut self, source: impl ValueSource + 'static) -> Self {
        self.push(source);
        self
    }

    pub fn push(&mut self, source: impl ValueSource + 'static) {
        self.sources.push(Box::new(source));
        self.cache.get_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl ValueSource for CompositeValueSource {
    fn value(&self, key: &str) -> Option<String> {
        if let Some(cached) = self.cache.lock().get(key) {
            return cached.clone();
        }

        let found = self
            .sources
            .iter()
            .filter_map(|source| source.value(key))
            .find(|v| !v.is_empty());

        self.cache.lock().insert(key.to_string(), found.clone());
        found
    }
}

impl std::fmt::Debug for CompositeValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeValueSource")
            .field("sources", &self.sources.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSource {
        inner: HashMap<String, String>,
        lookups: Arc<AtomicUsize>,
    }

    impl ValueSource for CountingSource {
        fn value(&self, key: &str) -> Option<String> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.value(key)
        }
    }

    #[test]
    fn test_query_first_occurrence_wins() {
        let values = RequestValues::query("?personId=42&personId=7&name=J%C3%BCrgen+M");
        assert_eq!(values.origin(), &ValueOrigin::Query);
        assert_eq!(values.value("personId").as_deref(), Some("42"));
        assert_eq!(values.value("name").as_deref(), Some("Jürgen M"));
        assert_eq!(values.value("missing"), None);
    }

    #[test]
    fn test_path_values() {
        let values = RequestValues::path([("personId", "42")]);
        assert_eq!(values.origin().to_string(), "path");
        assert_eq!(values.len(), 1);
        assert_eq!(values.value("personId").as_deref(), Some("42"));
    }

    #[test]
    fn test_composite_precedence() {
        let composite = CompositeValueSource::new()
            .with_source(RequestValues::path([("personId", "1"), ("blank", "")]))
            .with_source(RequestValues::query("personId=2&blank=x&_key=T1"));

        assert_eq!(composite.value("personId").as_deref(), Some("1"));
        // empty values fall through to later sources
        assert_eq!(composite.value("blank").as_deref(), Some("x"));
        assert_eq!(composite.value("_key").as_deref(), Some("T1"));
        assert_eq!(composite.value("nope"), None);
    }

    #[test]
    fn test_composite_caches_lookups() {
        let lookups = Arc::new(AtomicUsize::new(0));
        let source = CountingSource {
            inner: HashMap::from([("personId".to_string(), "42".to_string())]),
            lookups: lookups.clone(),
        };
        let composite = CompositeValueSource::new().with_source(source);

        for _ in 0..3 {
            assert_eq!(composite.value("personId").as_deref(), Some("42"));
            assert_eq!(composite.value("absent"), None);
        }
        assert_eq!(lookups.load(Ordering::SeqCst), 2);
    }
}
