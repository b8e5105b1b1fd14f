//! Journey instance identities
//!
//! An identity is the journey name plus the key/value pairs read from the
//! request (and the uniqueness token, if the journey declares one). Identities
//! travel between requests as a canonical token:
//!
//! ```text
//! <percent-encoded journey name>?<form-encoded pairs in declaration order>
//! ```
//!
//! Two identities are equal when their journey names match and their pair
//! *sets* match; the order pairs were added in does not matter.

use crate::{JourneyError, JourneyName, JourneyResult, UNIQUE_KEY};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use url::form_urlencoded;

/// Identity of one journey instance
#[derive(Clone, Debug)]
pub struct JourneyInstanceId {
    journey: JourneyName,
    keys: Vec<(String, String)>,
}

impl JourneyInstanceId {
    pub fn new(journey: impl Into<JourneyName>) -> Self {
        Self {
            journey: journey.into(),
            keys: Vec::new(),
        }
    }

    /// Add a key/value pair; an existing value for the key is replaced in place
    pub fn with_key(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.keys.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.keys.push((key, value)),
        }
    }

    pub fn journey(&self) -> &JourneyName {
        &self.journey
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.keys
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The uniqueness token, if this identity carries one
    pub fn unique_key(&self) -> Option<&str> {
        self.get(UNIQUE_KEY)
    }

    /// Key/value pairs in the order they were added
    pub fn keys(&self) -> impl Iterator<Item = (&str, &str)> {
        self.keys.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Canonical, URL-safe token for links and bookmarks
    pub fn to_token(&self) -> String {
        let mut token = urlencoding::encode(self.journey.as_str()).into_owned();
        if !self.keys.is_empty() {
            let mut query = form_urlencoded::Serializer::new(String::new());
            for (key, value) in &self.keys {
                query.append_pair(key, value);
            }
            token.push('?');
            token.push_str(&query.finish());
        }
        token
    }

    /// Parse a token produced by [`JourneyInstanceId::to_token`]
    pub fn parse(token: &str) -> JourneyResult<Self> {
        let (raw_name, raw_query) = match token.split_once('?') {
            Some((name, query)) => (name, Some(query)),
            None => (token, None),
        };

        let name = urlencoding::decode(raw_name)
            .map_err(|e| JourneyError::InvalidInstanceId(format!("{token}: {e}")))?;
        if name.is_empty() {
            return Err(JourneyError::InvalidInstanceId(format!(
                "{token}: missing journey name"
            )));
        }

        let mut id = Self::new(name.into_owned());
        let mut seen = HashSet::new();
        for (key, value) in form_urlencoded::parse(raw_query.unwrap_or_default().as_bytes()) {
            if key.is_empty() {
                return Err(JourneyError::InvalidInstanceId(format!(
                    "{token}: empty key"
                )));
            }
            if !seen.insert(key.clone()) {
                return Err(JourneyError::InvalidInstanceId(format!(
                    "{token}: duplicate key '{key}'"
                )));
            }
            id.keys.push((key.into_owned(), value.into_owned()));
        }

        Ok(id)
    }

    /// Order-independent key used by persistence stores
    pub fn storage_key(&self) -> String {
        let mut canonical = Self::new(self.journey.clone());
        canonical.keys = self
            .sorted_pairs()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        canonical.to_token()
    }

    fn sorted_pairs(&self) -> Vec<(&str, &str)> {
        let mut pairs: Vec<_> = self.keys().collect();
        pairs.sort_unstable();
        pairs
    }
}

impl PartialEq for JourneyInstanceId {
    fn eq(&self, other: &Self) -> bool {
        self.journey == other.journey
            && self.keys.len() == other.keys.len()
            && self.sorted_pairs() == other.sorted_pairs()
    }
}

impl Eq for JourneyInstanceId {}

impl Hash for JourneyInstanceId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.journey.hash(state);
        self.sorted_pairs().hash(state);
    }
}

impl std::fmt::Display for JourneyInstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_token())
    }
}

impl FromStr for JourneyInstanceId {
    type Err = JourneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for JourneyInstanceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_token())
    }
}

impl<'de> Deserialize<'de> for JourneyInstanceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        Self::parse(&token).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_token_format() {
        let id = JourneyInstanceId::new("journeyX")
            .with_key("personId", "42")
            .with_key(UNIQUE_KEY, "T1");
        assert_eq!(id.to_token(), "journeyX?personId=42&_key=T1");
        assert_eq!(id.unique_key(), Some("T1"));
    }

    #[test]
    fn test_token_without_keys() {
        let id = JourneyInstanceId::new("start");
        assert_eq!(id.to_token(), "start");
        assert_eq!(JourneyInstanceId::parse("start").unwrap(), id);
    }

    #[test]
    fn test_token_escapes_reserved_characters() {
        let id = JourneyInstanceId::new("add alert?")
            .with_key("reason", "a&b=c d")
            .with_key("note", "100%+");
        let token = id.to_token();
        assert!(token.starts_with("add%20alert%3F?"));

        let parsed = JourneyInstanceId::parse(&token).unwrap();
        assert_eq!(parsed, id);
        assert_eq!(parsed.get("reason"), Some("a&b=c d"));
        assert_eq!(parsed.get("note"), Some("100%+"));
    }

    #[test]
    fn test_equality_ignores_key_order() {
        let a = JourneyInstanceId::new("j").with_key("a", "1").with_key("b", "2");
        let b = JourneyInstanceId::new("j").with_key("b", "2").with_key("a", "1");
        assert_eq!(a, b);
        assert_eq!(a.storage_key(), b.storage_key());

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_inequality() {
        let base = JourneyInstanceId::new("j").with_key("a", "1");
        assert_ne!(base, JourneyInstanceId::new("k").with_key("a", "1"));
        assert_ne!(base, JourneyInstanceId::new("j").with_key("a", "2"));
        assert_ne!(base, base.clone().with_key("b", "2"));
    }

    #[test]
    fn test_insert_replaces_existing_key() {
        let id = JourneyInstanceId::new("j").with_key("a", "1").with_key("a", "2");
        assert_eq!(id.len(), 1);
        assert_eq!(id.get("a"), Some("2"));
    }

    #[test]
    fn test_parse_rejects_bad_tokens() {
        assert!(matches!(
            JourneyInstanceId::parse("?a=1"),
            Err(JourneyError::InvalidInstanceId(_))
        ));
        assert!(JourneyInstanceId::parse("j?a=1&a=2").is_err());
        assert!(JourneyInstanceId::parse("j?=1").is_err());
    }

    #[test]
    fn test_serde_as_token() {
        let id = JourneyInstanceId::new("j").with_key("personId", "42");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"j?personId=42\"");
        let back: JourneyInstanceId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
