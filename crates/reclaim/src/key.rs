//! Logical keys naming reclamation events.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Names the event "this particular object was reclaimed".
///
/// A key is cheap to clone and compares by its text. Within a scenario each
/// tracked object gets its own key; the same key may be reused by other
/// scenarios.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(Arc<str>);

impl Key {
    /// Creates a key from its text.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Returns the key text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Self(Arc::from(name))
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl From<&Key> for Key {
    fn from(key: &Key) -> Self {
        key.clone()
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Key {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for Key {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_key_compares_by_text() {
        let a = Key::from("ObservableQuery");
        let b = Key::from(String::from("ObservableQuery"));
        assert_eq!(a, b);
        assert_eq!(a, "ObservableQuery");
        assert_eq!(format!("{a}"), "ObservableQuery");
        assert_eq!(format!("{a:?}"), "\"ObservableQuery\"");
    }

    #[test]
    fn test_key_set_lookup_by_str() {
        let set: BTreeSet<Key> = ["cache", "queryInfo1"].into_iter().map(Key::from).collect();
        assert!(set.contains("cache"));
        assert!(!set.contains("queryInfo2"));
    }
}
