//! ViewId - Cheap-to-clone camera view identifier
//!
//! Uses Arc<str> internally so per-view results can carry their id
//! across worker tasks without reallocating.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

/// View identifier with cheap cloning.
///
/// Views are short codes such as `TL` or `BC`, or a channel name such as
/// `ephys`. Cloning only bumps a reference count.
///
/// # Examples
/// ```
/// use contracts::ViewId;
///
/// let id: ViewId = "BC".into();
/// let id2 = id.clone();
/// assert_eq!(id, id2);
/// assert_eq!(id.as_str(), "BC");
/// ```
#[derive(Clone, Default)]
pub struct ViewId(Arc<str>);

impl ViewId {
    /// Create a new ViewId from a string slice.
    #[inline]
    pub fn new(s: &str) -> Self {
        Self(Arc::from(s))
    }

    /// Get the underlying string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for ViewId {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for ViewId {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ViewId {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ViewId {
    #[inline]
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for ViewId {
    #[inline]
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl From<&String> for ViewId {
    #[inline]
    fn from(s: &String) -> Self {
        Self(Arc::from(s.as_str()))
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ViewId({:?})", self.0)
    }
}

impl PartialEq for ViewId {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for ViewId {}

impl PartialEq<str> for ViewId {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for ViewId {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

impl PartialEq<String> for ViewId {
    #[inline]
    fn eq(&self, other: &String) -> bool {
        self.0.as_ref() == other
    }
}

// Ordered by name so reports list views deterministically
impl PartialOrd for ViewId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ViewId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

// Hash must match str hash for HashMap lookups by &str
impl Hash for ViewId {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

impl Serialize for ViewId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ViewId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashMap};

    #[test]
    fn test_clone_is_cheap() {
        let id1: ViewId = "TL".into();
        let id2 = id1.clone();

        assert_eq!(id1.as_str().as_ptr(), id2.as_str().as_ptr());
    }

    #[test]
    fn test_equality() {
        let id: ViewId = "BC".into();
        assert_eq!(id, "BC");
        assert_eq!(id, String::from("BC"));
        assert_eq!(id, ViewId::from("BC"));
    }

    #[test]
    fn test_hashmap_key() {
        let mut map: HashMap<ViewId, i32> = HashMap::new();
        map.insert("TL".into(), 1);
        map.insert("TR".into(), 2);

        assert_eq!(map.get("TL"), Some(&1));
        assert_eq!(map.get("TR"), Some(&2));
    }

    #[test]
    fn test_btreemap_orders_by_name() {
        let mut map: BTreeMap<ViewId, i32> = BTreeMap::new();
        map.insert("TR".into(), 1);
        map.insert("BC".into(), 2);
        map.insert("L".into(), 3);

        let keys: Vec<&str> = map.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["BC", "L", "TR"]);
    }

    #[test]
    fn test_serde() {
        let id: ViewId = "ephys".into();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"ephys\"");

        let parsed: ViewId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }
}
