// Copyright 2025 the RelTab Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::collections::BTreeMap;

use reltab_core::PathComponent;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// JSON key of an open null node. Text keys starting with it get one more in front.
const NULL_KEY: &str = "%";

/// The set of expanded nodes below one node of a pivot tree.
///
/// Each key is a pivot value whose node is open, or `None` for the null group; its entry holds
/// the open nodes beneath it.
///
/// Serializes as nested JSON objects keyed by pivot value. The null group's key is `"%"`, and a
/// pivot value that itself starts with `%` is written with an extra `%` in front. Deserialization
/// also accepts `true` for an open node with nothing open beneath it, and drops entries set to
/// `false`:
///
/// ```
/// use reltab_aggtree::OpenPaths;
///
/// let open: OpenPaths =
///     serde_json::from_str(r#"{"IT": true, "Ops": {"Night": {}, "%": true}, "HR": false}"#)
///         .unwrap();
/// assert!(open.is_open(&["Ops", "Night"]));
/// assert!(open.is_open(&[Some("Ops"), None]));
/// assert!(!open.is_open(&["HR"]));
/// assert_eq!(
///     serde_json::to_string(&open).unwrap(),
///     r#"{"IT":{},"Ops":{"%":{},"Night":{}}}"#
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenPaths(BTreeMap<Option<String>, OpenPaths>);

fn owned_key<S: PathComponent>(key: &S) -> Option<String> {
    key.component().map(str::to_owned)
}

impl OpenPaths {
    /// Nothing open.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open children, in key order with the null group first.
    pub fn children(&self) -> impl Iterator<Item = (Option<&str>, &Self)> + '_ {
        self.0.iter().map(|(k, v)| (k.as_deref(), v))
    }

    /// Open nodes below the child `key`, if it is open.
    pub fn get<S: PathComponent>(&self, key: S) -> Option<&Self> {
        self.0.get(&owned_key(&key))
    }

    /// Returns `true` if no child is open.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of open children at this level.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Opens the node at `path` and every node above it.
    pub fn open<S: PathComponent>(&mut self, path: &[S]) {
        let mut level = self;
        for key in path {
            level = level.0.entry(owned_key(key)).or_default();
        }
    }

    /// Closes the node at `path` together with everything open beneath it.
    ///
    /// Returns `true` if the node was open. An empty path names this level itself, which cannot
    /// be closed from here; use [`OpenPaths::clear`].
    pub fn close<S: PathComponent>(&mut self, path: &[S]) -> bool {
        let Some((last, parents)) = path.split_last() else {
            return false;
        };
        let mut level = self;
        for key in parents {
            match level.0.get_mut(&owned_key(key)) {
                Some(next) => level = next,
                None => return false,
            }
        }
        level.0.remove(&owned_key(last)).is_some()
    }

    /// Closes everything.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Returns `true` if the node at `path` is open. The empty path is always open.
    pub fn is_open<S: PathComponent>(&self, path: &[S]) -> bool {
        let mut level = self;
        for key in path {
            match level.get(key) {
                Some(next) => level = next,
                None => return false,
            }
        }
        true
    }

    /// Closes every node deeper than `depth` levels below this one.
    pub fn truncate(&mut self, depth: usize) {
        match depth.checked_sub(1) {
            None => self.0.clear(),
            Some(rest) => {
                for child in self.0.values_mut() {
                    child.truncate(rest);
                }
            }
        }
    }
}

fn json_key(key: Option<&str>) -> String {
    match key {
        None => NULL_KEY.to_owned(),
        Some(text) if text.starts_with(NULL_KEY) => format!("{NULL_KEY}{text}"),
        Some(text) => text.to_owned(),
    }
}

fn from_json_key(key: String) -> Option<String> {
    if key == NULL_KEY {
        None
    } else if let Some(text) = key.strip_prefix(NULL_KEY) {
        Some(text.to_owned())
    } else {
        Some(key)
    }
}

impl Serialize for OpenPaths {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // Sorted by JSON key, so the output does not depend on the escaping.
        let entries: BTreeMap<String, &Self> =
            self.children().map(|(k, v)| (json_key(k), v)).collect();
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (key, below) in entries {
            map.serialize_entry(&key, below)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for OpenPaths {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Entry {
            Flag(bool),
            Nested(OpenPaths),
        }

        let raw = BTreeMap::<String, Entry>::deserialize(deserializer)?;
        Ok(Self(
            raw.into_iter()
                .filter_map(|(key, entry)| {
                    let below = match entry {
                        Entry::Flag(true) => Self::default(),
                        Entry::Flag(false) => return None,
                        Entry::Nested(nested) => nested,
                    };
                    Some((from_json_key(key), below))
                })
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_intermediate_nodes() {
        let mut open = OpenPaths::new();
        open.open(&["a", "b", "c"]);
        assert!(open.is_open(&["a"]));
        assert!(open.is_open(&["a", "b"]));
        assert!(open.is_open(&["a", "b", "c"]));
        assert!(!open.is_open(&["b"]));
        assert!(open.is_open::<&str>(&[]));
        assert_eq!(open.len(), 1);
    }

    #[test]
    fn close_removes_the_subtree() {
        let mut open = OpenPaths::new();
        open.open(&["a", "b", "c"]);
        open.open(&["a", "x"]);
        assert!(open.close(&["a", "b"]));
        assert!(!open.is_open(&["a", "b", "c"]));
        assert!(open.is_open(&["a", "x"]));
        assert!(!open.close(&["a", "b"]));
        assert!(!open.close(&["zzz", "b"]));
        assert!(!open.close::<&str>(&[]));
    }

    #[test]
    fn truncate_limits_depth() {
        let mut open = OpenPaths::new();
        open.open(&["a", "b", "c"]);
        open.open(&["d"]);
        open.truncate(2);
        assert!(open.is_open(&["a", "b"]));
        assert!(!open.is_open(&["a", "b", "c"]));
        assert!(open.is_open(&["d"]));
        open.truncate(0);
        assert!(open.is_empty());
    }

    #[test]
    fn json_accepts_flags_and_nested_maps() {
        let open: OpenPaths =
            serde_json::from_str(r#"{"a": {"b": true, "z": false}, "c": true, "d": false}"#)
                .unwrap();
        let mut expected = OpenPaths::new();
        expected.open(&["a", "b"]);
        expected.open(&["c"]);
        assert_eq!(open, expected);
        assert_eq!(
            serde_json::to_string(&open).unwrap(),
            r#"{"a":{"b":{}},"c":{}}"#
        );

        assert!(serde_json::from_str::<OpenPaths>(r#"{"a": 1}"#).is_err());
    }

    #[test]
    fn null_nodes_round_trip_through_json() {
        let mut open = OpenPaths::new();
        open.open(&[None, Some("x")]);
        open.open(&[Some("%"), None]);
        open.open(&[Some("")]);
        assert!(open.is_open(&[None::<&str>]));
        assert!(!open.is_open(&[""; 2]));

        let json = serde_json::to_string(&open).unwrap();
        assert_eq!(json, r#"{"":{},"%":{"x":{}},"%%":{"%":{}}}"#);
        let back: OpenPaths = serde_json::from_str(&json).unwrap();
        assert_eq!(back, open);
        assert_eq!(
            back.children().map(|(k, _)| k).collect::<Vec<_>>(),
            [None, Some(""), Some("%")]
        );
    }
}
