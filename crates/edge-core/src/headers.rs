//! Case-insensitive header multimap.
//!
//! Names are matched case-insensitively but the casing of the first write is
//! preserved for output. Every name holds a list of values; `Set-Cookie` in
//! particular is never comma-joined when the response is materialized.

use indexmap::IndexMap;

/// Values accepted by [`HeaderStore::set`] and [`HeaderStore::append`].
pub trait IntoHeaderValues {
    fn into_header_values(self) -> Vec<String>;
}

impl IntoHeaderValues for &str {
    fn into_header_values(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl IntoHeaderValues for String {
    fn into_header_values(self) -> Vec<String> {
        vec![self]
    }
}

impl IntoHeaderValues for &String {
    fn into_header_values(self) -> Vec<String> {
        vec![self.clone()]
    }
}

impl IntoHeaderValues for Vec<String> {
    fn into_header_values(self) -> Vec<String> {
        self
    }
}

impl IntoHeaderValues for Vec<&str> {
    fn into_header_values(self) -> Vec<String> {
        self.into_iter().map(String::from).collect()
    }
}

impl<const N: usize> IntoHeaderValues for [&str; N] {
    fn into_header_values(self) -> Vec<String> {
        self.into_iter().map(String::from).collect()
    }
}

impl IntoHeaderValues for &[String] {
    fn into_header_values(self) -> Vec<String> {
        self.to_vec()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    name: String,
    values: Vec<String>,
}

/// Ordered header multimap keyed by lowercase name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderStore {
    entries: IndexMap<String, Entry>,
}

impl HeaderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all values of `name`.
    pub fn set(&mut self, name: &str, values: impl IntoHeaderValues) {
        let values = values.into_header_values();
        let key = name.to_ascii_lowercase();
        match self.entries.get_mut(&key) {
            Some(entry) => entry.values = values,
            None => {
                self.entries.insert(
                    key,
                    Entry {
                        name: name.to_string(),
                        values,
                    },
                );
            }
        }
    }

    /// Add values after any existing ones.
    pub fn append(&mut self, name: &str, values: impl IntoHeaderValues) {
        let key = name.to_ascii_lowercase();
        self.entries
            .entry(key)
            .or_insert_with(|| Entry {
                name: name.to_string(),
                values: Vec::new(),
            })
            .values
            .extend(values.into_header_values());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    /// All values joined with `", "`, the way a single-valued lookup reads.
    pub fn get(&self, name: &str) -> Option<String> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(|e| e.values.join(", "))
    }

    pub fn get_all(&self, name: &str) -> &[String] {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(|e| e.values.as_slice())
            .unwrap_or(&[])
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.entries
            .shift_remove(&name.to_ascii_lowercase())
            .map(|e| e.values)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Names with their original casing.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(|e| e.name.as_str())
    }

    /// Every `(name, value)` pair, one per value.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .values()
            .flat_map(|e| e.values.iter().map(move |v| (e.name.as_str(), v.as_str())))
    }

    /// Copy into an `http::HeaderMap`, skipping names or values that are not
    /// valid HTTP tokens.
    pub fn to_header_map(&self) -> http::HeaderMap {
        let mut map = http::HeaderMap::new();
        for (name, value) in self.iter() {
            let (Ok(name), Ok(value)) = (
                http::HeaderName::from_bytes(name.as_bytes()),
                http::HeaderValue::from_str(value),
            ) else {
                continue;
            };
            map.append(name, value);
        }
        map
    }

    /// Build from an `http::HeaderMap`, keeping every value.
    pub fn from_header_map(map: &http::HeaderMap) -> Self {
        let mut store = Self::new();
        for (name, value) in map {
            if let Ok(value) = value.to_str() {
                store.append(name.as_str(), value);
            }
        }
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_lookup() {
        let mut h = HeaderStore::new();
        h.set("Content-Type", "text/html");
        assert!(h.contains("content-type"));
        assert_eq!(h.get("CONTENT-TYPE").as_deref(), Some("text/html"));
        assert_eq!(h.names().collect::<Vec<_>>(), vec!["Content-Type"]);
    }

    #[test]
    fn test_set_cookie_is_a_list() {
        let mut h = HeaderStore::new();
        h.set("Set-Cookie", ["a=1", "b=2"]);
        h.append("set-cookie", "c=3");
        assert_eq!(h.get_all("Set-Cookie"), &["a=1", "b=2", "c=3"]);

        let map = h.to_header_map();
        assert_eq!(map.get_all("set-cookie").iter().count(), 3);
    }

    #[test]
    fn test_set_replaces() {
        let mut h = HeaderStore::new();
        h.append("Vary", "Accept");
        h.append("Vary", "Cookie");
        assert_eq!(h.get("vary").as_deref(), Some("Accept, Cookie"));
        h.set("vary", "RSC");
        assert_eq!(h.get_all("Vary"), &["RSC"]);
    }

    #[test]
    fn test_remove() {
        let mut h = HeaderStore::new();
        h.set("X-Test", "1");
        assert_eq!(h.remove("x-test"), Some(vec!["1".to_string()]));
        assert!(h.is_empty());
        assert!(h.remove("x-test").is_none());
    }

    #[test]
    fn test_invalid_values_skipped_in_header_map() {
        let mut h = HeaderStore::new();
        h.set("X-Good", "ok");
        h.set("X-Bad", "line\nbreak");
        let map = h.to_header_map();
        assert!(map.contains_key("x-good"));
        assert!(!map.contains_key("x-bad"));
    }
}
