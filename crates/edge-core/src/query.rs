//! Parsed query strings.

use indexmap::IndexMap;
use url::form_urlencoded;

/// Query key carrying the locale detected for the request.
pub const NEXT_LOCALE: &str = "__nextLocale";
/// Query key carrying the configured default locale.
pub const NEXT_DEFAULT_LOCALE: &str = "__nextDefaultLocale";
/// Query key flagging a `/_next/data` request.
pub const NEXT_DATA_REQ: &str = "__nextDataReq";
/// Query key telling dynamic routes not to fall back.
pub const NEXT_BUBBLE_NO_FALLBACK: &str = "_nextBubbleNoFallback";
/// Query key selecting the AMP variant of a page.
pub const AMP: &str = "amp";

/// Ordered multimap of query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query(IndexMap<String, Vec<String>>);

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw query string (without the leading `?`).
    pub fn parse(raw: &str) -> Self {
        let raw = raw.strip_prefix('?').unwrap_or(raw);
        let mut query = Self::new();
        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            query.append(key.into_owned(), value.into_owned());
        }
        query
    }

    /// First value for a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.first()).map(String::as_str)
    }

    pub fn get_all(&self, key: &str) -> &[String] {
        self.0.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Replace every value of `key` with a single value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), vec![value.into()]);
    }

    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.entry(key.into()).or_default().push(value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        self.0.shift_remove(key)
    }

    /// Merge `other` into this query; keys in `other` replace existing ones.
    pub fn extend(&mut self, other: Query) {
        for (key, values) in other.0 {
            self.0.insert(key, values);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Serialize back to `a=1&b=2` form (no leading `?`).
    pub fn to_query_string(&self) -> String {
        let mut out = form_urlencoded::Serializer::new(String::new());
        for (key, values) in &self.0 {
            for value in values {
                out.append_pair(key, value);
            }
        }
        out.finish()
    }
}

impl FromIterator<(String, String)> for Query {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut query = Self::new();
        for (k, v) in iter {
            query.append(k, v);
        }
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repeated_keys() {
        let q = Query::parse("a=1&b=2&a=3");
        assert_eq!(q.get("a"), Some("1"));
        assert_eq!(q.get_all("a"), &["1".to_string(), "3".to_string()]);
        assert_eq!(q.get("b"), Some("2"));
        assert!(q.get("c").is_none());
    }

    #[test]
    fn test_parse_decodes_values() {
        let q = Query::parse("?q=hello%20world&x=a+b");
        assert_eq!(q.get("q"), Some("hello world"));
        assert_eq!(q.get("x"), Some("a b"));
    }

    #[test]
    fn test_insert_replaces_and_serializes() {
        let mut q = Query::parse("a=1&a=2");
        q.insert("a", "9");
        q.insert(NEXT_DATA_REQ, "1");
        assert_eq!(q.to_query_string(), "a=9&__nextDataReq=1");
    }

    #[test]
    fn test_extend_overrides() {
        let mut q = Query::parse("slug=old&x=1");
        q.extend(Query::parse("slug=new"));
        assert_eq!(q.get("slug"), Some("new"));
        assert_eq!(q.get("x"), Some("1"));
    }
}
