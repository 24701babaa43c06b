//! Path patterns: `/blog/:slug`, `/:lang?/about`, `/_next/static/:path*`,
//! `/docs/:rest+` and `/:id(\d+)`.

use indexmap::IndexMap;
use regex::Regex;

use crate::RouteError;

/// Segment pattern used when a param declares none.
const DEFAULT_PATTERN: &str = "[^/#?]+?";

/// A matched param: one segment, or every segment of a repeating param.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Single(String),
    Multi(Vec<String>),
}

impl ParamValue {
    /// The value as it appeared in the path.
    pub fn joined(&self) -> String {
        match self {
            ParamValue::Single(v) => v.clone(),
            ParamValue::Multi(vs) => vs.join("/"),
        }
    }

    pub fn values(&self) -> Vec<String> {
        match self {
            ParamValue::Single(v) => vec![v.clone()],
            ParamValue::Multi(vs) => vs.clone(),
        }
    }
}

/// Params captured by a route, in pattern order.
pub type Params = IndexMap<String, ParamValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Modifier {
    One,
    Optional,
    ZeroOrMore,
    OneOrMore,
}

impl Modifier {
    fn repeats(self) -> bool {
        matches!(self, Modifier::ZeroOrMore | Modifier::OneOrMore)
    }

    fn optional(self) -> bool {
        matches!(self, Modifier::Optional | Modifier::ZeroOrMore)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    Literal(String),
    Param {
        name: String,
        /// Declared with a name rather than as a bare `( )` group.
        named: bool,
        prefix: String,
        pattern: Option<String>,
        modifier: Modifier,
    },
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn invalid(source: &str, message: impl Into<String>) -> RouteError {
    RouteError::InvalidPattern {
        pattern: source.to_string(),
        message: message.into(),
    }
}

/// Read a balanced `( ... )` group starting at `start`. Returns the inner
/// text and the index just past the closing paren.
fn read_group(chars: &[char], start: usize, source: &str) -> Result<(String, usize), RouteError> {
    let mut depth = 0usize;
    let mut out = String::new();
    let mut i = start;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => {
                out.push(c);
                if let Some(next) = chars.get(i + 1) {
                    out.push(*next);
                }
                i += 2;
                continue;
            }
            '(' => {
                depth += 1;
                if depth > 1 {
                    out.push(c);
                }
            }
            ')' => {
                depth -= 1;
                if depth == 0 {
                    if out.is_empty() {
                        return Err(invalid(source, format!("missing pattern at {start}")));
                    }
                    return Ok((out, i + 1));
                }
                out.push(c);
            }
            _ => out.push(c),
        }
        i += 1;
    }
    Err(invalid(source, format!("unbalanced pattern at {start}")))
}

fn read_modifier(chars: &[char], i: &mut usize) -> Modifier {
    let modifier = match chars.get(*i) {
        Some('?') => Modifier::Optional,
        Some('*') => Modifier::ZeroOrMore,
        Some('+') => Modifier::OneOrMore,
        _ => return Modifier::One,
    };
    *i += 1;
    modifier
}

fn push_param(
    tokens: &mut Vec<Token>,
    literal: &mut String,
    name: String,
    named: bool,
    pattern: Option<String>,
    modifier: Modifier,
) {
    let prefix = if literal.ends_with('/') {
        literal.pop();
        "/".to_string()
    } else {
        String::new()
    };
    if !literal.is_empty() {
        tokens.push(Token::Literal(std::mem::take(literal)));
    }
    tokens.push(Token::Param {
        name,
        named,
        prefix,
        pattern,
        modifier,
    });
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, RouteError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut unnamed = 0usize;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => {
                if let Some(next) = chars.get(i + 1) {
                    literal.push(*next);
                }
                i += 2;
            }
            ':' if chars.get(i + 1).copied().is_some_and(is_name_char) => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && is_name_char(chars[end]) {
                    end += 1;
                }
                let name: String = chars[start..end].iter().collect();
                i = end;
                let pattern = if chars.get(i) == Some(&'(') {
                    let (pattern, next) = read_group(&chars, i, source)?;
                    i = next;
                    Some(pattern)
                } else {
                    None
                };
                let modifier = read_modifier(&chars, &mut i);
                push_param(&mut tokens, &mut literal, name, true, pattern, modifier);
            }
            '(' => {
                let (pattern, next) = read_group(&chars, i, source)?;
                i = next;
                let modifier = read_modifier(&chars, &mut i);
                let name = unnamed.to_string();
                unnamed += 1;
                push_param(&mut tokens, &mut literal, name, false, Some(pattern), modifier);
            }
            _ => {
                literal.push(c);
                i += 1;
            }
        }
    }
    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }
    Ok(tokens)
}

#[derive(Debug, Clone)]
struct Key {
    name: String,
    named: bool,
    group: String,
    prefix: String,
    modifier: Modifier,
}

/// A compiled path pattern.
///
/// Matching is case-insensitive and tolerates one trailing slash. Unnamed
/// groups constrain the match but are not reported as params.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    source: String,
    regex: Regex,
    keys: Vec<Key>,
    restricted: Vec<String>,
}

impl PathMatcher {
    pub fn compile(source: &str) -> Result<Self, RouteError> {
        let tokens = tokenize(source)?;
        let mut body = String::new();
        let mut keys = Vec::new();

        for token in tokens {
            match token {
                Token::Literal(text) => body.push_str(&regex::escape(&text)),
                Token::Param {
                    name,
                    named,
                    prefix,
                    pattern,
                    modifier,
                } => {
                    let group = format!("p{}", keys.len());
                    let p = regex::escape(&prefix);
                    let pat = pattern.as_deref().unwrap_or(DEFAULT_PATTERN);
                    let fragment = match modifier {
                        Modifier::One => format!("{p}(?P<{group}>{pat})"),
                        Modifier::Optional => format!("(?:{p}(?P<{group}>{pat}))?"),
                        Modifier::OneOrMore => {
                            format!("{p}(?P<{group}>(?:{pat})(?:{p}(?:{pat}))*)")
                        }
                        Modifier::ZeroOrMore => {
                            format!("(?:{p}(?P<{group}>(?:{pat})(?:{p}(?:{pat}))*))?")
                        }
                    };
                    body.push_str(&fragment);
                    keys.push(Key {
                        name,
                        named,
                        group,
                        prefix,
                        modifier,
                    });
                }
            }
        }

        let regex = Regex::new(&format!("(?i)^{body}(?:/)?$"))
            .map_err(|e| invalid(source, e.to_string()))?;

        Ok(Self {
            source: source.to_string(),
            regex,
            keys,
            restricted: Vec::new(),
        })
    }

    /// Never match paths starting with any of `prefixes`.
    pub fn with_restricted(mut self, prefixes: Vec<String>) -> Self {
        self.restricted = prefixes;
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Match `path`, returning the named params on success.
    pub fn matches(&self, path: &str) -> Option<Params> {
        if self.restricted.iter().any(|r| path.starts_with(r.as_str())) {
            return None;
        }
        let captures = self.regex.captures(path)?;
        let mut params = Params::new();
        for key in self.keys.iter().filter(|k| k.named) {
            let Some(value) = captures.name(&key.group) else {
                continue;
            };
            let value = value.as_str();
            let param = if key.modifier.repeats() {
                let parts = if key.prefix.is_empty() {
                    vec![value.to_string()]
                } else {
                    value.split(key.prefix.as_str()).map(str::to_string).collect()
                };
                ParamValue::Multi(parts)
            } else {
                ParamValue::Single(value.to_string())
            };
            params.insert(key.name.clone(), param);
        }
        Some(params)
    }
}

/// Fill the params of a path template such as `/blog/:slug` or `/:path*`.
pub fn compile_path(template: &str, params: &Params) -> Result<String, RouteError> {
    let mut out = String::new();
    for token in tokenize(template)? {
        match token {
            Token::Literal(text) => out.push_str(&text),
            Token::Param {
                name,
                prefix,
                modifier,
                ..
            } => match params.get(&name) {
                Some(ParamValue::Multi(values)) if values.is_empty() && modifier.optional() => {}
                Some(value) => {
                    out.push_str(&prefix);
                    out.push_str(&value.joined());
                }
                None if modifier.optional() => {}
                None => {
                    return Err(RouteError::MissingParam {
                        destination: template.to_string(),
                        param: name,
                    })
                }
            },
        }
    }
    Ok(out)
}

/// Replace `:name` references in a header value, host or query value.
///
/// A reference only matches a whole param name, so `:id` leaves `:identifier`
/// untouched. Unknown names are kept verbatim.
pub fn compile_non_path(value: &str, params: &Params) -> String {
    if !value.contains(':') || params.is_empty() {
        return value.to_string();
    }
    let chars: Vec<char> = value.chars().collect();
    let mut out = String::with_capacity(value.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == ':' {
            let start = i + 1;
            let mut end = start;
            while end < chars.len() && is_name_char(chars[end]) {
                end += 1;
            }
            let name: String = chars[start..end].iter().collect();
            if let Some(param) = params.get(&name) {
                out.push_str(&param.joined());
                i = end;
                if matches!(chars.get(i), Some('*') | Some('+') | Some('?')) {
                    i += 1;
                }
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(v: &str) -> ParamValue {
        ParamValue::Single(v.to_string())
    }

    fn multi(vs: &[&str]) -> ParamValue {
        ParamValue::Multi(vs.iter().map(|s| s.to_string()).collect())
    }

    // === Matching ===

    #[test]
    fn test_static_pattern() {
        let m = PathMatcher::compile("/about").unwrap();
        assert!(m.matches("/about").is_some());
        assert!(m.matches("/about/").is_some());
        assert!(m.matches("/ABOUT").is_some());
        assert!(m.matches("/about/us").is_none());
    }

    #[test]
    fn test_named_param() {
        let m = PathMatcher::compile("/blog/:slug").unwrap();
        let params = m.matches("/blog/hello").unwrap();
        assert_eq!(params["slug"], single("hello"));
        assert!(m.matches("/blog").is_none());
        assert!(m.matches("/blog/a/b").is_none());
    }

    #[test]
    fn test_optional_param() {
        let m = PathMatcher::compile("/:lang?/about").unwrap();
        assert_eq!(m.matches("/fr/about").unwrap()["lang"], single("fr"));
        assert!(m.matches("/about").unwrap().is_empty());
    }

    #[test]
    fn test_zero_or_more() {
        let m = PathMatcher::compile("/_next/static/:path*").unwrap();
        assert_eq!(
            m.matches("/_next/static/chunks/main.js").unwrap()["path"],
            multi(&["chunks", "main.js"])
        );
        assert!(m.matches("/_next/static").unwrap().get("path").is_none());
        assert!(m.matches("/_next/static/").unwrap().get("path").is_none());
    }

    #[test]
    fn test_one_or_more() {
        let m = PathMatcher::compile("/docs/:rest+").unwrap();
        assert_eq!(m.matches("/docs/a/b").unwrap()["rest"], multi(&["a", "b"]));
        assert!(m.matches("/docs").is_none());
    }

    #[test]
    fn test_custom_pattern_and_unnamed_group() {
        let m = PathMatcher::compile("/post/:id(\\d+)").unwrap();
        assert_eq!(m.matches("/post/42").unwrap()["id"], single("42"));
        assert!(m.matches("/post/abc").is_none());

        let m = PathMatcher::compile("/old/(.*)").unwrap();
        let params = m.matches("/old/anything/here").unwrap();
        assert!(params.is_empty());
    }

    #[test]
    fn test_catch_all_root() {
        let m = PathMatcher::compile("/:path*").unwrap();
        assert!(m.matches("/").unwrap().is_empty());
        assert_eq!(m.matches("/a/b").unwrap()["path"], multi(&["a", "b"]));
    }

    #[test]
    fn test_restricted_prefix() {
        let m = PathMatcher::compile("/:path*")
            .unwrap()
            .with_restricted(vec!["/_next".to_string()]);
        assert!(m.matches("/_next/static/x.js").is_none());
        assert!(m.matches("/page").is_some());
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(
            PathMatcher::compile("/a/:id(\\d+"),
            Err(RouteError::InvalidPattern { .. })
        ));
    }

    // === Compiling ===

    #[test]
    fn test_compile_path() {
        let mut params = Params::new();
        params.insert("slug".into(), single("hello"));
        params.insert("path".into(), multi(&["a", "b"]));
        assert_eq!(compile_path("/news/:slug", &params).unwrap(), "/news/hello");
        assert_eq!(compile_path("/files/:path*", &params).unwrap(), "/files/a/b");
        assert_eq!(compile_path("/x/:missing?", &params).unwrap(), "/x");
        assert_eq!(
            compile_path("/x/:missing", &params),
            Err(RouteError::MissingParam {
                destination: "/x/:missing".into(),
                param: "missing".into()
            })
        );
    }

    #[test]
    fn test_compile_non_path() {
        let mut params = Params::new();
        params.insert("id".into(), single("7"));
        assert_eq!(compile_non_path("item-:id", &params), "item-7");
        assert_eq!(compile_non_path(":identifier", &params), ":identifier");
        assert_eq!(compile_non_path("no params", &params), "no params");
        assert_eq!(compile_non_path("max-age=:id*", &params), "max-age=7");
    }
}
