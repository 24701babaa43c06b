//! Locale prefixes and domain locales.

use edge_core::DomainLocale;

/// Pathname with any leading locale segment removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalePath {
    pub pathname: String,
    pub detected_locale: Option<String>,
}

/// Strip a leading `/<locale>` segment, matching locales case-insensitively.
/// The detected locale is reported in its configured spelling.
pub fn normalize_locale_path(pathname: &str, locales: &[String]) -> LocalePath {
    let first = pathname.split('/').nth(1).unwrap_or_default();
    let detected = locales
        .iter()
        .find(|locale| !first.is_empty() && locale.eq_ignore_ascii_case(first));

    match detected {
        Some(locale) => {
            let rest = &pathname[1 + first.len()..];
            LocalePath {
                pathname: if rest.is_empty() { "/".to_string() } else { rest.to_string() },
                detected_locale: Some(locale.clone()),
            }
        }
        None => LocalePath {
            pathname: pathname.to_string(),
            detected_locale: None,
        },
    }
}

/// Domain locale configured for `hostname`, or owning `detected_locale`.
pub fn detect_domain_locale<'a>(
    domains: &'a [DomainLocale],
    hostname: Option<&str>,
    detected_locale: Option<&str>,
) -> Option<&'a DomainLocale> {
    let hostname = hostname.map(|h| h.split(':').next().unwrap_or(h).to_ascii_lowercase());
    domains.iter().find(|domain| {
        let domain_host = domain.domain.split(':').next().unwrap_or_default();
        hostname.as_deref() == Some(domain_host)
            || detected_locale.is_some_and(|locale| {
                domain.default_locale.eq_ignore_ascii_case(locale)
                    || domain.locales.iter().any(|l| l.eq_ignore_ascii_case(locale))
            })
    })
}

/// Remove one trailing slash, keeping `/` itself.
pub fn remove_trailing_slash(pathname: &str) -> &str {
    if pathname.len() > 1 {
        pathname.strip_suffix('/').unwrap_or(pathname)
    } else {
        pathname
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locales() -> Vec<String> {
        vec!["en-US".into(), "fr".into()]
    }

    #[test]
    fn test_strips_locale() {
        let result = normalize_locale_path("/fr/about", &locales());
        assert_eq!(result.pathname, "/about");
        assert_eq!(result.detected_locale.as_deref(), Some("fr"));

        let result = normalize_locale_path("/en-us", &locales());
        assert_eq!(result.pathname, "/");
        assert_eq!(result.detected_locale.as_deref(), Some("en-US"));
    }

    #[test]
    fn test_no_locale() {
        let result = normalize_locale_path("/french/about", &locales());
        assert_eq!(result.pathname, "/french/about");
        assert!(result.detected_locale.is_none());
        assert!(normalize_locale_path("/", &locales()).detected_locale.is_none());
    }

    #[test]
    fn test_domain_locale() {
        let domains = vec![DomainLocale {
            domain: "example.fr".into(),
            default_locale: "fr".into(),
            locales: vec![],
            http: false,
        }];
        assert_eq!(
            detect_domain_locale(&domains, Some("Example.fr:443"), None)
                .map(|d| d.default_locale.as_str()),
            Some("fr")
        );
        assert!(detect_domain_locale(&domains, Some("example.com"), None).is_none());
        assert!(detect_domain_locale(&domains, None, Some("fr")).is_some());
    }

    #[test]
    fn test_remove_trailing_slash() {
        assert_eq!(remove_trailing_slash("/about/"), "/about");
        assert_eq!(remove_trailing_slash("/"), "/");
        assert_eq!(remove_trailing_slash("/about"), "/about");
    }
}
