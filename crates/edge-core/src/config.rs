//! Deployment configuration.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Configuration loading and validation errors.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),
    #[error("Failed to parse {name}: {message}")]
    Parse { name: String, message: String },
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Build output flavour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    #[default]
    Server,
    Serverless,
}

/// A declared proxy backend: either a bare url or `{ url }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BackendSpec {
    Url(String),
    Object { url: String },
}

impl BackendSpec {
    pub fn url(&self) -> &str {
        match self {
            BackendSpec::Url(url) => url,
            BackendSpec::Object { url } => url,
        }
    }
}

/// Locale served by default on a specific domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainLocale {
    pub domain: String,
    pub default_locale: String,
    #[serde(default)]
    pub locales: Vec<String>,
    #[serde(default)]
    pub http: bool,
}

/// Internationalised routing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct I18nConfig {
    pub locales: Vec<String>,
    pub default_locale: String,
    #[serde(default)]
    pub domains: Vec<DomainLocale>,
    #[serde(default = "default_true")]
    pub locale_detection: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExperimentalConfig {
    /// Serve pages from the `app` directory.
    pub app_dir: bool,
    pub server_components: bool,
}

/// Limits applied to proxied requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProxyConfig {
    pub max_body_bytes: usize,
    pub timeout_ms: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 10 * 1024 * 1024,
            timeout_ms: 30_000,
        }
    }
}

/// Configuration for one server instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    /// Build root all virtual paths are relative to.
    pub dir: String,
    /// Build output directory, relative to `dir`.
    pub dist_dir: String,
    pub base_path: String,
    pub trailing_slash: bool,
    pub compress: bool,
    pub generate_etags: bool,
    pub powered_by_header: bool,
    pub minimal_mode: bool,
    pub use_file_system_public_routes: bool,
    pub target: Target,
    pub i18n: Option<I18nConfig>,
    pub experimental: ExperimentalConfig,
    pub backends: IndexMap<String, BackendSpec>,
    pub proxy: ProxyConfig,
    pub render_timeout_ms: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            dir: "/".to_string(),
            dist_dir: ".next".to_string(),
            base_path: String::new(),
            trailing_slash: false,
            compress: true,
            generate_etags: true,
            powered_by_header: true,
            minimal_mode: false,
            use_file_system_public_routes: true,
            target: Target::Server,
            i18n: None,
            experimental: ExperimentalConfig::default(),
            backends: IndexMap::new(),
            proxy: ProxyConfig::default(),
            render_timeout_ms: None,
        }
    }
}

fn default_true() -> bool {
    true
}

impl ServerConfig {
    /// Parse a config document. The format is picked from the file
    /// extension of `name` (`.toml` or `.json`).
    pub fn load_str(name: &str, text: &str) -> Result<Self, ConfigError> {
        let parse_err = |message: String| ConfigError::Parse {
            name: name.to_string(),
            message,
        };
        let config: Self = if name.ends_with(".toml") {
            toml::from_str(text).map_err(|e| parse_err(e.to_string()))?
        } else if name.ends_with(".json") {
            serde_json::from_str(text).map_err(|e| parse_err(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(name.to_string()));
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.dir.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "dir must be absolute, got {:?}",
                self.dir
            )));
        }
        if self.dist_dir.is_empty() {
            return Err(ConfigError::Invalid("distDir must not be empty".into()));
        }
        if !self.base_path.is_empty()
            && (!self.base_path.starts_with('/') || self.base_path.ends_with('/'))
        {
            return Err(ConfigError::Invalid(format!(
                "basePath must start with / and not end with /, got {:?}",
                self.base_path
            )));
        }
        if let Some(i18n) = &self.i18n {
            if i18n.locales.is_empty() {
                return Err(ConfigError::Invalid("i18n.locales must not be empty".into()));
            }
            if !i18n.locales.contains(&i18n.default_locale) {
                return Err(ConfigError::Invalid(format!(
                    "i18n.defaultLocale {:?} is not in i18n.locales",
                    i18n.default_locale
                )));
            }
        }
        for (name, backend) in &self.backends {
            let parsed = url::Url::parse(backend.url()).map_err(|e| {
                ConfigError::Invalid(format!("backend {name:?} has an invalid url: {e}"))
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::Invalid(format!(
                    "backend {name:?} must use http or https"
                )));
            }
        }
        if self.proxy.max_body_bytes == 0 {
            return Err(ConfigError::Invalid("proxy.maxBodyBytes must be positive".into()));
        }
        Ok(())
    }

    /// Name of the server output directory for the configured target.
    pub fn server_dir(&self) -> &'static str {
        match self.target {
            Target::Server => "server",
            Target::Serverless => "serverless",
        }
    }

    /// Absolute virtual path of the build output directory.
    pub fn dist_path(&self) -> String {
        join_paths(&self.dir, &self.dist_dir)
    }

    pub fn locales(&self) -> &[String] {
        self.i18n.as_ref().map(|i| i.locales.as_slice()).unwrap_or(&[])
    }
}

/// Join two POSIX path fragments with exactly one separator.
pub fn join_paths(base: &str, rel: &str) -> String {
    let base = base.trim_end_matches('/');
    let rel = rel.trim_start_matches('/');
    if rel.is_empty() {
        if base.is_empty() {
            "/".to_string()
        } else {
            base.to_string()
        }
    } else {
        format!("{base}/{rel}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert!(config.compress);
        assert!(config.generate_etags);
        assert_eq!(config.proxy.max_body_bytes, 10 * 1024 * 1024);
        assert_eq!(config.dist_path(), "/.next");
        assert_eq!(config.server_dir(), "server");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_toml() {
        let text = r#"
            basePath = "/docs"
            trailingSlash = true

            [i18n]
            locales = ["en", "fr"]
            defaultLocale = "en"

            [backends]
            httpbin = "https://httpbin.org/anything/"
            api = { url = "https://api.example.com" }
        "#;
        let config = ServerConfig::load_str("server.toml", text).unwrap();
        assert_eq!(config.base_path, "/docs");
        assert!(config.trailing_slash);
        assert_eq!(config.locales(), &["en".to_string(), "fr".to_string()]);
        assert_eq!(config.backends["httpbin"].url(), "https://httpbin.org/anything/");
        assert_eq!(config.backends["api"].url(), "https://api.example.com");
        let names: Vec<_> = config.backends.keys().collect();
        assert_eq!(names, vec!["httpbin", "api"]);
    }

    #[test]
    fn test_load_json() {
        let config =
            ServerConfig::load_str(
                "server.json",
                r#"{"minimalMode": true, "target": "serverless"}"#,
            )
                .unwrap();
        assert!(config.minimal_mode);
        assert_eq!(config.server_dir(), "serverless");
    }

    #[test]
    fn test_unsupported_format() {
        assert!(matches!(
            ServerConfig::load_str("server.yaml", ""),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_rejects_bad_default_locale() {
        let text = r#"{"i18n": {"locales": ["en"], "defaultLocale": "de"}}"#;
        assert!(matches!(
            ServerConfig::load_str("c.json", text),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_rejects_bad_base_path() {
        let config = ServerConfig {
            base_path: "docs/".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_join_paths() {
        assert_eq!(join_paths("/", ".next"), "/.next");
        assert_eq!(join_paths("/app/", "/static"), "/app/static");
        assert_eq!(join_paths("/", ""), "/");
    }
}
