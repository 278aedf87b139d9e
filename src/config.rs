//! Provider configuration.
//!
//! The provider block declares where the spreadsheet API lives and how to
//! authenticate. Each field may be omitted and supplied through the
//! environment instead:
//!
//! | Attribute | Environment variable |
//! |-----------|----------------------|
//! | `host`    | `TERRAXCEL_HOST`     |
//! | `token`   | `TERRAXCEL_TOKEN`    |
//!
//! A declared, non-null value always wins over the environment. After
//! fallback both values must be non-empty; every missing field is reported
//! as its own attribute-scoped diagnostic.

use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::schema::{Attribute, Diagnostic, Schema};

/// Environment variable consulted when `host` is not declared.
pub const HOST_ENV: &str = "TERRAXCEL_HOST";

/// Environment variable consulted when `token` is not declared.
pub const TOKEN_ENV: &str = "TERRAXCEL_TOKEN";

/// An API token. Never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for building request headers only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// The provider block as written by the user. Every field is optional.
#[derive(Debug, Default, Deserialize)]
struct DeclaredConfig {
    host: Option<String>,
    token: Option<String>,
    legacy_cell_placeholder: Option<bool>,
}

/// Fully resolved provider configuration. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Base URL of the spreadsheet API.
    pub host: String,
    /// Token sent as a bearer credential.
    pub token: Credential,
    /// Replace cell values with the legacy placeholder on every cell operation.
    pub legacy_cell_placeholder: bool,
}

impl ProviderConfig {
    /// Resolve against the process environment.
    pub fn resolve(config: &Value) -> Result<Self, Vec<Diagnostic>> {
        Self::resolve_with(config, |name| std::env::var(name).ok())
    }

    /// Resolve with a custom environment lookup.
    pub fn resolve_with<F>(config: &Value, lookup: F) -> Result<Self, Vec<Diagnostic>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let declared = parse_declared(config)?;

        let host = declared
            .host
            .or_else(|| lookup(HOST_ENV))
            .unwrap_or_default();
        let token = Credential::new(
            declared
                .token
                .or_else(|| lookup(TOKEN_ENV))
                .unwrap_or_default(),
        );

        let mut diagnostics = Vec::new();
        if host.is_empty() {
            diagnostics.push(
                Diagnostic::error("Missing Terraxcel host")
                    .with_detail(format!(
                        "Set 'host' in the provider block or the {} environment variable",
                        HOST_ENV
                    ))
                    .with_attribute("host"),
            );
        }
        if token.is_empty() {
            diagnostics.push(
                Diagnostic::error("Missing Terraxcel token")
                    .with_detail(format!(
                        "Set 'token' in the provider block or the {} environment variable",
                        TOKEN_ENV
                    ))
                    .with_attribute("token"),
            );
        }
        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }

        Ok(Self {
            host,
            token,
            legacy_cell_placeholder: declared.legacy_cell_placeholder.unwrap_or(false),
        })
    }
}

fn parse_declared(config: &Value) -> Result<DeclaredConfig, Vec<Diagnostic>> {
    if config.is_null() {
        return Ok(DeclaredConfig::default());
    }
    serde_json::from_value(config.clone()).map_err(|e| {
        vec![Diagnostic::error("Invalid provider configuration").with_detail(e.to_string())]
    })
}

/// Schema of the provider block.
pub fn config_schema() -> Schema {
    Schema::v0()
        .with_attribute(
            "host",
            Attribute::optional_string().with_description(format!(
                "Base URL of the spreadsheet API. Defaults to ${}.",
                HOST_ENV
            )),
        )
        .with_attribute(
            "token",
            Attribute::optional_string()
                .sensitive()
                .with_description(format!("API token. Defaults to ${}.", TOKEN_ENV)),
        )
        .with_attribute(
            "legacy_cell_placeholder",
            Attribute::optional_bool()
                .with_default(serde_json::json!(false))
                .with_description(
                    "Store the placeholder \"test\" instead of the real cell value.",
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| {
            vars.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_declared_values() {
        let config = ProviderConfig::resolve_with(
            &json!({"host": "http://api", "token": "abc"}),
            env(&[]),
        )
        .unwrap();

        assert_eq!(config.host, "http://api");
        assert_eq!(config.token.expose(), "abc");
        assert!(!config.legacy_cell_placeholder);
    }

    #[test]
    fn test_token_falls_back_to_env() {
        let config = ProviderConfig::resolve_with(
            &json!({"host": "http://api", "token": null}),
            env(&[(TOKEN_ENV, "from-env")]),
        )
        .unwrap();

        assert_eq!(config.host, "http://api");
        assert_eq!(config.token.expose(), "from-env");
    }

    #[test]
    fn test_declared_wins_over_env() {
        let config = ProviderConfig::resolve_with(
            &json!({"host": "http://declared"}),
            env(&[(HOST_ENV, "http://env"), (TOKEN_ENV, "t")]),
        )
        .unwrap();

        assert_eq!(config.host, "http://declared");
    }

    #[test]
    fn test_null_config_uses_env() {
        let config = ProviderConfig::resolve_with(
            &Value::Null,
            env(&[(HOST_ENV, "http://env"), (TOKEN_ENV, "t")]),
        )
        .unwrap();

        assert_eq!(config.host, "http://env");
    }

    #[test]
    fn test_missing_both_names_both_fields() {
        let diagnostics = ProviderConfig::resolve_with(&json!({}), env(&[])).unwrap_err();

        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].attribute, Some("host".to_string()));
        assert_eq!(diagnostics[1].attribute, Some("token".to_string()));
        assert!(diagnostics[0].detail.as_deref().unwrap().contains(HOST_ENV));
        assert!(diagnostics[1].detail.as_deref().unwrap().contains(TOKEN_ENV));
    }

    #[test]
    fn test_declared_empty_string_is_missing() {
        let diagnostics = ProviderConfig::resolve_with(
            &json!({"host": "", "token": "t"}),
            env(&[(HOST_ENV, "http://env")]),
        )
        .unwrap_err();

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("host".to_string()));
    }

    #[test]
    fn test_legacy_flag() {
        let config = ProviderConfig::resolve_with(
            &json!({"host": "h", "token": "t", "legacy_cell_placeholder": true}),
            env(&[]),
        )
        .unwrap();
        assert!(config.legacy_cell_placeholder);
    }

    #[test]
    fn test_wrong_type_is_reported() {
        let diagnostics =
            ProviderConfig::resolve_with(&json!({"host": 42}), env(&[])).unwrap_err();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Invalid provider configuration");
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = ProviderConfig::resolve_with(
            &json!({"host": "h", "token": "super-secret"}),
            env(&[]),
        )
        .unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn test_config_schema() {
        let schema = config_schema();
        assert!(schema.block.attributes["token"].flags.sensitive);
        assert!(schema.block.attributes["host"].flags.optional);
    }
}
