//! Vault configuration.

use std::str::FromStr;

/// Configuration for the Vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultConfig {
    /// TTL applied to issued tokens that do not request one. `None` never expires.
    pub default_token_ttl_ms: Option<i64>,
    /// Upper bound on any issued token's TTL.
    pub max_token_ttl_ms: Option<i64>,
    /// Attach the `default` policy to issued tokens.
    pub attach_default_policy: bool,
    /// Issue a root token the first time the vault is bootstrapped.
    pub issue_root_token_on_bootstrap: bool,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            default_token_ttl_ms: None,
            max_token_ttl_ms: None,
            attach_default_policy: true,
            issue_root_token_on_bootstrap: true,
        }
    }
}

impl VaultConfig {
    /// Read overrides from `VAULTLINE_*` environment variables.
    ///
    /// Absent or unparseable values keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string());

        Self {
            default_token_ttl_ms: get("VAULTLINE_DEFAULT_TOKEN_TTL_MS")
                .and_then(|v| parse_positive(&v))
                .or(defaults.default_token_ttl_ms),
            max_token_ttl_ms: get("VAULTLINE_MAX_TOKEN_TTL_MS")
                .and_then(|v| parse_positive(&v))
                .or(defaults.max_token_ttl_ms),
            attach_default_policy: get("VAULTLINE_ATTACH_DEFAULT_POLICY")
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.attach_default_policy),
            issue_root_token_on_bootstrap: get("VAULTLINE_ISSUE_ROOT_TOKEN")
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.issue_root_token_on_bootstrap),
        }
    }

    /// Resolve the expiry for a token issued at `now`.
    pub(crate) fn token_expiry(&self, now: i64, requested_ttl_ms: Option<i64>) -> Option<i64> {
        let ttl = requested_ttl_ms.or(self.default_token_ttl_ms);
        let ttl = match (ttl, self.max_token_ttl_ms) {
            (Some(ttl), Some(max)) => Some(ttl.min(max)),
            (None, Some(max)) => Some(max),
            (ttl, None) => ttl,
        };
        ttl.map(|ttl| now.saturating_add(ttl))
    }
}

fn parse_positive<T: FromStr + PartialOrd + Default>(raw: &str) -> Option<T> {
    raw.parse().ok().filter(|v| *v > T::default())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_map(vars: &[(&str, &str)]) -> VaultConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        VaultConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_empty_env_is_default() {
        assert_eq!(from_map(&[]), VaultConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = from_map(&[
            ("VAULTLINE_DEFAULT_TOKEN_TTL_MS", "60000"),
            ("VAULTLINE_MAX_TOKEN_TTL_MS", " 3600000 "),
            ("VAULTLINE_ATTACH_DEFAULT_POLICY", "false"),
            ("VAULTLINE_ISSUE_ROOT_TOKEN", "0"),
        ]);
        assert_eq!(config.default_token_ttl_ms, Some(60_000));
        assert_eq!(config.max_token_ttl_ms, Some(3_600_000));
        assert!(!config.attach_default_policy);
        assert!(!config.issue_root_token_on_bootstrap);
    }

    #[test]
    fn test_unparseable_falls_back() {
        let config = from_map(&[
            ("VAULTLINE_DEFAULT_TOKEN_TTL_MS", "soon"),
            ("VAULTLINE_MAX_TOKEN_TTL_MS", "-5"),
            ("VAULTLINE_ATTACH_DEFAULT_POLICY", "maybe"),
        ]);
        assert_eq!(config, VaultConfig::default());
    }

    #[test]
    fn test_token_expiry() {
        let config = VaultConfig {
            default_token_ttl_ms: Some(100),
            max_token_ttl_ms: Some(1_000),
            ..VaultConfig::default()
        };
        assert_eq!(config.token_expiry(5, None), Some(105));
        assert_eq!(config.token_expiry(5, Some(500)), Some(505));
        assert_eq!(config.token_expiry(5, Some(50_000)), Some(1_005));

        assert_eq!(VaultConfig::default().token_expiry(5, None), None);
    }
}
