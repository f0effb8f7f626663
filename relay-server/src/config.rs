//! Environment-derived runtime configuration.
//!
//! `PORT` (preferred) or `WS_PORT` (fallback) select the listen port,
//! defaulting to 3001. `NODE_ENV=production` activates the WebSocket
//! origin allow-list; `ALLOWED_ORIGINS` is a comma-separated list, with an
//! absent value or a literal `*` disabling the check entirely.

use crate::error::ConfigError;

const DEFAULT_PORT: u16 = 3001;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub production: bool,
    pub allowed_origins: Option<Vec<String>>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match std::env::var("PORT") {
            Ok(value) => parse_port("PORT", value)?,
            Err(_) => match std::env::var("WS_PORT") {
                Ok(value) => parse_port("WS_PORT", value)?,
                Err(_) => DEFAULT_PORT,
            },
        };

        let production = std::env::var("NODE_ENV")
            .map(|v| v == "production")
            .unwrap_or(false);

        let allowed_origins = std::env::var("ALLOWED_ORIGINS").ok().and_then(|raw| {
            if raw.trim() == "*" || raw.trim().is_empty() {
                None
            } else {
                Some(raw.split(',').map(|s| s.trim().to_string()).collect())
            }
        });

        Ok(Config {
            port,
            production,
            allowed_origins,
        })
    }

    /// Whether `origin` passes the allow-list. Always true outside production.
    pub fn origin_allowed(&self, origin: Option<&str>) -> bool {
        if !self.production {
            return true;
        }
        let Some(allowed) = &self.allowed_origins else {
            return true;
        };
        match origin {
            Some(origin) => allowed.iter().any(|a| a == origin),
            None => false,
        }
    }
}

fn parse_port(var: &'static str, value: String) -> Result<u16, ConfigError> {
    value
        .parse::<u16>()
        .map_err(|_| ConfigError::InvalidPort { var, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_origin_disables_check() {
        let cfg = Config {
            port: DEFAULT_PORT,
            production: true,
            allowed_origins: None,
        };
        assert!(cfg.origin_allowed(Some("https://evil.example")));
    }

    #[test]
    fn non_production_never_checks_origin() {
        let cfg = Config {
            port: DEFAULT_PORT,
            production: false,
            allowed_origins: Some(vec!["https://good.example".into()]),
        };
        assert!(cfg.origin_allowed(Some("https://evil.example")));
    }

    #[test]
    fn production_rejects_unlisted_origin() {
        let cfg = Config {
            port: DEFAULT_PORT,
            production: true,
            allowed_origins: Some(vec!["https://good.example".into()]),
        };
        assert!(cfg.origin_allowed(Some("https://good.example")));
        assert!(!cfg.origin_allowed(Some("https://evil.example")));
        assert!(!cfg.origin_allowed(None));
    }
}
