use crate::site_time::SiteTime;
use anyhow::{anyhow, bail, Context, Result};
use std::path::PathBuf;

/// Start-up settings read from the environment (and `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    /// Cookie signing key material. A fresh key is generated when unset.
    pub secret_key: Option<Vec<u8>>,
    pub secure_cookies: bool,
    pub create_schema: bool,
    pub db_max_connections: u32,
    /// Directory uploaded images are written to and served from under `/media/`.
    pub media_root: PathBuf,
    /// Offset that form dates are entered in and pages display.
    pub site_time: SiteTime,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or_else(|| anyhow!("DATABASE_URL must be set."))?;

        let secret_key = match lookup("SECRET_KEY") {
            Some(key) if key.len() < 64 => {
                bail!("SECRET_KEY must be at least 64 bytes long (got {}).", key.len())
            }
            Some(key) => Some(key.into_bytes()),
            None => None,
        };

        let db_max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(value) => value
                .trim()
                .parse::<u32>()
                .with_context(|| format!("DB_MAX_CONNECTIONS is not a number: {:?}", value))?,
            None => 100,
        };

        let site_time = match lookup("UTC_OFFSET") {
            Some(value) => SiteTime::parse(&value)
                .ok_or_else(|| anyhow!("UTC_OFFSET must look like +03:00, got {:?}.", value))?,
            None => SiteTime::utc(),
        };

        Ok(Self {
            database_url,
            bind_address: lookup("BIND_ADDRESS").unwrap_or_else(|| "127.0.0.1:8080".to_owned()),
            secret_key,
            secure_cookies: parse_flag("SECURE_COOKIES", lookup("SECURE_COOKIES"), false)?,
            create_schema: parse_flag("CREATE_SCHEMA", lookup("CREATE_SCHEMA"), true)?,
            db_max_connections,
            media_root: PathBuf::from(lookup("MEDIA_ROOT").unwrap_or_else(|| "media".to_owned())),
            site_time,
        })
    }
}

fn parse_flag(key: &str, value: Option<String>, default: bool) -> Result<bool> {
    let value = match value {
        Some(value) => value,
        None => return Ok(default),
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("{} must be a boolean, got {:?}.", key, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[("DATABASE_URL", "postgres://localhost/blog")]).unwrap();
        assert_eq!(config.bind_address, "127.0.0.1:8080");
        assert_eq!(config.secret_key, None);
        assert!(!config.secure_cookies);
        assert!(config.create_schema);
        assert_eq!(config.db_max_connections, 100);
        assert_eq!(config.media_root, PathBuf::from("media"));
        assert_eq!(config.site_time, SiteTime::utc());
    }

    #[test]
    fn test_utc_offset() {
        let config = config(&[("DATABASE_URL", "x"), ("UTC_OFFSET", "+03:00")]).unwrap();
        assert_eq!(config.site_time, SiteTime::parse("+03:00").unwrap());
        assert!(self::config(&[("DATABASE_URL", "x"), ("UTC_OFFSET", "Moscow")]).is_err());
    }

    #[test]
    fn test_database_url_is_required() {
        assert!(config(&[]).is_err());
    }

    #[test]
    fn test_short_secret_key_is_rejected() {
        assert!(config(&[("DATABASE_URL", "x"), ("SECRET_KEY", "short")]).is_err());
        let key = "k".repeat(64);
        let config = config(&[("DATABASE_URL", "x"), ("SECRET_KEY", &key)]).unwrap();
        assert_eq!(config.secret_key.map(|k| k.len()), Some(64));
    }

    #[test]
    fn test_flags() {
        let config = config(&[
            ("DATABASE_URL", "x"),
            ("SECURE_COOKIES", "yes"),
            ("CREATE_SCHEMA", "0"),
        ])
        .unwrap();
        assert!(config.secure_cookies);
        assert!(!config.create_schema);
        assert!(self::config(&[("DATABASE_URL", "x"), ("SECURE_COOKIES", "maybe")]).is_err());
    }
}
