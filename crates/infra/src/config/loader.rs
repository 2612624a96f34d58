//! Configuration loader
//!
//! Builds the application [`Config`] in three layers:
//! 1. Built-in defaults
//! 2. An optional TOML or JSON file
//! 3. `SELLERSYNC_*` environment variables
//!
//! The result is validated before it is returned.
//!
//! ## Environment Variables
//! - `SELLERSYNC_CONFIG`: Explicit config file path
//! - `SELLERSYNC_BIND_ADDR`, `SELLERSYNC_FRONTEND_URL`, `SELLERSYNC_COOKIE_SECRET`,
//!   `SELLERSYNC_COOKIE_SECURE`
//! - `SELLERSYNC_DB_PATH`, `SELLERSYNC_DB_POOL_SIZE`, `SELLERSYNC_DB_ENCRYPTION_KEY`
//! - `SELLERSYNC_MARKETPLACE_ID`, `SELLERSYNC_API_BASE_URL`, `SELLERSYNC_AUTHORIZATION_URL`,
//!   `SELLERSYNC_TOKEN_URL`, `SELLERSYNC_CLIENT_ID`, `SELLERSYNC_CLIENT_SECRET`,
//!   `SELLERSYNC_REDIRECT_URI`, `SELLERSYNC_SCOPES` (space or comma separated)
//! - `SELLERSYNC_VAULT_PASSPHRASE`
//! - `SELLERSYNC_PKCE_REQUIRED`, `SELLERSYNC_DURABLE_PENDING_STATE`
//! - `SELLERSYNC_SYNC_PAGE_SIZE`, `SELLERSYNC_SYNC_MAX_PAGES`, `SELLERSYNC_SYNC_SCHEDULE`,
//!   `SELLERSYNC_SYNC_SCHEDULE_ENABLED`
//! - `SELLERSYNC_WORKER_POLL_MS`, `SELLERSYNC_WORKER_BATCH_SIZE`
//!
//! ## File Locations
//! Without `SELLERSYNC_CONFIG` the loader probes, in order:
//! 1. `./sellersync.toml`, `./sellersync.json`
//! 2. `./config/sellersync.toml`, `./config/sellersync.json`
//! 3. The same names next to the executable

use std::path::{Path, PathBuf};
use std::str::FromStr;

use sellersync_domain::{Config, Result, Secret, SellerSyncError};

const CONFIG_ENV: &str = "SELLERSYNC_CONFIG";
const FILE_NAMES: [&str; 4] =
    ["sellersync.toml", "sellersync.json", "config/sellersync.toml", "config/sellersync.json"];

/// Load configuration from defaults, an optional file and the environment.
///
/// # Errors
/// Returns `SellerSyncError::Config` if the file cannot be parsed, an
/// environment value is malformed, or the merged result fails validation.
pub fn load() -> Result<Config> {
    let base = match probe_config_paths() {
        Some(path) => load_from_file(Some(path))?,
        None => {
            tracing::info!("No config file found, using defaults and environment");
            Config::default()
        }
    };

    let config = apply_env_overrides(base, |key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from a file without environment overrides.
///
/// If `path` is `None`, probes the standard locations.
///
/// # Errors
/// Returns `SellerSyncError::Config` if the file is missing, unreadable, or
/// not valid TOML/JSON.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(SellerSyncError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            SellerSyncError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| SellerSyncError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Format is chosen by extension; files without one are read as TOML.
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| SellerSyncError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| SellerSyncError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(SellerSyncError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// First existing config file, honoring `SELLERSYNC_CONFIG` when set.
pub fn probe_config_paths() -> Option<PathBuf> {
    if let Some(explicit) = std::env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(explicit));
    }

    let mut roots = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd);
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf))
    {
        roots.push(exe_dir);
    }

    roots
        .iter()
        .flat_map(|root| FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

/// Overlay `SELLERSYNC_*` values onto `config`.
///
/// `lookup` resolves a variable name to its value; pass
/// `|k| std::env::var(k).ok()` for the process environment.
///
/// # Errors
/// Returns `SellerSyncError::Config` naming the variable when a value cannot
/// be parsed.
pub fn apply_env_overrides<F>(mut config: Config, lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let env = Env(&lookup);

    env.string("SELLERSYNC_BIND_ADDR", &mut config.server.bind_addr);
    env.string("SELLERSYNC_FRONTEND_URL", &mut config.server.frontend_url);
    env.secret("SELLERSYNC_COOKIE_SECRET", &mut config.server.cookie_secret);
    env.bool("SELLERSYNC_COOKIE_SECURE", &mut config.server.cookie_secure);

    if let Some(path) = env.get("SELLERSYNC_DB_PATH") {
        config.database.path = PathBuf::from(path);
    }
    env.parse("SELLERSYNC_DB_POOL_SIZE", &mut config.database.pool_size)?;
    env.secret("SELLERSYNC_DB_ENCRYPTION_KEY", &mut config.database.encryption_key);

    let marketplace = &mut config.marketplace;
    env.string("SELLERSYNC_MARKETPLACE_ID", &mut marketplace.marketplace_id);
    env.string("SELLERSYNC_API_BASE_URL", &mut marketplace.api_base_url);
    env.string("SELLERSYNC_AUTHORIZATION_URL", &mut marketplace.authorization_url);
    env.string("SELLERSYNC_TOKEN_URL", &mut marketplace.token_url);
    env.string("SELLERSYNC_CLIENT_ID", &mut marketplace.client_id);
    env.secret("SELLERSYNC_CLIENT_SECRET", &mut marketplace.client_secret);
    env.string("SELLERSYNC_REDIRECT_URI", &mut marketplace.redirect_uri);
    if let Some(scopes) = env.get("SELLERSYNC_SCOPES") {
        marketplace.scopes = scopes
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect();
    }

    env.secret("SELLERSYNC_VAULT_PASSPHRASE", &mut config.vault.passphrase);

    env.bool("SELLERSYNC_PKCE_REQUIRED", &mut config.oauth.pkce_required);
    env.bool("SELLERSYNC_DURABLE_PENDING_STATE", &mut config.oauth.durable_pending_state);

    env.parse("SELLERSYNC_SYNC_PAGE_SIZE", &mut config.sync.page_size)?;
    env.parse("SELLERSYNC_SYNC_MAX_PAGES", &mut config.sync.max_pages)?;
    env.string("SELLERSYNC_SYNC_SCHEDULE", &mut config.sync.schedule);
    env.bool("SELLERSYNC_SYNC_SCHEDULE_ENABLED", &mut config.sync.schedule_enabled);

    env.parse("SELLERSYNC_WORKER_POLL_MS", &mut config.worker.poll_interval_ms)?;
    env.parse("SELLERSYNC_WORKER_BATCH_SIZE", &mut config.worker.batch_size)?;

    Ok(config)
}

struct Env<'a, F>(&'a F);

impl<F> Env<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Set but blank values count as unset.
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    fn string(&self, key: &str, target: &mut String) {
        if let Some(value) = self.get(key) {
            *target = value;
        }
    }

    fn secret(&self, key: &str, target: &mut Option<Secret>) {
        if let Some(value) = self.get(key) {
            *target = Some(Secret::new(value));
        }
    }

    /// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive).
    fn bool(&self, key: &str, target: &mut bool) {
        if let Some(value) = self.get(key) {
            *target = matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
    }

    fn parse<T>(&self, key: &str, target: &mut T) -> Result<()>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        if let Some(value) = self.get(key) {
            *target = value
                .parse()
                .map_err(|e| SellerSyncError::Config(format!("Invalid value for {key}: {e}")))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use tempfile::Builder;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        move |key| map.get(key).cloned()
    }

    fn write_temp(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_env_overrides_apply_over_defaults() {
        let config = apply_env_overrides(
            Config::default(),
            lookup(&[
                ("SELLERSYNC_DB_PATH", "/tmp/sync.db"),
                ("SELLERSYNC_DB_POOL_SIZE", "3"),
                ("SELLERSYNC_CLIENT_ID", "app-123"),
                ("SELLERSYNC_CLIENT_SECRET", "shh"),
                ("SELLERSYNC_SCOPES", "offline_access, read write"),
                ("SELLERSYNC_PKCE_REQUIRED", "off"),
                ("SELLERSYNC_SYNC_PAGE_SIZE", "25"),
                ("SELLERSYNC_WORKER_BATCH_SIZE", "4"),
            ]),
        )
        .unwrap();

        assert_eq!(config.database.path, PathBuf::from("/tmp/sync.db"));
        assert_eq!(config.database.pool_size, 3);
        assert_eq!(config.marketplace.client_id, "app-123");
        assert_eq!(config.marketplace.client_secret.as_ref().map(Secret::expose), Some("shh"));
        assert_eq!(config.marketplace.scopes, vec!["offline_access", "read", "write"]);
        assert!(!config.oauth.pkce_required);
        assert_eq!(config.sync.page_size, 25);
        assert_eq!(config.worker.batch_size, 4);
        // untouched sections keep their defaults
        assert_eq!(config.server.bind_addr, "127.0.0.1:8080");
    }

    #[test]
    fn test_invalid_number_names_the_variable() {
        let err = apply_env_overrides(
            Config::default(),
            lookup(&[("SELLERSYNC_DB_POOL_SIZE", "many")]),
        )
        .unwrap_err();

        assert!(matches!(&err, SellerSyncError::Config(msg) if msg.contains("SELLERSYNC_DB_POOL_SIZE")));
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let config = apply_env_overrides(
            Config::default(),
            lookup(&[("SELLERSYNC_CLIENT_SECRET", "  "), ("SELLERSYNC_BIND_ADDR", "")]),
        )
        .unwrap();

        assert!(config.marketplace.client_secret.is_none());
        assert_eq!(config.server.bind_addr, "127.0.0.1:8080");
    }

    #[test]
    fn test_load_from_file_toml() {
        let file = write_temp(
            ".toml",
            r#"
            [database]
            path = "data/sellersync.db"
            pool_size = 2

            [marketplace]
            client_id = "app-1"
            scopes = ["read"]

            [sync]
            page_size = 10
            "#,
        );

        let config = load_from_file(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.database.pool_size, 2);
        assert_eq!(config.marketplace.client_id, "app-1");
        assert_eq!(config.marketplace.scopes, vec!["read"]);
        assert_eq!(config.sync.page_size, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file_json() {
        let file = write_temp(".json", r#"{"worker": {"poll_interval_ms": 250}}"#);

        let config = load_from_file(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.worker.poll_interval_ms, 250);
    }

    #[test]
    fn test_load_from_file_errors() {
        let missing = load_from_file(Some(PathBuf::from("/nonexistent/sellersync.toml")));
        assert!(matches!(missing, Err(SellerSyncError::Config(_))));

        let broken = write_temp(".toml", "[database\npath = ");
        assert!(load_from_file(Some(broken.path().to_path_buf())).is_err());

        let yaml = write_temp(".yaml", "database: {}");
        let err = load_from_file(Some(yaml.path().to_path_buf())).unwrap_err();
        assert!(err.to_string().contains("Unsupported config format"));
    }
}
