use serde::{Deserialize, Serialize};
use std::{
  env,
  fmt::Display,
  fs,
  path::PathBuf,
  str::FromStr,
};
use tracing::{info, warn};

use crate::stations::{StationCatalog, DEFAULT_STATIONS};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8001";
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 12 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
  pub bind_addr: String,
  /// JSON snapshot of the event data. Empty keeps everything in memory.
  pub data_path: String,
  pub admin_username: String,
  pub admin_password: String,
  pub token_ttl_secs: u64,
  /// Fixed seed for team shuffles; unset draws from OS entropy.
  pub shuffle_seed: Option<u64>,
  pub cors_origins: Vec<String>,
  pub stations: Vec<String>,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      bind_addr: DEFAULT_BIND_ADDR.to_string(),
      data_path: String::new(),
      admin_username: String::new(),
      admin_password: String::new(),
      token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
      shuffle_seed: None,
      cors_origins: vec!["*".to_string()],
      stations: DEFAULT_STATIONS.iter().map(|s| s.to_string()).collect(),
    }
  }
}

impl AppConfig {
  pub fn station_catalog(&self) -> StationCatalog {
    let names: Vec<String> = self
      .stations
      .iter()
      .map(|s| s.trim().to_string())
      .filter(|s| !s.is_empty())
      .collect();
    if names.is_empty() {
      warn!("No stations configured, using the default route");
      return StationCatalog::default();
    }
    StationCatalog::new(names)
  }

  pub fn data_path(&self) -> Option<PathBuf> {
    let trimmed = self.data_path.trim();
    if trimmed.is_empty() {
      None
    } else {
      Some(resolve_repo_path(trimmed))
    }
  }
}

pub fn repo_root() -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

pub fn resolve_repo_path(raw: &str) -> PathBuf {
  let path = PathBuf::from(raw);
  if path.is_absolute() {
    path
  } else {
    repo_root().join(path)
  }
}

pub fn config_path() -> PathBuf {
  env_default("TRIO_TAG_CONFIG")
    .map(|raw| resolve_repo_path(&raw))
    .unwrap_or_else(|| repo_root().join("config.json"))
}

pub fn env_default(key: &str) -> Option<String> {
  env::var(key)
    .ok()
    .map(|value| value.trim().to_string())
    .filter(|value| !value.is_empty())
}

/// Parsed env value; a value that does not parse is ignored with a warning.
pub fn env_parse<T: FromStr>(key: &str) -> Option<T>
where
  T::Err: Display,
{
  let raw = env_default(key)?;
  raw
    .parse()
    .map_err(|e| warn!("Invalid {key} value {raw:?}: {e}"))
    .ok()
}

pub fn apply_env_defaults(mut config: AppConfig) -> AppConfig {
  if let Some(value) = env_default("TRIO_TAG_BIND") {
    config.bind_addr = value;
  }
  if config.data_path.trim().is_empty() {
    if let Some(value) = env_default("TRIO_TAG_DATA_PATH") {
      config.data_path = value;
    }
  }
  if config.admin_username.trim().is_empty() {
    if let Some(value) = env_default("TRIO_TAG_ADMIN_USER") {
      config.admin_username = value;
    }
  }
  if config.admin_password.is_empty() {
    if let Some(value) = env_default("TRIO_TAG_ADMIN_PASSWORD") {
      config.admin_password = value;
    }
  }
  if let Some(value) = env_parse("TRIO_TAG_TOKEN_TTL_SECS") {
    config.token_ttl_secs = value;
  }
  if let Some(value) = env_parse("TRIO_TAG_SEED") {
    config.shuffle_seed = Some(value);
  }
  if let Some(value) = env_default("TRIO_TAG_CORS_ORIGINS") {
    config.cors_origins = split_list(&value);
  }
  config
}

pub fn split_list(raw: &str) -> Vec<String> {
  raw
    .split(',')
    .map(|part| part.trim())
    .filter(|part| !part.is_empty())
    .map(str::to_string)
    .collect()
}

pub fn load_config_inner() -> Result<AppConfig, String> {
  let path = config_path();
  if !path.is_file() {
    return Ok(apply_env_defaults(AppConfig::default()));
  }
  let data = fs::read_to_string(&path).map_err(|e| format!("read config {}: {e}", path.display()))?;
  let config =
    serde_json::from_str::<AppConfig>(&data).map_err(|e| format!("parse config {}: {e}", path.display()))?;
  info!("Loaded config from {}", path.display());
  Ok(apply_env_defaults(config))
}

/// Seed the process environment from `.env` next to the crate (or at
/// `TRIO_TAG_ENV_FILE`). Variables already set win. Returns how many keys
/// were applied. Runs after tracing is up so an unreadable file is reported.
pub fn load_env_file() -> usize {
  let env_path = env::var_os("TRIO_TAG_ENV_FILE")
    .map(PathBuf::from)
    .unwrap_or_else(|| repo_root().join(".env"));
  if !env_path.is_file() {
    return 0;
  }
  let contents = match fs::read_to_string(&env_path) {
    Ok(data) => data,
    Err(e) => {
      warn!("Ignoring unreadable env file {}: {e}", env_path.display());
      return 0;
    }
  };
  apply_env_lines(&contents)
}

fn apply_env_lines(contents: &str) -> usize {
  let mut applied = 0;
  for (key, value) in contents.lines().filter_map(parse_env_line) {
    if env::var_os(&key).is_none() {
      env::set_var(key, value);
      applied += 1;
    }
  }
  applied
}

pub fn parse_env_line(line: &str) -> Option<(String, String)> {
  let trimmed = line.trim();
  if trimmed.is_empty() || trimmed.starts_with('#') {
    return None;
  }
  let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
  let (key, raw_value) = trimmed.split_once('=')?;
  let key = key.trim();
  if key.is_empty() {
    return None;
  }
  let mut value = raw_value.trim();
  if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
    value = &value[1..value.len() - 1];
  } else if value.starts_with('\'') && value.ends_with('\'') && value.len() >= 2 {
    value = &value[1..value.len() - 1];
  } else if let Some(idx) = value.find('#') {
    value = value[..idx].trim_end();
  }
  Some((key.to_string(), value.to_string()))
}

pub fn log_env_warnings(config: &AppConfig) {
  if config.admin_username.trim().is_empty() || config.admin_password.is_empty() {
    warn!("TRIO_TAG_ADMIN_USER / TRIO_TAG_ADMIN_PASSWORD not set; admin login is disabled");
  }
  if config.data_path().is_none() {
    warn!("TRIO_TAG_DATA_PATH not set; event data lives in memory and is lost on restart");
  }
  if config.cors_origins.is_empty() {
    warn!("No CORS origins configured; browsers on other origins will be refused");
  }
}
