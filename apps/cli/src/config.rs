use std::{fs, path::Path};

use clap::Args;
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

pub const DEFAULT_CONFIG_FILE: &str = "eventmap.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub database_url: String,
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub supabase_access_token: Option<String>,
    pub user_id: Option<Uuid>,
    pub latitude: f64,
    pub longitude: f64,
    pub location_granted: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://./data/eventmap.db".into(),
            supabase_url: None,
            supabase_anon_key: None,
            supabase_access_token: None,
            user_id: None,
            latitude: 37.78825,
            longitude: -122.4324,
            location_granted: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    database_url: Option<String>,
    supabase_url: Option<String>,
    supabase_anon_key: Option<String>,
    supabase_access_token: Option<String>,
    user_id: Option<Uuid>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    location_granted: Option<bool>,
}

/// Command-line values, applied after the file and the environment.
#[derive(Args, Debug, Default, Clone)]
pub struct Overrides {
    #[arg(long)]
    pub database_url: Option<String>,
    #[arg(long)]
    pub supabase_url: Option<String>,
    #[arg(long)]
    pub supabase_anon_key: Option<String>,
    #[arg(long)]
    pub supabase_access_token: Option<String>,
    #[arg(long)]
    pub user_id: Option<Uuid>,
    #[arg(long, allow_negative_numbers = true)]
    pub latitude: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    pub longitude: Option<f64>,
    /// Simulate a denied location permission.
    #[arg(long)]
    pub deny_location: bool,
}

pub fn apply_overrides(settings: &mut Settings, overrides: Overrides) {
    if let Some(v) = overrides.database_url {
        settings.database_url = v;
    }
    if let Some(v) = overrides.supabase_url {
        settings.supabase_url = Some(v);
    }
    if let Some(v) = overrides.supabase_anon_key {
        settings.supabase_anon_key = Some(v);
    }
    if let Some(v) = overrides.supabase_access_token {
        settings.supabase_access_token = Some(v);
    }
    if let Some(v) = overrides.user_id {
        settings.user_id = Some(v);
    }
    if let Some(v) = overrides.latitude {
        settings.latitude = v;
    }
    if let Some(v) = overrides.longitude {
        settings.longitude = v;
    }
    if overrides.deny_location {
        settings.location_granted = false;
    }
}

/// Defaults, then the config file if present, then the environment.
pub fn load_settings(config_path: &Path) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(config_path) {
        match toml::from_str::<FileSettings>(&raw) {
            Ok(file_cfg) => apply_file(&mut settings, file_cfg),
            Err(err) => warn!(path = %config_path.display(), %err, "ignoring malformed config file"),
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn apply_file(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.database_url {
        settings.database_url = v;
    }
    if let Some(v) = file_cfg.supabase_url {
        settings.supabase_url = Some(v);
    }
    if let Some(v) = file_cfg.supabase_anon_key {
        settings.supabase_anon_key = Some(v);
    }
    if let Some(v) = file_cfg.supabase_access_token {
        settings.supabase_access_token = Some(v);
    }
    if let Some(v) = file_cfg.user_id {
        settings.user_id = Some(v);
    }
    if let Some(v) = file_cfg.latitude {
        settings.latitude = v;
    }
    if let Some(v) = file_cfg.longitude {
        settings.longitude = v;
    }
    if let Some(v) = file_cfg.location_granted {
        settings.location_granted = v;
    }
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    let first = |keys: &[&str]| keys.iter().rev().find_map(|key| var(key));

    if let Some(v) = first(&["DATABASE_URL", "APP__DATABASE_URL"]) {
        settings.database_url = v;
    }
    if let Some(v) = first(&["SUPABASE_URL", "APP__SUPABASE_URL"]) {
        settings.supabase_url = Some(v);
    }
    if let Some(v) = first(&["SUPABASE_ANON_KEY", "APP__SUPABASE_ANON_KEY"]) {
        settings.supabase_anon_key = Some(v);
    }
    if let Some(v) = first(&["SUPABASE_ACCESS_TOKEN", "APP__SUPABASE_ACCESS_TOKEN"]) {
        settings.supabase_access_token = Some(v);
    }
    if let Some(v) = first(&["APP__USER_ID"]) {
        match v.parse::<Uuid>() {
            Ok(parsed) => settings.user_id = Some(parsed),
            Err(err) => warn!(%err, "ignoring APP__USER_ID"),
        }
    }
}

/// Plain file paths become `sqlite://` URLs. Directory creation is left to
/// `Storage::new`.
pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}
