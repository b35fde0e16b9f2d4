use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
    time::Duration,
};

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::credential::{StaticToken, TokenFile, TokenSource};

pub const SETTINGS_FILE_NAME: &str = "sigcheck.toml";

/// Units for the region coordinates sent to the clear stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionUnits {
    #[default]
    Normalized,
    Pixel,
}

impl FromStr for RegionUnits {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normalized" => Ok(RegionUnits::Normalized),
            "pixel" | "pixels" => Ok(RegionUnits::Pixel),
            other => Err(anyhow!("unknown region units '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub stage_url: String,
    pub library_url: String,
    pub token: Option<String>,
    pub token_file: Option<PathBuf>,
    pub request_timeout_seconds: u64,
    pub clear_region_units: RegionUnits,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            stage_url: "http://localhost:5000".into(),
            library_url: "http://localhost:7015/api/Signatures".into(),
            token: None,
            token_file: None,
            request_timeout_seconds: 60,
            clear_region_units: RegionUnits::Normalized,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    stage_url: Option<String>,
    library_url: Option<String>,
    token: Option<String>,
    token_file: Option<PathBuf>,
    request_timeout_seconds: Option<u64>,
    clear_region_units: Option<RegionUnits>,
}

impl Settings {
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        let mut settings = Settings::default();
        settings.apply_toml(raw)?;
        Ok(settings)
    }

    fn apply_toml(&mut self, raw: &str) -> anyhow::Result<()> {
        let file: SettingsFile = toml::from_str(raw).context("invalid settings file")?;
        if let Some(v) = file.stage_url {
            self.stage_url = v;
        }
        if let Some(v) = file.library_url {
            self.library_url = v;
        }
        if let Some(v) = file.token {
            self.token = Some(v);
        }
        if let Some(v) = file.token_file {
            self.token_file = Some(v);
        }
        if let Some(v) = file.request_timeout_seconds {
            self.request_timeout_seconds = v;
        }
        if let Some(v) = file.clear_region_units {
            self.clear_region_units = v;
        }
        Ok(())
    }

    /// Applies environment overrides. `lookup` is `std::env::var` outside tests.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(v) = lookup("SIGCHECK_STAGE_URL") {
            self.stage_url = v;
        }
        if let Some(v) = lookup("APP__STAGE_URL") {
            self.stage_url = v;
        }

        if let Some(v) = lookup("SIGCHECK_LIBRARY_URL") {
            self.library_url = v;
        }
        if let Some(v) = lookup("APP__LIBRARY_URL") {
            self.library_url = v;
        }

        if let Some(v) = lookup("SIGCHECK_TOKEN") {
            self.token = Some(v);
        }
        if let Some(v) = lookup("SIGCHECK_TOKEN_FILE") {
            self.token_file = Some(PathBuf::from(v));
        }

        if let Some(v) = lookup("APP__REQUEST_TIMEOUT_SECONDS") {
            self.request_timeout_seconds = v
                .parse()
                .with_context(|| format!("APP__REQUEST_TIMEOUT_SECONDS is not a number: '{v}'"))?;
        }
        if let Some(v) = lookup("SIGCHECK_CLEAR_UNITS") {
            self.clear_region_units = v.parse()?;
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        Url::parse(&self.stage_url)
            .with_context(|| format!("invalid stage_url '{}'", self.stage_url))?;
        Url::parse(&self.library_url)
            .with_context(|| format!("invalid library_url '{}'", self.library_url))?;
        if self.request_timeout_seconds == 0 {
            return Err(anyhow!("request_timeout_seconds must be positive"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// An inline token wins over a token file.
    pub fn token_source(&self) -> Arc<dyn TokenSource> {
        match (&self.token, &self.token_file) {
            (Some(token), _) => Arc::new(StaticToken::new(Some(token.clone()))),
            (None, Some(path)) => Arc::new(TokenFile::new(path.clone())),
            (None, None) => Arc::new(StaticToken::new(None)),
        }
    }
}

fn default_settings_path() -> Option<PathBuf> {
    let local = PathBuf::from(SETTINGS_FILE_NAME);
    if local.exists() {
        return Some(local);
    }
    let user = dirs::config_dir()?.join("sigcheck").join(SETTINGS_FILE_NAME);
    user.exists().then_some(user)
}

/// Defaults, then the settings file, then environment overrides.
pub fn load_settings(explicit_path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let path = match explicit_path {
        Some(path) => Some(path.to_path_buf()),
        None => default_settings_path(),
    };
    if let Some(path) = path {
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
        settings
            .apply_toml(&raw)
            .with_context(|| format!("failed to parse settings file '{}'", path.display()))?;
        tracing::info!(path = %path.display(), "loaded settings file");
    }

    settings.apply_env(|name| std::env::var(name).ok())?;
    settings.validate()?;
    Ok(settings)
}
