use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use derivative::Derivative;
use fs_err::{self as fs};
use serde_derive::{Deserialize, Serialize};
use serde_inline_default::serde_inline_default;
use tracing::level_filters::LevelFilter;
use tracing::*;

use crate::errors::{AppResult, SwitcherError};

pub const SETTINGS_FILE_NAME: &str = "fullscreen-audio-switcher.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullscreenSettings {
    /// Switch on Fullscreen
    ///
    /// When true, entering fullscreen mode switches every role to `device_id`,
    /// and leaving it puts the previous default back.
    #[serde(default)]
    pub enable_switch: bool,
    /// Id of the endpoint to use while in fullscreen mode.
    ///
    /// Empty when the user hasn't chosen one yet.
    #[serde(default)]
    pub device_id: String,
}

#[serde_inline_default]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Derivative)]
#[derivative(Default)]
pub struct MiscSettings {
    #[serde_inline_default(String::from("info"))]
    #[derivative(Default(value = "String::from(\"info\")"))]
    pub log_level: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub fullscreen: FullscreenSettings,
    #[serde(default)]
    pub misc: MiscSettings,
}

impl Settings {
    /// Reads settings from `path`, writing them back so new fields show up in the file.
    ///
    /// A missing file is created with defaults unless `required` is set.
    pub fn load(path: &Path, required: bool) -> AppResult<Self> {
        if !path.exists() && !required {
            let default = Settings::default();
            default.save(path)?;
            return Ok(default);
        } else if !path.exists() && required {
            return Err(SwitcherError::RequiredSettingsMissing);
        }
        let mut file = fs::File::open(path)?;
        let mut buffer = String::new();
        file.read_to_string(&mut buffer)?;
        drop(file);
        let config: Settings = toml::from_str(&buffer)?;
        config.save(path)?;
        Ok(config)
    }
    pub fn save(&self, config_path: &Path) -> AppResult<()> {
        let toml_config = toml::to_string(self)?;
        debug!("Serialized config length: {}", toml_config.len());
        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = fs::File::create(config_path)?;
        file.write_all(toml_config.as_bytes())?;
        file.flush()?;
        file.sync_all()?;
        Ok(())
    }
    pub fn get_log_level(&self) -> LevelFilter {
        LevelFilter::from_str(&self.misc.log_level).unwrap_or(LevelFilter::INFO)
    }
    /// Picks the device used in fullscreen, or clears it with `None`.
    pub fn set_fullscreen_device(&mut self, guid: Option<&str>) {
        self.fullscreen.device_id = guid.map(String::from).unwrap_or_default();
    }
}

/// Where settings and logs live.
///
/// With the `portable` feature, that's the working directory.
pub fn default_config_dir() -> AppResult<PathBuf> {
    if cfg!(feature = "portable") {
        return Ok(std::env::current_dir()?);
    }
    directories::ProjectDirs::from("", "", env!("CARGO_PKG_NAME"))
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or(SwitcherError::ConfigDir)
}

pub fn default_settings_path() -> AppResult<PathBuf> {
    Ok(default_config_dir()?.join(SETTINGS_FILE_NAME))
}
