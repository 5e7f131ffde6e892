use crate::entry::Defaults;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Настройки, которые читаются один раз при старте и явно передаются дальше.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Ключ, под которым лежит JSON-массив конфигураций
    pub storage_key: String,
    /// Запрещать одинаковые имена на уровне хранилища
    pub unique_names: bool,
    pub defaults: Defaults,
    /// Шаг планировщика в миллисекундах
    pub tick_millis: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            storage_key: "otp-configs".to_string(),
            unique_names: false,
            defaults: Defaults::default(),
            tick_millis: 1000,
        }
    }
}

impl Settings {
    /// Прочитать `config.json` из корня хранилища; если файла нет, берём значения по умолчанию.
    pub fn load(root: &Path) -> anyhow::Result<Self> {
        let path = config_path(root);
        if !path.exists() {
            return Ok(Settings::default());
        }
        let data = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        let cfg: Settings = serde_json::from_str(&data)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(cfg)
    }
}

/// Корневая директория хранилища (например, ~/.local/share/otpm-store)
pub fn default_root() -> anyhow::Result<PathBuf> {
    let mut dir = dirs::data_dir().ok_or_else(|| anyhow::anyhow!("cannot get data dir"))?;
    dir.push("otpm-store");
    Ok(dir)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join("config.json")
}
