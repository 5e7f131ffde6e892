use crate::entry::OtpConfig;
use crate::error::OtpError;
use crate::kv::KeyValue;
use anyhow::{Context, anyhow};
use log::{debug, warn};
use std::collections::HashSet;
use std::sync::Mutex;

/// Хранилище OTP-конфигураций: весь список лежит одним JSON-значением под одним ключом.
///
/// Все изменения проходят через `mutate`, который держит блокировку на время
/// цикла "прочитать - изменить - записать", чтобы параллельные записи не терялись.
pub struct ConfigStore<K: KeyValue> {
    kv: K,
    key: String,
    unique_names: bool,
    write_lock: Mutex<()>,
}

/// Разобрать сохранённый список.
pub fn decode_list(raw: &str) -> Result<Vec<OtpConfig>, OtpError> {
    serde_json::from_str(raw).map_err(|e| OtpError::StorageReadCorrupt(e.to_string()))
}

fn check_unique(list: &[OtpConfig]) -> Result<(), OtpError> {
    let mut seen = HashSet::new();
    for c in list {
        if !seen.insert(c.name.to_lowercase()) {
            return Err(OtpError::DuplicateName(c.name.clone()));
        }
    }
    Ok(())
}

impl<K: KeyValue> ConfigStore<K> {
    pub fn new(kv: K, key: impl Into<String>, unique_names: bool) -> Self {
        Self {
            kv,
            key: key.into(),
            unique_names,
            write_lock: Mutex::new(()),
        }
    }

    /// Все конфигурации в порядке добавления.
    /// Отсутствующие или испорченные данные дают пустой список.
    pub fn list(&self) -> Vec<OtpConfig> {
        let raw = match self.kv.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!("Failed to read key '{}' from storage: {:?}", self.key, e);
                return Vec::new();
            }
        };
        match decode_list(&raw) {
            Ok(list) => list,
            Err(e) => {
                warn!("{}; treating key '{}' as empty", e, self.key);
                Vec::new()
            }
        }
    }

    /// Найти конфигурацию по id, по префиксу id или по имени (без учёта регистра).
    pub fn find(&self, target: &str) -> anyhow::Result<OtpConfig> {
        let list = self.list();

        if let Some(cfg) = list.iter().find(|c| c.id == target) {
            return Ok(cfg.clone());
        }

        let by_prefix: Vec<&OtpConfig> = list.iter().filter(|c| c.id.starts_with(target)).collect();
        let by_name: Vec<&OtpConfig> = list
            .iter()
            .filter(|c| c.name.eq_ignore_ascii_case(target))
            .collect();

        let candidates = if !target.is_empty() && !by_prefix.is_empty() {
            by_prefix
        } else {
            by_name
        };

        match candidates.as_slice() {
            [one] => Ok((*one).clone()),
            [] => Err(anyhow!("No OTP config matches '{}'", target)),
            many => Err(anyhow!(
                "'{}' is ambiguous, it matches {} configs; use the id instead",
                target,
                many.len()
            )),
        }
    }

    fn write(&self, list: &[OtpConfig]) -> anyhow::Result<()> {
        if list.is_empty() {
            return self
                .kv
                .remove(&self.key)
                .with_context(|| format!("cannot clear key '{}'", self.key));
        }
        let json = serde_json::to_string(list)?;
        self.kv
            .set(&self.key, &json)
            .with_context(|| format!("cannot persist key '{}'", self.key))
    }

    fn mutate<F>(&self, f: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut Vec<OtpConfig>) -> anyhow::Result<()>,
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow!("config store lock poisoned"))?;
        let mut list = self.list();
        f(&mut list)?;
        if self.unique_names {
            check_unique(&list)?;
        }
        self.write(&list)
    }

    pub fn add(&self, config: OtpConfig) -> anyhow::Result<()> {
        self.mutate(|list| {
            debug!("Adding OTP config '{}' ({})", config.name, config.id);
            list.push(config);
            Ok(())
        })
    }

    /// Заменить запись с тем же id целиком.
    pub fn update(&self, config: OtpConfig) -> anyhow::Result<()> {
        self.mutate(|list| {
            let slot = list
                .iter_mut()
                .find(|c| c.id == config.id)
                .ok_or_else(|| anyhow!("No OTP config with id '{}'", config.id))?;
            debug!("Updating OTP config '{}' ({})", config.name, config.id);
            *slot = config;
            Ok(())
        })
    }

    /// Удалить по id; отсутствующий id - не ошибка. Возвращает, было ли что удалять.
    pub fn remove(&self, id: &str) -> anyhow::Result<bool> {
        let mut removed = false;
        self.mutate(|list| {
            let before = list.len();
            list.retain(|c| c.id != id);
            removed = list.len() != before;
            Ok(())
        })?;
        if removed {
            debug!("Removed OTP config {}", id);
        }
        Ok(removed)
    }

    /// Атомарно заменить весь список.
    pub fn replace_all(&self, configs: Vec<OtpConfig>) -> anyhow::Result<()> {
        self.mutate(|list| {
            debug!("Replacing {} OTP configs with {}", list.len(), configs.len());
            *list = configs;
            Ok(())
        })
    }

    /// Дописать пачку конфигураций в конец списка за одну запись.
    /// При `unique_names` конфликт имён отменяет всю пачку.
    pub fn extend(&self, configs: Vec<OtpConfig>) -> anyhow::Result<()> {
        self.mutate(|list| {
            list.extend(configs);
            Ok(())
        })
    }
}
