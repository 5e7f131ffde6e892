use crate::entry::OtpConfig;
use crate::error::OtpError;
use crate::otp::{counter_at, generate_code_at, remaining_seconds};
use log::warn;

/// Что показывается в одной строке: код (или ошибка) и сколько секунд он ещё живёт.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowView {
    pub label: String,
    pub code: Result<String, OtpError>,
    pub remaining: u32,
    pub period: u32,
}

struct Row {
    config: OtpConfig,
    counter: u64,
    view: RowView,
}

impl Row {
    fn mount(config: OtpConfig, now: u64) -> Self {
        let code = derive(&config, now);
        let view = RowView {
            label: config.label(),
            code,
            remaining: remaining_seconds(now, config.period),
            period: config.period,
        };
        Row {
            counter: counter_at(now, config.period),
            config,
            view,
        }
    }

    fn tick(&mut self, now: u64) {
        self.view.remaining = remaining_seconds(now, self.config.period);
        let counter = counter_at(now, self.config.period);
        // новый шаг (или пропущенная граница): код пересчитывается, старый не переиспользуется
        if counter != self.counter {
            self.counter = counter;
            self.view.code = derive(&self.config, now);
        }
    }
}

fn derive(config: &OtpConfig, now: u64) -> Result<String, OtpError> {
    generate_code_at(config, now).inspect_err(|e| {
        warn!("Cannot derive code for '{}' ({}): {}", config.name, config.id, e);
    })
}

/// Общий тикер для всех видимых конфигураций.
///
/// Один вызов `tick` обновляет все строки; у каждой строки своё состояние,
/// ошибка одной строки не влияет на остальные.
#[derive(Default)]
pub struct Scheduler {
    rows: Vec<Row>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Начать показывать конфигурацию; код считается сразу.
    /// Повторный mount того же id заменяет строку.
    pub fn mount(&mut self, config: OtpConfig, now: u64) {
        let row = Row::mount(config, now);
        match self.rows.iter_mut().find(|r| r.config.id == row.config.id) {
            Some(slot) => *slot = row,
            None => self.rows.push(row),
        }
    }

    /// Перестать показывать конфигурацию. Возвращает, была ли она смонтирована.
    pub fn unmount(&mut self, id: &str) -> bool {
        let before = self.rows.len();
        self.rows.retain(|r| r.config.id != id);
        self.rows.len() != before
    }

    /// Привести набор строк к списку из хранилища: новые смонтировать,
    /// исчезнувшие размонтировать, изменённые пересобрать. Порядок берётся из списка.
    pub fn sync(&mut self, configs: &[OtpConfig], now: u64) {
        let gone: Vec<String> = self
            .rows
            .iter()
            .filter(|r| !configs.iter().any(|c| c.id == r.config.id))
            .map(|r| r.config.id.clone())
            .collect();
        for id in gone {
            self.unmount(&id);
        }

        for config in configs {
            if !self.rows.iter().any(|r| r.config == *config) {
                self.mount(config.clone(), now);
            }
        }

        self.rows
            .sort_by_key(|r| configs.iter().position(|c| c.id == r.config.id));
    }

    pub fn tick(&mut self, now: u64) {
        for row in &mut self.rows {
            row.tick(now);
        }
    }

    pub fn views(&self) -> impl Iterator<Item = &RowView> {
        self.rows.iter().map(|r| &r.view)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
