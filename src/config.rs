use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::events::{Rect, Size};
use crate::utils::normalize_process_name;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub logging: LoggingConfig,
    pub snapshot: SnapshotConfig,
    pub placement: PlacementConfig,
    pub activation: ActivationConfig,
    pub groups: GroupsConfig,
    // Нормализованный индекс дополнительных системных процессов - не сериализуется
    #[serde(skip)]
    extra_system_set: HashSet<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    /// `full` или `compact`
    pub format: String,
    /// Дополнительные директивы EnvFilter, например `taskbar_grouper::services::snapshot=trace`
    #[serde(default)]
    pub filter: String,
}

impl LoggingConfig {
    /// Директива фильтра: уровень плюс дополнительные правила
    pub fn directive(&self) -> String {
        if self.filter.trim().is_empty() {
            self.level.clone()
        } else {
            format!("{},{}", self.level, self.filter.trim())
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SnapshotConfig {
    /// Дополняет встроенный список системных процессов, но не заменяет его
    #[serde(default)]
    pub extra_system_processes: Vec<String>,
    pub resolve_icons: bool,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Anchoring {
    /// Над курсором, с переворотом вниз у верхнего края
    Cursor,
    /// Нижний край панели прижат к рабочей области, левый край запоминается
    Taskbar,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlacementConfig {
    pub default_width: i32,
    pub default_height: i32,
    pub margin: i32,
    #[serde(default)]
    pub edge_padding: i32,
    pub anchoring: Anchoring,
    pub fallback_work_area: Rect,
}

impl PlacementConfig {
    pub fn default_size(&self) -> Size {
        Size::new(self.default_width, self.default_height)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ActivationConfig {
    pub cooldown_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GroupsConfig {
    /// Файл с группами; если не задан, используются группы по умолчанию без сохранения
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let mut config = Self {
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "compact".to_string(),
                filter: String::new(),
            },
            snapshot: SnapshotConfig {
                extra_system_processes: Vec::new(),
                resolve_icons: true,
                timeout_ms: 2000,
            },
            placement: PlacementConfig {
                default_width: 350,
                default_height: 450,
                margin: 20,
                edge_padding: 0,
                anchoring: Anchoring::Cursor,
                fallback_work_area: Rect::new(0, 0, 1920, 1040),
            },
            activation: ActivationConfig { cooldown_ms: 500 },
            groups: GroupsConfig { file: None },
            extra_system_set: HashSet::new(),
        };
        config.build_optimization_indexes();
        config
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        let figment = Figment::from(figment::providers::Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("GROUPER_").split("__"));

        let mut config: Config = figment
            .extract()
            .with_context(|| format!("Не удалось загрузить конфигурацию из {:?}", config_path))?;

        config.validate()?;
        config.build_optimization_indexes();

        Ok(config)
    }

    /// Строит нормализованный индекс системных процессов из конфигурации
    pub fn build_optimization_indexes(&mut self) {
        self.extra_system_set = self
            .snapshot
            .extra_system_processes
            .iter()
            .map(|name| normalize_process_name(name))
            .filter(|name| !name.is_empty())
            .collect();
    }

    pub fn extra_system_processes(&self) -> &HashSet<String> {
        &self.extra_system_set
    }

    pub fn validate(&self) -> Result<()> {
        // Валидация настроек логирования
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Неверный уровень логирования: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "full" | "compact" => {}
            _ => anyhow::bail!("Неверный формат логирования: {}", self.logging.format),
        }

        if self.snapshot.timeout_ms < 100 {
            anyhow::bail!("snapshot.timeout_ms должно быть минимум 100");
        }

        // Валидация размещения
        let placement = &self.placement;
        if placement.default_width <= 0 || placement.default_height <= 0 {
            anyhow::bail!(
                "Размер панели по умолчанию должен быть положительным: {}x{}",
                placement.default_width,
                placement.default_height
            );
        }

        if placement.margin < 0 || placement.edge_padding < 0 {
            anyhow::bail!("margin и edge_padding не могут быть отрицательными");
        }

        let fallback = placement.fallback_work_area;
        if fallback.width() <= 0 || fallback.height() <= 0 {
            anyhow::bail!("Пустая резервная рабочая область: {}", fallback);
        }

        if self.activation.cooldown_ms == 0 {
            anyhow::bail!("activation.cooldown_ms должно быть больше 0");
        }

        Ok(())
    }
}
