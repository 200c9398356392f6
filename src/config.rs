use crate::events::{Key, ModifierSet};
use crate::services::ChordSpec;
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub guard: GuardConfig,
    pub activity: ActivityConfig,
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub filter: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Сколько после последнего нажатия смена окна считается кражей фокуса
    pub throttle_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ActivityConfig {
    /// "any_key" - активность на любое нажатие, "chord" - только на аккорд
    pub mode: String,
    pub keys: Vec<String>,
    pub modifiers: Vec<String>,
}

/// Темп эмуляции событий в режиме сухого запуска
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub key_interval_ms: u64,
    pub burst_len: usize,
    pub window_interval_ms: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            filter: "focus_lock=info".to_string(),
        }
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self { throttle_ms: 500 }
    }
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            mode: "any_key".to_string(),
            keys: Vec::new(),
            modifiers: Vec::new(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            key_interval_ms: 120,
            burst_len: 5,
            window_interval_ms: 3000,
        }
    }
}

impl GuardConfig {
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

impl ActivityConfig {
    pub fn is_chord_mode(&self) -> bool {
        self.mode == "chord"
    }

    /// Собрать спецификацию аккорда из имён клавиш и модификаторов
    pub fn chord_spec(&self) -> Result<ChordSpec> {
        let keys = self
            .keys
            .iter()
            .map(|name| Key::from_name(name))
            .collect::<crate::error::Result<Vec<Key>>>()?;
        let modifiers = ModifierSet::from_names(&self.modifiers)?;
        Ok(ChordSpec::new(keys, modifiers))
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("FOCUSLOCK_").split("__"));

        let config: Config = figment
            .extract()
            .with_context(|| format!("Не удалось загрузить конфигурацию из {:?}", config_path))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        // Валидация настроек логирования
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Неверный уровень логирования: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "pretty" | "compact" => {}
            _ => anyhow::bail!("Неверный формат логирования: {}", self.logging.format),
        }

        // Валидация окна троттлинга
        if self.guard.throttle_ms == 0 || self.guard.throttle_ms > 10_000 {
            anyhow::bail!(
                "throttle_ms должно быть в диапазоне 1..=10000, получено {}",
                self.guard.throttle_ms
            );
        }

        // Валидация источника активности
        match self.activity.mode.as_str() {
            "any_key" => {}
            "chord" => {
                if self.activity.keys.is_empty() {
                    anyhow::bail!("Режим 'chord' требует хотя бы одну клавишу в activity.keys");
                }
                self.activity
                    .chord_spec()
                    .context("Некорректный аккорд в секции [activity]")?;
            }
            _ => anyhow::bail!("Неверный режим активности: {}", self.activity.mode),
        }

        // Валидация эмуляции
        if self.simulation.key_interval_ms < 10 || self.simulation.window_interval_ms < 100 {
            anyhow::bail!("key_interval_ms должно быть минимум 10, window_interval_ms - минимум 100");
        }

        Ok(())
    }
}
