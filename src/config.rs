use crate::error::Result;
use crate::session::RoundConfig;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Inclusive range a numeric setting is kept within.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub min: usize,
    pub max: usize,
}

impl Bounds {
    pub const fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, value: usize) -> usize {
        value.clamp(self.min, self.max)
    }

    /// Parse user text: numbers are floored and clamped, anything else becomes `min`.
    pub fn parse(&self, text: &str) -> usize {
        match text.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => {
                let floored = v.floor();
                if floored <= self.min as f64 {
                    self.min
                } else if floored >= self.max as f64 {
                    self.max
                } else {
                    floored as usize
                }
            }
            _ => self.min,
        }
    }

    /// `current`, or the parsed `text` when one was given.
    pub fn apply(&self, current: usize, text: Option<&str>) -> usize {
        text.map_or(current, |t| self.parse(t))
    }
}

pub const PAIRS_COUNT: Bounds = Bounds::new(1, 50);
pub const CHUNK_SIZE: Bounds = Bounds::new(1, 10);
pub const WORDS_COUNT: Bounds = Bounds::new(1, 100);
pub const COLUMNS: Bounds = Bounds::new(1, 10);
pub const MEMORIZE_SECONDS: Bounds = Bounds::new(5, 120);

fn clamp_seconds(seconds: u32) -> u32 {
    MEMORIZE_SECONDS.clamp(seconds as usize) as u32
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PairsConfig {
    pub pairs_count: usize,
    pub chunk_size: usize,
    pub memorize_seconds: u32,
    pub timer_enabled: bool,
}

impl Default for PairsConfig {
    fn default() -> Self {
        Self {
            pairs_count: 5,
            chunk_size: 5,
            memorize_seconds: 8,
            timer_enabled: true,
        }
    }
}

impl PairsConfig {
    pub fn clamped(&self) -> Self {
        Self {
            pairs_count: PAIRS_COUNT.clamp(self.pairs_count),
            chunk_size: CHUNK_SIZE.clamp(self.chunk_size),
            memorize_seconds: clamp_seconds(self.memorize_seconds),
            timer_enabled: self.timer_enabled,
        }
    }

    pub fn round_config(&self) -> RoundConfig {
        RoundConfig {
            item_count: self.pairs_count,
            layout: self.chunk_size,
            memorize_seconds: self.memorize_seconds,
            timer_enabled: self.timer_enabled,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WordsConfig {
    pub words_count: usize,
    pub columns: usize,
    pub memorize_seconds: u32,
    pub timer_enabled: bool,
    /// Bundled dictionary name or a path to a newline-separated word list.
    pub dictionary: String,
}

impl Default for WordsConfig {
    fn default() -> Self {
        Self {
            words_count: 10,
            columns: 1,
            memorize_seconds: 8,
            timer_enabled: true,
            dictionary: "english".to_string(),
        }
    }
}

impl WordsConfig {
    pub fn clamped(&self) -> Self {
        Self {
            words_count: WORDS_COUNT.clamp(self.words_count),
            columns: COLUMNS.clamp(self.columns),
            memorize_seconds: clamp_seconds(self.memorize_seconds),
            timer_enabled: self.timer_enabled,
            dictionary: self.dictionary.clone(),
        }
    }

    pub fn round_config(&self) -> RoundConfig {
        RoundConfig {
            item_count: self.words_count,
            layout: self.columns,
            memorize_seconds: self.memorize_seconds,
            timer_enabled: self.timer_enabled,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub pairs: PairsConfig,
    pub words: WordsConfig,
}

impl Config {
    pub fn clamped(&self) -> Self {
        Self {
            pairs: self.pairs.clamped(),
            words: self.words.clamped(),
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "rekall") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("rekall_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    /// Missing or unreadable files yield the defaults; values are always clamped.
    fn load(&self) -> Config {
        let Ok(bytes) = fs::read(&self.path) else {
            return Config::default();
        };
        match serde_json::from_slice::<Config>(&bytes) {
            Ok(cfg) => cfg.clamped(),
            Err(e) => {
                log::warn!("ignoring corrupt config {}: {e}", self.path.display());
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(&cfg.clamped())?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}
