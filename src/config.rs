use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const CONFIG_ENV: &str = "CDX_CONFIG";
pub const DEFAULT_FADE_DELAY_MS: u64 = 350;

/// What happens when wrong guesses pile up.
///
/// `Unlimited` only counts mistakes; the game is lost solely by surrendering.
/// `Lives(n)` loses the game on the `n`th wrong guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptPolicy {
    #[default]
    Unlimited,
    Lives(u32),
}

impl AttemptPolicy {
    pub fn is_exhausted(self, wrong_attempts: u32) -> bool {
        match self {
            AttemptPolicy::Unlimited => false,
            AttemptPolicy::Lives(lives) => wrong_attempts >= lives,
        }
    }

    pub fn lives_left(self, wrong_attempts: u32) -> Option<u32> {
        match self {
            AttemptPolicy::Unlimited => None,
            AttemptPolicy::Lives(lives) => Some(lives.saturating_sub(wrong_attempts)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Delay between a correct guess and the commit that removes its tiles.
    pub fade_delay_ms: u64,
    pub attempt_policy: AttemptPolicy,
    pub progress_db: Option<PathBuf>,
    pub catalog: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fade_delay_ms: DEFAULT_FADE_DELAY_MS,
            attempt_policy: AttemptPolicy::default(),
            progress_db: None,
            catalog: None,
        }
    }
}

impl EngineConfig {
    pub fn fade_delay(&self) -> Duration {
        Duration::from_millis(self.fade_delay_ms)
    }

    /// Reads a TOML config file. Missing, unreadable or invalid files yield defaults.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Self::default();
            }
        };

        match toml::from_str(&content) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Self::default()
            }
        }
    }

    /// Loads the file named by `CDX_CONFIG`, or defaults when unset.
    pub fn from_env() -> Self {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(PathBuf::from(path)),
            None => Self::default(),
        }
    }
}
