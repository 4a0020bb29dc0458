use crate::models::Timeframe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("rolling mean window must be positive, got {0}")]
    NonPositiveWindow(usize),

    #[error("aggregation period must be positive, got {0:?}")]
    NonPositivePeriod(Duration),

    #[error("aggregation period must be a whole number of milliseconds, got {0:?}")]
    FractionalMillisPeriod(Duration),

    #[error("max retest bars must be positive, got {0}")]
    NonPositiveRetestBars(u32),

    #[error("bias timeframes must be distinct, {0} appears more than once")]
    DuplicateTimeframe(Timeframe),

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

/// Engine parameters shared by the structure and setup stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrcConfig {
    /// Bars a retest setup stays armed after the CHOCH bar.
    pub max_retest_bars: u32,
    /// Compare CHOCH triggers against the close instead of the bar extreme.
    pub require_close_beyond_structure: bool,
}

impl Default for TrcConfig {
    fn default() -> Self {
        Self {
            max_retest_bars: 20,
            require_close_beyond_structure: true,
        }
    }
}

impl TrcConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retest_bars == 0 {
            return Err(ConfigError::NonPositiveRetestBars(self.max_retest_bars));
        }
        Ok(())
    }
}

/// Short, medium and long lanes of the HTF bias vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiasConfig {
    pub timeframes: [Timeframe; 3],
    pub sma_len: usize,
}

impl Default for BiasConfig {
    fn default() -> Self {
        Self {
            timeframes: [Timeframe::M15, Timeframe::H1, Timeframe::H4],
            sma_len: 50,
        }
    }
}

impl BiasConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sma_len == 0 {
            return Err(ConfigError::NonPositiveWindow(self.sma_len));
        }
        for (i, tf) in self.timeframes.iter().enumerate() {
            if self.timeframes[i + 1..].contains(tf) {
                return Err(ConfigError::DuplicateTimeframe(*tf));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub symbol: String,
    pub trc: TrcConfig,
    pub bias: BiasConfig,
    pub out_dir: PathBuf,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            symbol: "SYMBOL".to_string(),
            trc: TrcConfig::default(),
            bias: BiasConfig::default(),
            out_dir: PathBuf::from("out"),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Defaults overlaid with `TRC_*` environment variables (and `.env`).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; lets tests avoid touching the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Config::default();

        if let Some(symbol) = lookup("TRC_SYMBOL") {
            cfg.symbol = symbol;
        }
        if let Some(v) = lookup("TRC_SMA_LEN") {
            cfg.bias.sma_len = parse_value("TRC_SMA_LEN", &v)?;
        }
        if let Some(v) = lookup("TRC_MAX_RETEST_BARS") {
            cfg.trc.max_retest_bars = parse_value("TRC_MAX_RETEST_BARS", &v)?;
        }
        if let Some(v) = lookup("TRC_REQUIRE_CLOSE") {
            cfg.trc.require_close_beyond_structure = parse_value("TRC_REQUIRE_CLOSE", &v)?;
        }
        if let Some(v) = lookup("TRC_BIAS_TIMEFRAMES") {
            cfg.bias.timeframes = parse_timeframes(&v)?;
        }
        if let Some(dir) = lookup("TRC_OUT_DIR") {
            cfg.out_dir = PathBuf::from(dir);
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            cfg.log_level = level;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.trc.validate()?;
        self.bias.validate()
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
    })
}

fn parse_timeframes(raw: &str) -> Result<[Timeframe; 3], ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        key: "TRC_BIAS_TIMEFRAMES".to_string(),
        value: raw.to_string(),
    };
    let parsed = raw
        .split(',')
        .map(|s| Timeframe::from_str_loose(s).ok_or_else(invalid))
        .collect::<Result<Vec<_>, _>>()?;
    <[Timeframe; 3]>::try_from(parsed).map_err(|_| invalid())
}
