use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use common::{Error, Result};

/// Top-level strategy config file (TOML).
///
/// Example `config/strategy.toml`:
/// ```toml
/// [strategy]
/// name = "mlstrategy"
/// symbol = "GOOGL"
/// cash_at_risk = 0.5
/// sleeptime = "24H"
/// same_direction = "reenter"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyFileConfig {
    pub strategy: StrategyConfig,
}

/// What to do when the signal repeats the direction of the last entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SameDirection {
    /// Submit another entry of the freshly sized quantity.
    #[default]
    Reenter,
    /// Do nothing.
    Hold,
}

/// Immutable parameters of one strategy instance.
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    /// Human-readable name shown in logs.
    #[serde(default = "default_name")]
    pub name: String,
    /// Ticker, e.g. "GOOGL".
    pub symbol: String,
    /// Fraction of available cash used to size each entry, in (0, 1].
    #[serde(default = "default_cash_at_risk")]
    pub cash_at_risk: f64,
    /// Time between ticks. Written as `<n>S`, `<n>M`, `<n>H` or `<n>D`.
    #[serde(
        rename = "sleeptime",
        default = "default_tick_interval",
        deserialize_with = "deserialize_sleeptime"
    )]
    pub tick_interval: Duration,
    #[serde(default)]
    pub same_direction: SameDirection,
}

impl StrategyConfig {
    /// Build a validated config with default name, 24h ticks and re-entry on
    /// repeated signals.
    pub fn new(symbol: impl Into<String>, cash_at_risk: f64) -> Result<Self> {
        let cfg = Self {
            name: default_name(),
            symbol: symbol.into(),
            cash_at_risk,
            tick_interval: default_tick_interval(),
            same_direction: SameDirection::default(),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Result<Self> {
        self.tick_interval = tick_interval;
        self.validate()?;
        Ok(self)
    }

    pub fn with_same_direction(mut self, same_direction: SameDirection) -> Self {
        self.same_direction = same_direction;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.symbol.trim().is_empty() {
            return Err(Error::Config("strategy symbol must not be empty".into()));
        }
        if !(self.cash_at_risk > 0.0 && self.cash_at_risk <= 1.0) {
            return Err(Error::Config(format!(
                "cash_at_risk must be in (0, 1], got {}",
                self.cash_at_risk
            )));
        }
        if self.tick_interval.is_zero() {
            return Err(Error::Config("sleeptime must be positive".into()));
        }
        Ok(())
    }
}

impl StrategyFileConfig {
    /// Load and validate from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read strategy config at '{path}': {e}"))
        })?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("Invalid strategy config at '{path}': {e}")))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let file: StrategyFileConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        file.strategy.validate()?;
        Ok(file)
    }
}

/// Parse a sleeptime such as `"24H"`, `"30M"`, `"1D"` or `"90S"`.
pub fn parse_sleeptime(s: &str) -> Result<Duration> {
    let s = s.trim();
    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| Error::Config(format!("sleeptime '{s}' is missing a unit")))?;
    let (digits, unit) = s.split_at(split);
    let n: u64 = digits
        .parse()
        .map_err(|_| Error::Config(format!("sleeptime '{s}' has no amount")))?;
    let unit_secs: u64 = match unit.to_ascii_uppercase().as_str() {
        "S" => 1,
        "M" => 60,
        "H" => 3_600,
        "D" => 86_400,
        other => {
            return Err(Error::Config(format!(
                "sleeptime unit must be S, M, H or D, got '{other}'"
            )))
        }
    };
    let secs = n
        .checked_mul(unit_secs)
        .ok_or_else(|| Error::Config(format!("sleeptime '{s}' is too large")))?;
    Ok(Duration::from_secs(secs))
}

fn deserialize_sleeptime<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_sleeptime(&raw).map_err(serde::de::Error::custom)
}

fn default_name() -> String {
    "mlstrategy".to_string()
}

fn default_cash_at_risk() -> f64 {
    0.5
}

fn default_tick_interval() -> Duration {
    Duration::from_secs(24 * 3_600)
}
