use chrono::NaiveDate;

use crate::{Error, Result, TradingMode};

const PAPER_TRADING_URL: &str = "https://paper-api.alpaca.markets";
const LIVE_TRADING_URL: &str = "https://api.alpaca.markets";
const DATA_URL: &str = "https://data.alpaca.markets";

/// Process configuration loaded from environment variables at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // Trading
    pub trading_mode: TradingMode,

    // Broker credentials and endpoints
    pub alpaca_api_key: String,
    pub alpaca_api_secret: String,
    pub alpaca_trading_url: String,
    pub alpaca_data_url: String,

    // Sentiment model endpoint
    pub sentiment_url: String,

    // Strategy config file path
    pub strategy_config_path: String,

    // Backtest
    pub backtest_prices_path: String,
    pub backtest_start: NaiveDate,
    pub backtest_end: NaiveDate,
    pub backtest_initial_cash: f64,
    pub paper_slippage_bps: f64,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let trading_mode = match required_env("TRADING_MODE")?.to_lowercase().as_str() {
            "paper" => TradingMode::Paper,
            "live" => TradingMode::Live,
            "backtest" => TradingMode::Backtest,
            other => {
                return Err(Error::Config(format!(
                    "TRADING_MODE must be 'paper', 'live' or 'backtest', got: '{other}'"
                )))
            }
        };

        let default_trading_url = match trading_mode {
            TradingMode::Live => LIVE_TRADING_URL,
            TradingMode::Paper | TradingMode::Backtest => PAPER_TRADING_URL,
        };

        let backtest_start = optional_date("BACKTEST_START")?
            .or(NaiveDate::from_ymd_opt(2020, 1, 1))
            .ok_or_else(|| Error::Config("invalid default BACKTEST_START".into()))?;
        let backtest_end = optional_date("BACKTEST_END")?
            .or(NaiveDate::from_ymd_opt(2023, 12, 31))
            .ok_or_else(|| Error::Config("invalid default BACKTEST_END".into()))?;
        if backtest_end < backtest_start {
            return Err(Error::Config(format!(
                "BACKTEST_END ({backtest_end}) is before BACKTEST_START ({backtest_start})"
            )));
        }

        Ok(Config {
            trading_mode,
            alpaca_api_key: required_env("ALPACA_API_KEY")?,
            alpaca_api_secret: required_env("ALPACA_API_SECRET")?,
            alpaca_trading_url: optional_env("ALPACA_TRADING_URL")
                .unwrap_or_else(|| default_trading_url.to_string()),
            alpaca_data_url: optional_env("ALPACA_DATA_URL")
                .unwrap_or_else(|| DATA_URL.to_string()),
            sentiment_url: required_env("SENTIMENT_URL")?,
            strategy_config_path: optional_env("STRATEGY_CONFIG_PATH")
                .unwrap_or_else(|| "config/strategy.toml".to_string()),
            backtest_prices_path: optional_env("BACKTEST_PRICES_PATH")
                .unwrap_or_else(|| "data/prices.csv".to_string()),
            backtest_start,
            backtest_end,
            backtest_initial_cash: optional_parsed("BACKTEST_INITIAL_CASH")?
                .unwrap_or(100_000.0),
            paper_slippage_bps: optional_parsed("PAPER_SLIPPAGE_BPS")?.unwrap_or(0.0),
        })
    }
}

fn required_env(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        Error::Config(format!(
            "Required environment variable '{key}' is not set. Check your .env file."
        ))
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn optional_parsed(key: &str) -> Result<Option<f64>> {
    optional_env(key)
        .map(|v| {
            v.trim()
                .parse::<f64>()
                .map_err(|_| Error::Config(format!("{key} must be a number, got: '{v}'")))
        })
        .transpose()
}

fn optional_date(key: &str) -> Result<Option<NaiveDate>> {
    optional_env(key)
        .map(|v| {
            NaiveDate::parse_from_str(v.trim(), "%Y-%m-%d").map_err(|_| {
                Error::Config(format!("{key} must be a YYYY-MM-DD date, got: '{v}'"))
            })
        })
        .transpose()
}
