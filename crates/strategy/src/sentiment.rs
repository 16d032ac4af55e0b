use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, Utc};
use tracing::debug;

use common::{NewsWindowProvider, Result, SentimentClassifier, SentimentJudgment};

/// Calendar days of news looked back over, ending at the evaluation date.
pub const NEWS_WINDOW_DAYS: u64 = 3;

/// Trailing news window for `as_of`: `(as_of - 3 days, as_of)` as plain dates.
pub fn news_window(as_of: DateTime<Utc>) -> (NaiveDate, NaiveDate) {
    let end = as_of.date_naive();
    let start = end
        .checked_sub_days(Days::new(NEWS_WINDOW_DAYS))
        .unwrap_or(NaiveDate::MIN);
    (start, end)
}

/// Trailing news sentiment for a symbol.
///
/// Pulls the window's headlines and hands them to the classifier as one
/// batch. Nothing is cached between calls.
#[derive(Clone)]
pub struct SentimentSignal {
    news: Arc<dyn NewsWindowProvider>,
    classifier: Arc<dyn SentimentClassifier>,
}

impl SentimentSignal {
    pub fn new(news: Arc<dyn NewsWindowProvider>, classifier: Arc<dyn SentimentClassifier>) -> Self {
        Self { news, classifier }
    }

    /// `as_of` must come from the engine's clock, never from wall time, so
    /// backtests only see news that existed at the simulated date.
    pub async fn evaluate(&self, symbol: &str, as_of: DateTime<Utc>) -> Result<SentimentJudgment> {
        let (start, end) = news_window(as_of);

        let items = self
            .news
            .headlines(symbol, start, end)
            .await
            .map_err(|e| e.into_unavailable(&format!("news for {symbol}")))?;

        let headlines: Vec<String> = items.into_iter().map(|item| item.headline).collect();
        debug!(%symbol, %start, %end, count = headlines.len(), "Scoring news window");

        let judgment = self
            .classifier
            .classify(&headlines)
            .await
            .map_err(|e| e.into_unavailable(&format!("sentiment for {symbol}")))?;
        debug!(
            %symbol,
            polarity = %judgment.polarity,
            confidence = judgment.confidence,
            "Sentiment evaluated"
        );
        Ok(judgment)
    }
}
