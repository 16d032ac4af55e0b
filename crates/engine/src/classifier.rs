use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use common::{Error, Polarity, Result, SentimentClassifier, SentimentJudgment};

/// Label order of the model's output logits.
pub const LABELS: [Polarity; 3] = [Polarity::Positive, Polarity::Negative, Polarity::Neutral];

/// Client for a sentiment model served over HTTP.
///
/// Sends `{"inputs": [headline, ...]}` and expects one row of logits per
/// headline, `{"logits": [[positive, negative, neutral], ...]}`. The batch is
/// scored as a whole: logits are summed across headlines before the softmax.
pub struct HttpClassifier {
    url: String,
    http: Client,
}

impl HttpClassifier {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            url: url.into(),
            http: Client::builder()
                .use_rustls_tls()
                .build()
                .map_err(|e| Error::Http(format!("failed to build HTTP client: {e}")))?,
        })
    }
}

#[async_trait]
impl SentimentClassifier for HttpClassifier {
    async fn classify(&self, headlines: &[String]) -> Result<SentimentJudgment> {
        if headlines.is_empty() {
            return Ok(SentimentJudgment::neutral());
        }

        let resp = self
            .http
            .post(&self.url)
            .json(&ClassifyRequest { inputs: headlines })
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::Http(format!("HTTP {status} from sentiment model: {body}")));
        }

        let scored: ClassifyResponse = serde_json::from_str(&body)?;
        if scored.logits.len() != headlines.len() {
            return Err(Error::Other(format!(
                "sentiment model returned {} rows for {} headlines",
                scored.logits.len(),
                headlines.len()
            )));
        }
        debug!(count = headlines.len(), "Scored headlines");
        Ok(aggregate_logits(&scored.logits))
    }
}

/// Sum per-headline logits, softmax, and pick the most probable label.
/// An empty batch is `(0.0, Neutral)`.
pub fn aggregate_logits(rows: &[[f64; 3]]) -> SentimentJudgment {
    if rows.is_empty() {
        return SentimentJudgment::neutral();
    }

    let mut summed = [0.0f64; 3];
    for row in rows {
        for (acc, logit) in summed.iter_mut().zip(row) {
            *acc += logit;
        }
    }

    // Shift by the max for a numerically stable softmax
    let max = summed.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps = summed.map(|v| (v - max).exp());
    let total: f64 = exps.iter().sum();

    let best = exps
        .iter()
        .enumerate()
        .fold(0, |best, (i, v)| if *v > exps[best] { i } else { best });

    SentimentJudgment::new(exps[best] / total, LABELS[best])
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    inputs: &'a [String],
}

#[derive(Deserialize)]
struct ClassifyResponse {
    logits: Vec<[f64; 3]>,
}
