use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use common::{
    Error, MarketDataPort, NewsItem, NewsWindowProvider, OrderAcceptance, OrderExecutionPort,
    OrderIntent, RejectionReason, Result,
};

/// Alpaca's maximum page size for the news endpoint.
const NEWS_PAGE_LIMIT: u32 = 50;
/// Upper bound on pages fetched for one window.
const MAX_NEWS_PAGES: usize = 20;

/// REST client for Alpaca. Serves account, quotes and news, and places
/// bracket orders on the live or paper trading endpoint.
pub struct AlpacaClient {
    api_key: String,
    api_secret: String,
    trading_url: String,
    data_url: String,
    http: Client,
}

impl AlpacaClient {
    pub fn new(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        trading_url: impl Into<String>,
        data_url: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            trading_url: trading_url.into().trim_end_matches('/').to_string(),
            data_url: data_url.into().trim_end_matches('/').to_string(),
            http: Client::builder()
                .use_rustls_tls()
                .build()
                .map_err(|e| Error::Http(format!("failed to build HTTP client: {e}")))?,
        })
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("APCA-API-KEY-ID", &self.api_key)
            .header("APCA-API-SECRET-KEY", &self.api_secret)
    }

    async fn send(&self, req: RequestBuilder) -> Result<(StatusCode, String)> {
        let resp = self
            .authed(req)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
        Ok((status, body))
    }

    /// GET a data or account endpoint. Any failure is `DataUnavailable`.
    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<String> {
        let (status, body) = self
            .send(self.http.get(url).query(query))
            .await
            .map_err(|e| e.into_unavailable(url))?;
        if !status.is_success() {
            return Err(Error::DataUnavailable(format!("HTTP {status} from {url}: {body}")));
        }
        Ok(body)
    }

    /// Cancel every open order on `symbol`, bracket legs included.
    async fn cancel_open_orders(&self, symbol: &str) -> Result<usize> {
        let url = format!("{}/v2/orders", self.trading_url);
        let query = [("status", "open"), ("symbols", symbol)];
        let (status, body) = self.send(self.http.get(&url).query(&query)).await?;
        if !status.is_success() {
            return Err(Error::rejected(RejectionReason::Broker(format!(
                "listing open orders: HTTP {status}: {body}"
            ))));
        }

        let orders: Vec<OpenOrder> = serde_json::from_str(&body)?;
        let mut cancelled = 0;
        for order in orders.iter().filter(|o| o.symbol == symbol) {
            let url = format!("{}/v2/orders/{}", self.trading_url, order.id);
            let (status, body) = self.send(self.http.delete(&url)).await?;
            // 404 and 422 mean the order already filled or was cancelled
            if status.is_success()
                || status == StatusCode::NOT_FOUND
                || status == StatusCode::UNPROCESSABLE_ENTITY
            {
                cancelled += 1;
                continue;
            }
            return Err(Error::rejected(RejectionReason::Broker(format!(
                "cancelling order {}: HTTP {status}: {body}",
                order.id
            ))));
        }

        if cancelled > 0 {
            debug!(%symbol, cancelled, "Cancelled open orders");
        }
        Ok(cancelled)
    }
}

#[async_trait]
impl MarketDataPort for AlpacaClient {
    async fn cash(&self) -> Result<f64> {
        let url = format!("{}/v2/account", self.trading_url);
        let body = self.get(&url, &[]).await?;
        let account: AccountResponse = serde_json::from_str(&body)?;
        account
            .cash
            .parse::<f64>()
            .map_err(|e| Error::DataUnavailable(format!("unparseable cash '{}': {e}", account.cash)))
    }

    async fn last_price(&self, symbol: &str) -> Result<f64> {
        let url = format!("{}/v2/stocks/{symbol}/trades/latest", self.data_url);
        let body = self.get(&url, &[]).await?;
        let latest: LatestTradeResponse = serde_json::from_str(&body)?;
        Ok(latest.trade.price)
    }
}

#[async_trait]
impl NewsWindowProvider for AlpacaClient {
    async fn headlines(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NewsItem>> {
        let url = format!("{}/v1beta1/news", self.data_url);
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_NEWS_PAGES {
            let mut query = news_query(symbol, start, end);
            if let Some(token) = page_token.take() {
                query.push(("page_token", token));
            }
            let body = self.get(&url, &query).await?;
            let page: NewsResponse = serde_json::from_str(&body)?;
            items.extend(page.news.into_iter().map(|a| NewsItem::new(a.headline)));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!(%symbol, %start, %end, count = items.len(), "Fetched news from Alpaca");
        Ok(items)
    }
}

#[async_trait]
impl OrderExecutionPort for AlpacaClient {
    async fn submit(&self, intent: &OrderIntent) -> Result<OrderAcceptance> {
        let url = format!("{}/v2/orders", self.trading_url);
        let request = BracketOrderRequest::from_intent(intent);

        debug!(symbol = %intent.symbol, side = %intent.side, "Submitting order to Alpaca");
        let (status, body) = self.send(self.http.post(&url).json(&request)).await?;
        if !status.is_success() {
            return Err(Error::rejected(RejectionReason::Broker(format!(
                "HTTP {status}: {body}"
            ))));
        }

        // The order is live once Alpaca says so, readable body or not
        let order_id = match serde_json::from_str::<OrderResponse>(&body) {
            Ok(resp) => resp.id,
            Err(e) => {
                warn!(
                    symbol = %intent.symbol,
                    client_order_id = %request.client_order_id,
                    error = %e,
                    "Order accepted but response unreadable, keeping client order id"
                );
                request.client_order_id.clone()
            }
        };
        Ok(OrderAcceptance {
            order_id,
            symbol: intent.symbol.clone(),
            side: intent.side,
            quantity: intent.quantity,
            accepted_at: Utc::now(),
        })
    }

    /// Bracket legs hold the position's shares, so they go before the close.
    async fn liquidate_all(&self, symbol: &str) -> Result<()> {
        self.cancel_open_orders(symbol).await?;

        let url = format!("{}/v2/positions/{symbol}", self.trading_url);
        let (status, body) = self.send(self.http.delete(&url)).await?;

        // Alpaca answers 404 when there is no open position to close
        if status == StatusCode::NOT_FOUND {
            debug!(%symbol, "No open position to liquidate");
            return Ok(());
        }
        if !status.is_success() {
            return Err(Error::rejected(RejectionReason::Broker(format!(
                "HTTP {status}: {body}"
            ))));
        }
        Ok(())
    }
}

fn news_query(symbol: &str, start: NaiveDate, end: NaiveDate) -> Vec<(&'static str, String)> {
    vec![
        ("symbols", symbol.to_string()),
        ("start", start.format("%Y-%m-%d").to_string()),
        ("end", end.format("%Y-%m-%d").to_string()),
        ("limit", NEWS_PAGE_LIMIT.to_string()),
    ]
}

/// Alpaca rejects sub-penny prices on equities.
fn to_cents(price: f64) -> String {
    format!("{:.2}", (price * 100.0).round() / 100.0)
}

// ─── Request / response types ─────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct BracketOrderRequest {
    client_order_id: String,
    symbol: String,
    qty: String,
    side: String,
    #[serde(rename = "type")]
    order_type: &'static str,
    time_in_force: &'static str,
    order_class: &'static str,
    take_profit: TakeProfit,
    stop_loss: StopLoss,
}

#[derive(Debug, Serialize)]
struct TakeProfit {
    limit_price: String,
}

#[derive(Debug, Serialize)]
struct StopLoss {
    stop_price: String,
}

impl BracketOrderRequest {
    fn from_intent(intent: &OrderIntent) -> Self {
        Self {
            client_order_id: uuid::Uuid::new_v4().to_string(),
            symbol: intent.symbol.clone(),
            qty: intent.quantity.to_string(),
            side: intent.side.to_string(),
            order_type: "market",
            time_in_force: "gtc",
            order_class: "bracket",
            take_profit: TakeProfit {
                limit_price: to_cents(intent.take_profit_price),
            },
            stop_loss: StopLoss {
                stop_price: to_cents(intent.stop_loss_price),
            },
        }
    }
}

#[derive(Deserialize)]
struct OrderResponse {
    id: String,
}

#[derive(Deserialize)]
struct OpenOrder {
    id: String,
    symbol: String,
}

#[derive(Deserialize)]
struct AccountResponse {
    cash: String,
}

#[derive(Deserialize)]
struct LatestTradeResponse {
    trade: LatestTrade,
}

#[derive(Deserialize)]
struct LatestTrade {
    #[serde(rename = "p")]
    price: f64,
}

#[derive(Deserialize)]
struct NewsResponse {
    #[serde(default)]
    news: Vec<NewsArticle>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct NewsArticle {
    headline: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::OrderSide;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    type Route = fn(&str, &str) -> (u16, &'static str);

    /// Local HTTP server answering from `route` and recording `METHOD /path`
    /// of every request it sees, in order.
    struct FakeAlpaca {
        url: String,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl FakeAlpaca {
        async fn start(route: Route) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let url = format!("http://{}", listener.local_addr().unwrap());
            let requests = Arc::new(Mutex::new(Vec::new()));
            let seen = requests.clone();

            tokio::spawn(async move {
                while let Ok((mut stream, _)) = listener.accept().await {
                    let head = read_request(&mut stream).await;
                    let mut parts = head.lines().next().unwrap_or_default().split_whitespace();
                    let method = parts.next().unwrap_or_default().to_string();
                    let target = parts.next().unwrap_or_default();
                    let path = target.split('?').next().unwrap_or_default().to_string();
                    seen.lock().unwrap().push(format!("{method} {path}"));

                    let (code, body) = route(&method, &path);
                    let resp = format!(
                        "HTTP/1.1 {code} Fake\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = stream.write_all(resp.as_bytes()).await;
                    let _ = stream.shutdown().await;
                }
            });

            Self { url, requests }
        }

        fn client(&self) -> AlpacaClient {
            AlpacaClient::new("key", "secret", &self.url, &self.url).unwrap()
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    /// Read one request: headers plus a `content-length` body if present.
    async fn read_request(stream: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let body_len = text[..end]
                    .lines()
                    .filter_map(|l| l.split_once(':'))
                    .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + body_len {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    fn bracket_legs_open(method: &str, path: &str) -> (u16, &'static str) {
        match (method, path) {
            ("GET", "/v2/orders") => (
                200,
                r#"[{"id": "tp-1", "symbol": "GOOGL", "status": "new"},
                    {"id": "sl-1", "symbol": "GOOGL", "status": "held"}]"#,
            ),
            ("DELETE", p) if p.starts_with("/v2/orders/") => (204, ""),
            ("DELETE", "/v2/positions/GOOGL") => (200, r#"{"id": "close-1", "symbol": "GOOGL"}"#),
            _ => (500, r#"{"message": "unexpected"}"#),
        }
    }

    #[tokio::test]
    async fn liquidation_cancels_bracket_legs_before_closing() {
        let alpaca = FakeAlpaca::start(bracket_legs_open).await;

        alpaca.client().liquidate_all("GOOGL").await.unwrap();

        assert_eq!(
            alpaca.requests(),
            vec![
                "GET /v2/orders",
                "DELETE /v2/orders/tp-1",
                "DELETE /v2/orders/sl-1",
                "DELETE /v2/positions/GOOGL",
            ]
        );
    }

    #[tokio::test]
    async fn liquidation_tolerates_legs_that_already_finished() {
        let alpaca = FakeAlpaca::start(|method, path| match (method, path) {
            ("GET", "/v2/orders") => (200, r#"[{"id": "tp-1", "symbol": "GOOGL"}]"#),
            ("DELETE", "/v2/orders/tp-1") => (422, r#"{"message": "order is already filled"}"#),
            ("DELETE", "/v2/positions/GOOGL") => (404, r#"{"message": "position does not exist"}"#),
            _ => (500, ""),
        })
        .await;

        alpaca.client().liquidate_all("GOOGL").await.unwrap();
        assert_eq!(alpaca.requests().len(), 3);
    }

    #[tokio::test]
    async fn refused_close_is_a_broker_rejection() {
        let alpaca = FakeAlpaca::start(|method, path| match (method, path) {
            ("GET", "/v2/orders") => (200, "[]"),
            ("DELETE", "/v2/positions/GOOGL") => (
                403,
                r#"{"code": 40310000, "message": "insufficient qty available for order"}"#,
            ),
            _ => (500, ""),
        })
        .await;

        let err = alpaca.client().liquidate_all("GOOGL").await.unwrap_err();
        assert!(
            matches!(err, Error::OrderRejected { reason: RejectionReason::Broker(_) }),
            "got {err:?}"
        );
        assert_eq!(alpaca.requests(), vec!["GET /v2/orders", "DELETE /v2/positions/GOOGL"]);
    }

    #[tokio::test]
    async fn accepted_order_with_unreadable_body_is_still_accepted() {
        let alpaca = FakeAlpaca::start(|method, path| match (method, path) {
            ("POST", "/v2/orders") => (200, "<html>gateway</html>"),
            _ => (500, ""),
        })
        .await;
        let intent = OrderIntent {
            symbol: "GOOGL".into(),
            quantity: 10,
            side: OrderSide::Buy,
            take_profit_price: 120.0,
            stop_loss_price: 95.0,
        };

        let accepted = alpaca.client().submit(&intent).await.unwrap();
        assert!(uuid::Uuid::parse_str(&accepted.order_id).is_ok());
        assert_eq!(accepted.quantity, 10);
        assert_eq!(accepted.side, OrderSide::Buy);
    }

    #[test]
    fn bracket_request_matches_alpaca_shape() {
        let intent = OrderIntent {
            symbol: "GOOGL".into(),
            quantity: 45,
            side: OrderSide::Sell,
            take_profit_price: 110.0 * 0.80,
            stop_loss_price: 110.0 * 1.05,
        };
        let json = serde_json::to_value(BracketOrderRequest::from_intent(&intent)).unwrap();

        assert_eq!(json["symbol"], "GOOGL");
        assert_eq!(json["qty"], "45");
        assert_eq!(json["side"], "sell");
        assert_eq!(json["type"], "market");
        assert_eq!(json["order_class"], "bracket");
        assert_eq!(json["take_profit"]["limit_price"], "88.00");
        assert_eq!(json["stop_loss"]["stop_price"], "115.50");
        assert!(uuid::Uuid::parse_str(json["client_order_id"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn prices_round_to_cents() {
        assert_eq!(to_cents(95.0), "95.00");
        assert_eq!(to_cents(123.456), "123.46");
        assert_eq!(to_cents(0.004), "0.00");
    }

    #[test]
    fn news_query_uses_plain_dates() {
        let q = news_query(
            "GOOGL",
            NaiveDate::from_ymd_opt(2020, 1, 7).unwrap(),
            NaiveDate::from_ymd_opt(2020, 1, 10).unwrap(),
        );
        assert!(q.contains(&("start", "2020-01-07".to_string())));
        assert!(q.contains(&("end", "2020-01-10".to_string())));
        assert!(q.contains(&("symbols", "GOOGL".to_string())));
    }

    #[test]
    fn parses_news_page() {
        let body = r#"{
            "news": [
                {"id": 1, "headline": "Alphabet tops estimates", "summary": "", "symbols": ["GOOGL"]},
                {"id": 2, "headline": "Regulators question ad business", "symbols": ["GOOGL"]}
            ],
            "next_page_token": "abc"
        }"#;
        let page: NewsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(page.news.len(), 2);
        assert_eq!(page.news[1].headline, "Regulators question ad business");
        assert_eq!(page.next_page_token.as_deref(), Some("abc"));

        let last: NewsResponse = serde_json::from_str(r#"{"news": [], "next_page_token": null}"#).unwrap();
        assert!(last.news.is_empty());
        assert!(last.next_page_token.is_none());
    }

    #[test]
    fn parses_account_and_trade() {
        let account: AccountResponse =
            serde_json::from_str(r#"{"id": "x", "cash": "10000.55", "status": "ACTIVE"}"#).unwrap();
        assert_eq!(account.cash, "10000.55");

        let trade: LatestTradeResponse =
            serde_json::from_str(r#"{"symbol": "GOOGL", "trade": {"t": "2021-06-01T16:00:00Z", "p": 2401.5, "s": 100}}"#)
                .unwrap();
        assert_eq!(trade.trade.price, 2401.5);
    }
}
