//! Upstream quote providers: crypto batch prices and per-symbol equity quotes.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

#[derive(Debug, Deserialize)]
pub struct CryptoQuote {
    pub usd: f64,
    #[serde(default)]
    pub usd_24h_change: f64,
}

/// Batch price client against a CoinGecko-style `simple/price` endpoint.
#[derive(Debug, Clone)]
pub struct CryptoProvider {
    client: reqwest::Client,
    base_url: String,
}

impl CryptoProvider {
    pub fn new(base_url: String) -> Self {
        Self {
            client: http_client(),
            base_url,
        }
    }

    /// Fetch prices for a batch of instrument ids, keyed by id.
    pub async fn simple_price(
        &self,
        ids: &[String],
        include_change: bool,
    ) -> Result<HashMap<String, CryptoQuote>, reqwest::Error> {
        let url = format!("{}/simple/price", self.base_url);
        let mut query = vec![
            ("ids".to_string(), ids.join(",")),
            ("vs_currencies".to_string(), "usd".to_string()),
        ];
        if include_change {
            query.push(("include_24hr_change".to_string(), "true".to_string()));
        }
        let resp = self
            .client
            .get(url)
            .query(&query)
            .send()
            .await?
            .error_for_status()?;
        resp.json().await
    }
}

#[derive(Debug, Deserialize)]
pub struct EquityQuote {
    #[serde(rename = "c")]
    pub current: f64,
    #[serde(rename = "dp", default)]
    pub change_percent: f64,
}

/// Per-symbol quote client against a Finnhub-style `quote` endpoint.
#[derive(Debug, Clone)]
pub struct EquityProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl EquityProvider {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: http_client(),
            base_url,
            api_key,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    pub async fn quote(&self, symbol: &str) -> Result<EquityQuote, reqwest::Error> {
        let url = format!("{}/quote", self.base_url);
        let resp = self
            .client
            .get(url)
            .query(&[("symbol", symbol), ("token", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?;
        resp.json().await
    }
}
