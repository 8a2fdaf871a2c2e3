//! Live price table: background polling over upstream quote providers, read-locked
//! lookups with a synchronous fallback path, and full-snapshot broadcasting.

mod providers;

pub use providers::{CryptoProvider, EquityProvider};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tokio::sync::{broadcast, watch, RwLock};
use tokio::task::JoinHandle;

use crate::error::Error;
use crate::types::ticker::Ticker;

/// Full symbol -> ticker table pushed to every subscriber on refresh.
pub type PriceSnapshot = Arc<HashMap<String, Ticker>>;

#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Upstream instrument id -> display symbol for the crypto batch poll.
    pub crypto_ids: Vec<(String, String)>,
    pub stock_symbols: Vec<String>,
    pub finnhub_api_key: String,
    pub crypto_interval: Duration,
    pub stock_interval: Duration,
    pub crypto_base_url: String,
    pub equity_base_url: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            crypto_ids: Vec::new(),
            stock_symbols: Vec::new(),
            finnhub_api_key: String::new(),
            crypto_interval: Duration::from_secs(10),
            stock_interval: Duration::from_secs(45),
            crypto_base_url: "https://api.coingecko.com/api/v3".to_string(),
            equity_base_url: "https://finnhub.io/api/v1".to_string(),
        }
    }
}

/// Strip exchange prefixes ("BINANCE:MKRUSDT" -> "MKRUSDT") and trailing quote
/// currencies ("MKRUSDT" -> "MKR"). Suffixes are only stripped when something
/// is left over, so "USDT" itself stays intact.
pub fn normalize_symbol(raw: &str) -> String {
    let mut symbol = raw.trim().to_uppercase();
    if let Some(idx) = symbol.rfind(':') {
        symbol = symbol[idx + 1..].to_string();
    }
    for suffix in ["USDT", "USD"] {
        if symbol.len() > suffix.len() && symbol.ends_with(suffix) {
            symbol.truncate(symbol.len() - suffix.len());
        }
    }
    symbol
}

#[derive(Clone, Copy)]
enum PollSource {
    Crypto,
    Stocks,
}

pub struct PriceFeed {
    crypto: CryptoProvider,
    equities: EquityProvider,
    id_to_symbol: HashMap<String, String>,
    stock_symbols: Vec<String>,
    crypto_interval: Duration,
    stock_interval: Duration,
    prices: RwLock<HashMap<String, Ticker>>,
    updates: broadcast::Sender<PriceSnapshot>,
}

impl PriceFeed {
    pub fn new(cfg: FeedConfig) -> Self {
        let (updates, _) = broadcast::channel(32);
        Self {
            crypto: CryptoProvider::new(cfg.crypto_base_url),
            equities: EquityProvider::new(cfg.equity_base_url, cfg.finnhub_api_key),
            id_to_symbol: cfg.crypto_ids.into_iter().collect(),
            stock_symbols: cfg.stock_symbols,
            crypto_interval: cfg.crypto_interval,
            stock_interval: cfg.stock_interval,
            prices: RwLock::new(HashMap::new()),
            updates,
        }
    }

    /// Spawn the polling loops. Each loop checks the shutdown signal at every
    /// iteration boundary and backs off on repeated upstream failure.
    pub fn spawn(self: Arc<Self>, shutdown: &watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();
        if !self.id_to_symbol.is_empty() {
            handles.push(tokio::spawn(
                Arc::clone(&self).poll(PollSource::Crypto, shutdown.clone()),
            ));
        }
        if !self.stock_symbols.is_empty() && self.equities.is_configured() {
            handles.push(tokio::spawn(
                Arc::clone(&self).poll(PollSource::Stocks, shutdown.clone()),
            ));
        }
        handles
    }

    async fn poll(self: Arc<Self>, source: PollSource, mut shutdown: watch::Receiver<bool>) {
        let (name, interval) = match source {
            PollSource::Crypto => ("crypto", self.crypto_interval),
            PollSource::Stocks => ("stocks", self.stock_interval),
        };
        let mut failures: u32 = 0;
        loop {
            let result = match source {
                PollSource::Crypto => self.refresh_crypto().await,
                PollSource::Stocks => self.refresh_stocks().await,
            };
            match result {
                Ok(count) => {
                    failures = 0;
                    tracing::debug!(source = name, symbols = count, "price refresh");
                }
                Err(err) => {
                    failures = failures.saturating_add(1);
                    tracing::warn!(source = name, %err, failures, "price refresh failed");
                }
            }
            tokio::select! {
                _ = shutdown.changed() => {
                    tracing::info!(source = name, "price loop stopped");
                    return;
                }
                _ = tokio::time::sleep(backoff(interval, failures)) => {}
            }
        }
    }

    async fn refresh_crypto(&self) -> Result<usize, Error> {
        let ids: Vec<String> = self.id_to_symbol.keys().cloned().collect();
        let payload = self.crypto.simple_price(&ids, true).await?;
        let now = Utc::now();
        let mut batch = Vec::new();
        for (id, quote) in payload {
            let Some(symbol) = self.id_to_symbol.get(&id) else {
                continue;
            };
            let Some(price) = Decimal::from_f64(quote.usd).filter(|p| *p > Decimal::ZERO) else {
                continue;
            };
            batch.push(Ticker {
                symbol: symbol.clone(),
                price,
                change_24h: quote.usd_24h_change,
                updated_at: now,
            });
        }
        let count = batch.len();
        self.apply_batch(batch).await;
        Ok(count)
    }

    async fn refresh_stocks(&self) -> Result<usize, Error> {
        let now = Utc::now();
        let mut batch = Vec::new();
        let mut last_err: Option<reqwest::Error> = None;
        for symbol in &self.stock_symbols {
            let quote = match self.equities.quote(symbol).await {
                Ok(q) => q,
                Err(err) => {
                    tracing::debug!(%symbol, %err, "equity quote failed");
                    last_err = Some(err);
                    continue;
                }
            };
            let Some(price) = Decimal::from_f64(quote.current).filter(|p| *p > Decimal::ZERO)
            else {
                tracing::debug!(%symbol, "equity quote returned zero price");
                continue;
            };
            batch.push(Ticker {
                symbol: symbol.clone(),
                price,
                change_24h: quote.change_percent,
                updated_at: now,
            });
        }
        if batch.is_empty() {
            if let Some(err) = last_err {
                return Err(err.into());
            }
            return Ok(0);
        }
        let count = batch.len();
        self.apply_batch(batch).await;
        Ok(count)
    }

    /// Swap a freshly decoded batch into the table, then push the full snapshot
    /// to every live subscriber. Empty batches publish nothing.
    pub async fn apply_batch(&self, batch: Vec<Ticker>) {
        if batch.is_empty() {
            return;
        }
        let mut table = self.prices.write().await;
        for ticker in batch {
            table.insert(ticker.symbol.clone(), ticker);
        }
        let snapshot: PriceSnapshot = Arc::new(table.clone());
        drop(table);
        let _ = self.updates.send(snapshot);
    }

    /// Latest price for a symbol. Table miss or a stale non-positive entry falls
    /// back to a direct upstream query; the fallback result is not cached.
    pub async fn get_price(&self, symbol: &str) -> Result<Decimal, Error> {
        let symbol = normalize_symbol(symbol);
        {
            let table = self.prices.read().await;
            if let Some(ticker) = table.get(&symbol) {
                if ticker.price > Decimal::ZERO {
                    return Ok(ticker.price);
                }
            }
        }

        let crypto_id = self
            .id_to_symbol
            .iter()
            .find_map(|(id, sym)| (*sym == symbol).then(|| id.clone()));
        if let Some(id) = crypto_id {
            if let Ok(payload) = self.crypto.simple_price(&[id.clone()], false).await {
                if let Some(price) = payload
                    .get(&id)
                    .and_then(|q| Decimal::from_f64(q.usd))
                    .filter(|p| *p > Decimal::ZERO)
                {
                    return Ok(price);
                }
            }
        }

        if self.equities.is_configured() {
            if let Ok(quote) = self.equities.quote(&symbol).await {
                if let Some(price) =
                    Decimal::from_f64(quote.current).filter(|p| *p > Decimal::ZERO)
                {
                    return Ok(price);
                }
            }
        }

        Err(Error::PriceUnavailable(symbol))
    }

    /// Known crypto symbols are always tradable. Everything else (equities,
    /// ETFs, forex) is validated lazily through `get_price` at order intake.
    pub fn is_supported(&self, symbol: &str) -> bool {
        let symbol = normalize_symbol(symbol);
        if self.id_to_symbol.values().any(|s| *s == symbol) {
            return true;
        }
        true
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PriceSnapshot> {
        self.updates.subscribe()
    }

    /// Full table snapshot, or `None` while the table is still empty.
    pub async fn snapshot(&self) -> Option<PriceSnapshot> {
        let table = self.prices.read().await;
        if table.is_empty() {
            None
        } else {
            Some(Arc::new(table.clone()))
        }
    }
}

fn backoff(base: Duration, failures: u32) -> Duration {
    base.saturating_mul(1 << failures.min(3))
}
