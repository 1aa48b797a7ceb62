//! Quote/cache store port and the in-memory adapter.
//!
//! The engine reads underlying quotes and index volatility from the store and
//! writes finished envelopes back with a TTL. Values are JSON strings.
//!
//! # Key layout
//!
//! | Key | Value |
//! |-----|-------|
//! | `underlying:{symbol}` | latest `UnderlyingQuote` |
//! | `underlying:history:{symbol}` | list of `UnderlyingQuote`, newest first |
//! | `volatility:index:{index}` | latest index `VolatilityQuote` |
//! | `greeks:{instrument}` | last `CalculationEnvelope` |

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::RwLock;

/// Store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backend failed or timed out.
    #[error("store backend error: {0}")]
    Backend(String),

    /// A stored value was not valid JSON for the expected type.
    #[error("malformed value at '{key}': {message}")]
    Decode {
        /// Key that held the value.
        key: String,
        /// Decoder message.
        message: String,
    },

    /// A value could not be encoded.
    #[error("failed to encode value for '{key}': {message}")]
    Encode {
        /// Target key.
        key: String,
        /// Encoder message.
        message: String,
    },
}

/// Key of the latest quote for an underlying.
#[must_use]
pub fn underlying_key(symbol: &str) -> String {
    format!("underlying:{symbol}")
}

/// Key of the quote history list for an underlying.
#[must_use]
pub fn underlying_history_key(symbol: &str) -> String {
    format!("underlying:history:{symbol}")
}

/// Key of the latest index volatility.
#[must_use]
pub fn index_volatility_key(index_symbol: &str) -> String {
    format!("volatility:index:{index_symbol}")
}

/// Key of the cached envelope for an instrument.
#[must_use]
pub fn greeks_key(instrument: &str) -> String {
    format!("greeks:{instrument}")
}

/// Port for the external quote/cache store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteStore: Send + Sync {
    /// Value at `key`, or `None` if absent or expired.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write `value` at `key`, expiring after `ttl` when given.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// List elements `start..=end` at `key`. Negative indices count from the
    /// end, as in Redis `LRANGE`.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails.
    async fn list_range(&self, key: &str, start: isize, end: isize)
    -> Result<Vec<String>, StoreError>;
}

/// Read and decode a JSON value.
///
/// # Errors
///
/// Returns error if the backend fails or the value does not decode.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn QuoteStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    store
        .get(key)
        .await?
        .map(|raw| decode(key, &raw))
        .transpose()
}

/// Encode and write a JSON value.
///
/// # Errors
///
/// Returns error if encoding or the backend fails.
pub async fn set_json<T: Serialize + Sync>(
    store: &dyn QuoteStore,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> Result<(), StoreError> {
    let raw = serde_json::to_string(value).map_err(|e| StoreError::Encode {
        key: key.to_string(),
        message: e.to_string(),
    })?;
    store.set(key, raw, ttl).await
}

/// Decode one stored JSON value.
///
/// # Errors
///
/// Returns `StoreError::Decode` if the value does not decode.
pub fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Decode {
        key: key.to_string(),
        message: e.to_string(),
    })
}

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// Process-local store for the replay harness and tests.
#[derive(Debug, Default)]
pub struct InMemoryQuoteStore {
    values: RwLock<HashMap<String, Entry>>,
    lists: RwLock<HashMap<String, VecDeque<String>>>,
}

impl InMemoryQuoteStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push `value` onto the head of the list at `key`, keeping at most
    /// `max_len` elements.
    pub async fn push_front(&self, key: &str, value: String, max_len: usize) {
        let mut lists = self.lists.write().await;
        let list = lists.entry(key.to_string()).or_default();
        list.push_front(value);
        list.truncate(max_len);
    }
}

#[async_trait]
impl QuoteStore for InMemoryQuoteStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let values = self.values.read().await;
        Ok(values
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), StoreError> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.values
            .write()
            .await
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn list_range(
        &self,
        key: &str,
        start: isize,
        end: isize,
    ) -> Result<Vec<String>, StoreError> {
        let lists = self.lists.read().await;
        let Some(list) = lists.get(key) else {
            return Ok(Vec::new());
        };
        let len = list.len() as isize;
        let resolve = |i: isize| if i < 0 { len + i } else { i };
        let start = resolve(start).max(0);
        let end = resolve(end).min(len - 1);
        if start > end {
            return Ok(Vec::new());
        }
        Ok(list
            .range(start as usize..=end as usize)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(underlying_key("NSE@RELIANCE@OPT"), "underlying:NSE@RELIANCE@OPT");
        assert_eq!(underlying_history_key("X"), "underlying:history:X");
        assert_eq!(index_volatility_key("INDIAVIX"), "volatility:index:INDIAVIX");
        assert_eq!(greeks_key("K"), "greeks:K");
    }

    #[tokio::test]
    async fn test_get_set() {
        let store = InMemoryQuoteStore::new();
        assert_eq!(store.get("a").await.unwrap(), None);
        store.set("a", "1".to_string(), None).await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let store = InMemoryQuoteStore::new();
        store
            .set("a", "1".to_string(), Some(Duration::from_millis(10)))
            .await
            .unwrap();
        assert!(store.get("a").await.unwrap().is_some());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(store.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_range_newest_first() {
        let store = InMemoryQuoteStore::new();
        for v in ["1", "2", "3", "4"] {
            store.push_front("l", v.to_string(), 3).await;
        }
        assert_eq!(store.list_range("l", 0, -1).await.unwrap(), vec!["4", "3", "2"]);
        assert_eq!(store.list_range("l", 0, 0).await.unwrap(), vec!["4"]);
        assert_eq!(store.list_range("l", 1, 10).await.unwrap(), vec!["3", "2"]);
        assert_eq!(store.list_range("l", -1, -1).await.unwrap(), vec!["2"]);
        assert!(store.list_range("l", 5, 9).await.unwrap().is_empty());
        assert!(store.list_range("missing", 0, -1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_json_helpers() {
        let store = InMemoryQuoteStore::new();
        set_json(&store, "n", &vec![1, 2], None).await.unwrap();
        let value: Option<Vec<i32>> = get_json(&store, "n").await.unwrap();
        assert_eq!(value, Some(vec![1, 2]));

        store.set("bad", "{".to_string(), None).await.unwrap();
        let err = get_json::<Vec<i32>>(&store, "bad").await.unwrap_err();
        assert!(matches!(err, StoreError::Decode { .. }));
    }
}
