//! Slice orchestration: one symbol, 24 monthly requests, one ordered result.

use super::fetcher::{PendingFetch, RateLimitedFetcher};
use super::provider::{DataError, RawSlice, SliceId, SLICE_COUNT};
use reqwest::Url;
use std::sync::Arc;
use tracing::debug;

/// Query endpoint of the extended intraday API.
#[derive(Debug, Clone)]
pub struct AlphaVantageEndpoint {
    base_url: String,
    api_key: String,
}

impl AlphaVantageEndpoint {
    pub const FUNCTION: &'static str = "TIME_SERIES_INTRADAY_EXTENDED";
    pub const INTERVAL: &'static str = "1min";

    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, DataError> {
        let endpoint = Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
        };
        if endpoint.api_key.trim().is_empty() {
            return Err(DataError::InvalidRequest("API key is empty".into()));
        }
        Url::parse(&endpoint.base_url)
            .map_err(|e| DataError::InvalidRequest(format!("bad base URL {}: {e}", endpoint.base_url)))?;
        Ok(endpoint)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full request URL for one slice of one symbol.
    pub fn slice_url(&self, symbol: &str, slice: SliceId) -> Result<String, DataError> {
        let label = slice.label();
        let url = Url::parse_with_params(
            &self.base_url,
            &[
                ("function", Self::FUNCTION),
                ("symbol", symbol),
                ("interval", Self::INTERVAL),
                ("slice", label.as_str()),
                ("apikey", self.api_key.as_str()),
            ],
        )
        .map_err(|e| DataError::InvalidRequest(format!("bad base URL {}: {e}", self.base_url)))?;
        Ok(url.into())
    }
}

/// Exactly one raw payload per slice, in index order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceSet {
    slices: Vec<RawSlice>,
}

impl SliceSet {
    /// Assemble from payloads in any order.
    ///
    /// Fails unless every slice index appears exactly once.
    pub fn from_unordered(slices: impl IntoIterator<Item = RawSlice>) -> Result<Self, DataError> {
        let mut slots: Vec<Option<RawSlice>> = (0..SLICE_COUNT).map(|_| None).collect();
        for slice in slices {
            let slot = &mut slots[slice.id.index()];
            if slot.is_some() {
                return Err(DataError::InvalidRequest(format!("slice {} delivered twice", slice.id)));
            }
            *slot = Some(slice);
        }

        let mut ordered = Vec::with_capacity(SLICE_COUNT);
        for (index, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(slice) => ordered.push(slice),
                None => {
                    let missing = SliceId::from_index(index)
                        .map(|id| id.label())
                        .unwrap_or_else(|| index.to_string());
                    return Err(DataError::InvalidRequest(format!("slice {missing} missing")));
                }
            }
        }
        Ok(Self { slices: ordered })
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    pub fn get(&self, id: SliceId) -> &RawSlice {
        &self.slices[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &RawSlice> {
        self.slices.iter()
    }

    pub fn total_bytes(&self) -> usize {
        self.slices.iter().map(|s| s.body.len()).sum()
    }

    pub fn into_inner(self) -> Vec<RawSlice> {
        self.slices
    }
}

impl IntoIterator for SliceSet {
    type Item = RawSlice;
    type IntoIter = std::vec::IntoIter<RawSlice>;

    fn into_iter(self) -> Self::IntoIter {
        self.slices.into_iter()
    }
}

/// Issues the 24 slice requests for a symbol through a shared fetcher.
pub struct SliceOrchestrator {
    fetcher: Arc<RateLimitedFetcher>,
    endpoint: AlphaVantageEndpoint,
}

impl SliceOrchestrator {
    pub fn new(fetcher: Arc<RateLimitedFetcher>, endpoint: AlphaVantageEndpoint) -> Self {
        Self { fetcher, endpoint }
    }

    pub fn fetcher(&self) -> &RateLimitedFetcher {
        &self.fetcher
    }

    pub fn endpoint(&self) -> &AlphaVantageEndpoint {
        &self.endpoint
    }

    /// Fetch every slice of `symbol`.
    ///
    /// All requests are queued up front; the fetcher's pool decides how many run
    /// at once. Returns the first error any slice resolves with.
    pub fn fetch_all_slices(&self, symbol: &str) -> Result<SliceSet, DataError> {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(DataError::InvalidRequest("empty symbol".into()));
        }

        let pending: Vec<(SliceId, PendingFetch)> = SliceId::all()
            .map(|id| {
                let url = self.endpoint.slice_url(symbol, id)?;
                Ok((id, self.fetcher.submit(url)?))
            })
            .collect::<Result<_, DataError>>()?;

        // An early return drops the handles still in `pending`, which withdraws
        // the symbol's remaining requests from the queue.
        let mut slices = Vec::with_capacity(SLICE_COUNT);
        for (id, request) in pending {
            let body = request.wait()?;
            debug!(symbol, slice = %id, bytes = body.len(), "slice fetched");
            slices.push(RawSlice { id, body });
        }

        SliceSet::from_unordered(slices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> AlphaVantageEndpoint {
        AlphaVantageEndpoint::new("https://www.alphavantage.co/query", "demo").unwrap()
    }

    fn raw(index: usize) -> RawSlice {
        RawSlice {
            id: SliceId::from_index(index).unwrap(),
            body: format!("time\n{index}").into_bytes(),
        }
    }

    #[test]
    fn slice_url_carries_all_parameters() {
        let url = endpoint()
            .slice_url("IBM", SliceId::new(2, 7).unwrap())
            .unwrap();
        assert!(url.starts_with("https://www.alphavantage.co/query?"));
        assert!(url.contains("function=TIME_SERIES_INTRADAY_EXTENDED"));
        assert!(url.contains("symbol=IBM"));
        assert!(url.contains("interval=1min"));
        assert!(url.contains("slice=year2month7"));
        assert!(url.contains("apikey=demo"));
    }

    #[test]
    fn slice_url_encodes_symbol() {
        let url = endpoint()
            .slice_url("BRK B&X", SliceId::new(1, 1).unwrap())
            .unwrap();
        assert!(url.contains("symbol=BRK+B%26X"), "{url}");
    }

    #[test]
    fn endpoint_rejects_bad_inputs() {
        assert!(AlphaVantageEndpoint::new("not a url", "demo").is_err());
        assert!(AlphaVantageEndpoint::new("https://h/query", " ").is_err());
    }

    #[test]
    fn slice_set_orders_by_index() {
        let set = SliceSet::from_unordered((0..SLICE_COUNT).rev().map(raw)).unwrap();
        assert_eq!(set.len(), SLICE_COUNT);
        for (i, slice) in set.iter().enumerate() {
            assert_eq!(slice.id.index(), i);
        }
        assert_eq!(set.get(SliceId::new(2, 12).unwrap()).body, b"time\n23");
    }

    #[test]
    fn slice_set_rejects_missing_and_duplicate() {
        let missing = SliceSet::from_unordered((1..SLICE_COUNT).map(raw)).unwrap_err();
        assert!(missing.to_string().contains("year1month1"));

        let dup = SliceSet::from_unordered((0..SLICE_COUNT).map(raw).chain([raw(5)])).unwrap_err();
        assert!(dup.to_string().contains("twice"));
    }
}
