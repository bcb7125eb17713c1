//! Rate-Limit Store
//!
//! Per-model request counters over minute/hour/day windows plus the
//! last-request timestamp. Each entry sits behind its own lock; the map
//! itself is fixed at startup, so different models never contend.
//!
//! Every operation takes an explicit `now` so that window arithmetic is
//! testable without a clock. Callers pass `Instant::now()`; instants are
//! monotonic within the process, which is the only guarantee the store
//! relies on.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::catalog::{Catalog, Model};

pub(crate) const MINUTE: Duration = Duration::from_secs(60);
pub(crate) const HOUR: Duration = Duration::from_secs(60 * 60);
pub(crate) const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Mutable counter state for one model.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    pub minute_count: u32,
    pub hour_count: u32,
    pub day_count: u32,
    pub minute_window_start: Instant,
    pub hour_window_start: Instant,
    pub day_window_start: Instant,
    /// Timestamp of the most recent attempted dispatch
    pub last_request: Instant,
}

impl RateLimitState {
    fn new(now: Instant) -> Self {
        Self {
            minute_count: 0,
            hour_count: 0,
            day_count: 0,
            minute_window_start: now,
            hour_window_start: now,
            day_window_start: now,
            last_request: now,
        }
    }

    /// Roll over any window that has fully elapsed. Idempotent under the
    /// same `now`.
    fn observe(&mut self, now: Instant) {
        if now.saturating_duration_since(self.minute_window_start) >= MINUTE {
            self.minute_count = 0;
            self.minute_window_start = now;
        }
        if now.saturating_duration_since(self.hour_window_start) >= HOUR {
            self.hour_count = 0;
            self.hour_window_start = now;
        }
        if now.saturating_duration_since(self.day_window_start) >= DAY {
            self.day_count = 0;
            self.day_window_start = now;
        }
    }

    fn within_quota(&self, model: &Model) -> bool {
        self.minute_count < model.requests_per_minute
            && self.hour_count < model.requests_per_hour
            && self.day_count < model.requests_per_day
    }
}

/// Result of a single-lock eligibility probe.
#[derive(Debug, Clone, Copy)]
pub struct Probe {
    pub eligible: bool,
    pub last_request: Instant,
}

/// Per-model rate-limit accounting.
#[derive(Debug)]
pub struct RateLimitStore {
    entries: HashMap<String, Mutex<RateLimitState>>,
}

impl RateLimitStore {
    /// Build one entry per catalog model, all windows starting at `now`.
    #[must_use]
    pub fn new(catalog: &Catalog, now: Instant) -> Self {
        let entries = catalog
            .iter()
            .map(|m| (m.name.clone(), Mutex::new(RateLimitState::new(now))))
            .collect();
        Self { entries }
    }

    /// Observe window rollovers, then report eligibility together with the
    /// entry's last-request timestamp. The observe mutation happens even
    /// when no call follows.
    pub async fn probe(&self, model: &Model, now: Instant) -> Probe {
        let mut state = self.entry(&model.name).lock().await;
        state.observe(now);
        Probe {
            eligible: state.within_quota(model),
            last_request: state.last_request,
        }
    }

    /// Whether the model is currently within all three window quotas.
    pub async fn eligible(&self, model: &Model, now: Instant) -> bool {
        self.probe(model, now).await.eligible
    }

    /// Count an attempted dispatch: observe, bump all three counters, and
    /// move `last_request`. Called the moment an outbound call is launched,
    /// so failed calls still count.
    pub async fn charge(&self, model: &Model, now: Instant) {
        let mut state = self.entry(&model.name).lock().await;
        state.observe(now);
        state.minute_count += 1;
        state.hour_count += 1;
        state.day_count += 1;
        state.last_request = now;
    }

    /// Take the model out of rotation for the remainder of its minute
    /// window by force-setting the minute counter past its quota.
    pub async fn penalize(&self, model: &Model, now: Instant) {
        let mut state = self.entry(&model.name).lock().await;
        state.minute_count = model.requests_per_minute + 1;
        state.minute_window_start = now;
    }

    /// Snapshot an entry's state, for diagnostics and tests.
    pub async fn snapshot(&self, name: &str) -> Option<RateLimitState> {
        match self.entries.get(name) {
            Some(entry) => Some(entry.lock().await.clone()),
            None => None,
        }
    }

    fn entry(&self, name: &str) -> &Mutex<RateLimitState> {
        // The catalog and the store are built from the same model list, so
        // every dispatched model has an entry.
        self.entries
            .get(name)
            .unwrap_or_else(|| panic!("rate-limit entry missing for model {name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{tests::model, Catalog, Model};

    fn store_for(models: &[Model], now: Instant) -> (Catalog, RateLimitStore) {
        let catalog = Catalog::new(models.to_vec()).unwrap();
        let store = RateLimitStore::new(&catalog, now);
        (catalog, store)
    }

    #[tokio::test]
    async fn test_charge_bumps_all_counters_and_last_request() {
        let t0 = Instant::now();
        let (catalog, store) = store_for(&[model("a/x", "a")], t0);
        let m = catalog.get("a/x").unwrap();

        let t1 = t0 + Duration::from_secs(5);
        store.charge(m, t1).await;

        let state = store.snapshot("a/x").await.unwrap();
        assert_eq!(state.minute_count, 1);
        assert_eq!(state.hour_count, 1);
        assert_eq!(state.day_count, 1);
        assert_eq!(state.last_request, t1);
    }

    #[tokio::test]
    async fn test_minute_window_resets_exactly_once_per_boundary() {
        let t0 = Instant::now();
        let mut m = model("a/x", "a");
        m.requests_per_minute = 1;
        let (catalog, store) = store_for(&[m], t0);
        let m = catalog.get("a/x").unwrap();

        store.charge(m, t0).await;
        assert!(!store.eligible(m, t0 + Duration::from_secs(30)).await);

        // One full minute past the window start: reset.
        assert!(store.eligible(m, t0 + Duration::from_secs(61)).await);
        let state = store.snapshot("a/x").await.unwrap();
        assert_eq!(state.minute_count, 0);

        // Observing again at the same instant must not re-reset or move the
        // window start a second time.
        let start_after_reset = state.minute_window_start;
        assert!(store.eligible(m, t0 + Duration::from_secs(61)).await);
        let state = store.snapshot("a/x").await.unwrap();
        assert_eq!(state.minute_window_start, start_after_reset);
    }

    #[tokio::test]
    async fn test_hour_window_enforced() {
        let t0 = Instant::now();
        let mut m = model("a/x", "a");
        m.requests_per_minute = 100;
        m.requests_per_hour = 2;
        let (catalog, store) = store_for(&[m], t0);
        let m = catalog.get("a/x").unwrap();

        store.charge(m, t0).await;
        store.charge(m, t0 + Duration::from_secs(61)).await;
        // Minute window rolled, hour quota exhausted.
        assert!(!store.eligible(m, t0 + Duration::from_secs(122)).await);
        assert!(store.eligible(m, t0 + Duration::from_secs(3601)).await);
    }

    #[tokio::test]
    async fn test_day_window_enforced() {
        let t0 = Instant::now();
        let mut m = model("a/x", "a");
        m.requests_per_hour = 100;
        m.requests_per_day = 1;
        let (catalog, store) = store_for(&[m], t0);
        let m = catalog.get("a/x").unwrap();

        store.charge(m, t0).await;
        assert!(!store.eligible(m, t0 + Duration::from_secs(3601)).await);
        assert!(store.eligible(m, t0 + Duration::from_secs(86_401)).await);
    }

    #[tokio::test]
    async fn test_zero_minute_quota_never_eligible() {
        let t0 = Instant::now();
        let mut m = model("a/x", "a");
        m.requests_per_minute = 0;
        let (catalog, store) = store_for(&[m], t0);
        let m = catalog.get("a/x").unwrap();

        assert!(!store.eligible(m, t0).await);
        assert!(!store.eligible(m, t0 + Duration::from_secs(3600)).await);
    }

    #[tokio::test]
    async fn test_penalize_blocks_until_minute_rolls() {
        let t0 = Instant::now();
        let mut m = model("a/x", "a");
        m.requests_per_minute = 10;
        let (catalog, store) = store_for(&[m], t0);
        let m = catalog.get("a/x").unwrap();

        let t1 = t0 + Duration::from_secs(10);
        store.penalize(m, t1).await;

        let state = store.snapshot("a/x").await.unwrap();
        assert_eq!(state.minute_count, m.requests_per_minute + 1);
        assert_eq!(state.minute_window_start, t1);

        assert!(!store.eligible(m, t1 + Duration::from_secs(59)).await);
        assert!(store.eligible(m, t1 + Duration::from_secs(60)).await);
    }

    #[tokio::test]
    async fn test_probe_observes_even_without_charge() {
        let t0 = Instant::now();
        let mut m = model("a/x", "a");
        m.requests_per_minute = 1;
        let (catalog, store) = store_for(&[m], t0);
        let m = catalog.get("a/x").unwrap();

        store.charge(m, t0).await;
        // A pure eligibility check past the boundary must reset the counter.
        let probe = store.probe(m, t0 + Duration::from_secs(60)).await;
        assert!(probe.eligible);
        let state = store.snapshot("a/x").await.unwrap();
        assert_eq!(state.minute_count, 0);
    }

    #[tokio::test]
    async fn test_charge_on_window_boundary_counts_in_new_window() {
        let t0 = Instant::now();
        let mut m = model("a/x", "a");
        m.requests_per_minute = 1;
        let (catalog, store) = store_for(&[m], t0);
        let m = catalog.get("a/x").unwrap();

        store.charge(m, t0).await;
        store.charge(m, t0 + Duration::from_secs(60)).await;
        let state = store.snapshot("a/x").await.unwrap();
        assert_eq!(state.minute_count, 1);
        assert_eq!(state.hour_count, 2);
    }
}
