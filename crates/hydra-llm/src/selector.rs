//! Model Selector
//!
//! Picks the best eligible model for a request. Candidates must match the
//! requested size class, accept the request length, and be within quota.
//! Ranking: lowest priority number first, then least-recently-used, then -
//! when both sides have been idle for over an hour - the smaller
//! `max_request_length`, which conserves high-capacity models for requests
//! that need them.
//!
//! Selection never charges; the dispatcher charges at the moment the
//! outbound call is launched.

use std::cmp::Ordering;
use std::time::Instant;

use crate::catalog::{Catalog, Model, SizeClass};
use crate::limits::{RateLimitStore, HOUR};

struct Candidate<'a> {
    model: &'a Model,
    last_request: Instant,
}

/// Select the best eligible model, or `None` when nothing can take the
/// request. Deterministic for a frozen store: equal candidates resolve in
/// configuration order.
pub async fn select<'a>(
    catalog: &'a Catalog,
    limits: &RateLimitStore,
    size_class: SizeClass,
    request_length: usize,
    now: Instant,
) -> Option<&'a Model> {
    let mut candidates = Vec::new();

    for model in catalog.iter() {
        if model.size_class != size_class || request_length > model.max_request_length {
            continue;
        }
        let probe = limits.probe(model, now).await;
        if !probe.eligible {
            continue;
        }
        candidates.push(Candidate {
            model,
            last_request: probe.last_request,
        });
    }

    candidates
        .into_iter()
        .min_by(|a, b| rank(a, b, now))
        .map(|c| c.model)
}

fn rank(a: &Candidate<'_>, b: &Candidate<'_>, now: Instant) -> Ordering {
    a.model
        .priority
        .cmp(&b.model.priority)
        .then_with(|| a.last_request.cmp(&b.last_request))
        .then_with(|| {
            // Only reached when both sides share the same last_request.
            let idle = now.saturating_duration_since(a.last_request);
            if idle > HOUR {
                a.model.max_request_length.cmp(&b.model.max_request_length)
            } else {
                Ordering::Equal
            }
        })
}
