/**
 * Per-category rate limits learned from collector responses.
 *
 * The collector answers with a header such as
 *
 * ```text
 * x-sentry-rate-limits: 60:error;transaction:organization, 2700::project
 * ```
 *
 * Each comma-separated entry reads `<retry_after_seconds>:<categories>:<scope>[:...]`.
 * Categories are `;`-separated, and an empty category list means "every
 * category". For every category named, sending is disabled until
 * `now + retry_after`.
 *
 * `RateLimits` is an immutable snapshot. `update` returns a new table and
 * never touches the old one, so the transport can publish it with a single
 * pointer swap while concurrent sends keep reading their own snapshot.
 * Stale entries are never removed; expiry is decided at query time.
 */
use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use http::HeaderMap;

use crate::protocol::category::DataCategory;
use crate::protocol::constants::RATE_LIMITS_HEADER;

/// Mapping from category to the instant its sending window reopens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimits {
    disabled_until: HashMap<DataCategory, DateTime<Utc>>,
}

impl RateLimits {
    /// Creates an empty table: nothing is limited.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of categories with a recorded limit, expired or not.
    pub fn len(&self) -> usize {
        self.disabled_until.len()
    }

    pub fn is_empty(&self) -> bool {
        self.disabled_until.is_empty()
    }

    /// Raw entry recorded for exactly `category`, ignoring the wildcard.
    pub fn get(&self, category: DataCategory) -> Option<DateTime<Utc>> {
        self.disabled_until.get(&category).copied()
    }

    /// When sending `category` becomes possible again.
    ///
    /// Takes the later of the category's own entry and the wildcard entry.
    pub fn disabled_until(&self, category: DataCategory) -> Option<DateTime<Utc>> {
        let own = self.get(category);
        let all = self.get(DataCategory::All);
        own.max(all)
    }

    /// Whether `category` is limited at `now`.
    pub fn is_rate_limited(&self, category: DataCategory, now: DateTime<Utc>) -> bool {
        self.disabled_until(category).is_some_and(|until| until > now)
    }

    /// Human readable explanation of the limit on `category`.
    ///
    /// Diagnostics only. When nothing is recorded the timestamp shown is `now`.
    pub fn reason_for(&self, category: DataCategory, now: DateTime<Utc>) -> String {
        let until = self.disabled_until(category).unwrap_or(now);
        format!(
            "Too many {category} requests, backing off until: {}",
            until.to_rfc3339_opts(SecondsFormat::Millis, true)
        )
    }

    /**
     * Returns a new table with the directives from `headers` applied.
     *
     * Reads the rate-limit header; if it is absent or not valid UTF-8 the
     * result equals `self`.
     */
    pub fn update(&self, headers: &HeaderMap, now: DateTime<Utc>) -> RateLimits {
        match headers.get(RATE_LIMITS_HEADER).and_then(|v| v.to_str().ok()) {
            Some(value) => self.update_with(value, now),
            None => self.clone(),
        }
    }

    /**
     * Returns a new table with the directives in `header_value` applied.
     *
     * Entries are independent: one malformed entry is skipped without
     * affecting the others. New values always overwrite old ones for the
     * same category, even when they expire sooner.
     */
    pub fn update_with(&self, header_value: &str, now: DateTime<Utc>) -> RateLimits {
        let mut next = self.clone();

        for entry in header_value.split(',') {
            let mut fields = entry.trim().split(':');

            let Some(until) = fields.next().and_then(|raw| expiry(raw, now)) else {
                continue;
            };

            // A missing categories field is the wildcard, same as an empty one.
            let categories = fields.next().unwrap_or("");

            for token in categories.split(';') {
                if let Some(category) = DataCategory::from_rate_limit_token(token) {
                    next.disabled_until.insert(category, until);
                }
            }
        }

        next
    }
}

/// Parses a retry-after field into an absolute expiry.
fn expiry(raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let seconds: f64 = raw.trim().parse().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }

    let millis = (seconds * 1000.0).round();
    if millis > i64::MAX as f64 {
        return None;
    }

    now.checked_add_signed(TimeDelta::try_milliseconds(millis as i64)?)
}
