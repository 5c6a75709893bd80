//! Scalar value providers for synthesized rows.
//!
//! `FakeProvider` is the default: words and sentences from the `fake` crate,
//! numbers and identifiers from a seedable `StdRng`.

use chrono::{SecondsFormat, TimeDelta, Utc};
use fake::faker::lorem::en::{Sentence, Word};
use fake::Fake;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;

/// Timestamps are drawn from this many seconds before now (30 days)
pub const RECENT_WINDOW_SECS: i64 = 30 * 24 * 60 * 60;

/// Source of raw scalar values
pub trait ValueProvider {
    fn string(&mut self) -> String;
    fn uuid(&mut self) -> String;
    /// A timestamp in the recent past, RFC 3339 in UTC
    fn recent_timestamp(&mut self) -> String;
    fn integer(&mut self) -> i64;
    fn number(&mut self) -> f64;
    fn boolean(&mut self) -> bool;
    /// One member of `values`, uniformly. `None` for an empty slice.
    fn pick_one_of(&mut self, values: &[Value]) -> Option<Value>;
}

/// Fake-data provider backed by the `fake` crate
pub struct FakeProvider {
    rng: StdRng,
}

impl FakeProvider {
    /// Provider with a fixed seed; the same seed yields the same value stream
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Provider seeded from the operating system
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_entropy(),
        }
    }
}

impl ValueProvider for FakeProvider {
    fn string(&mut self) -> String {
        if self.rng.random_bool(0.5) {
            Word().fake_with_rng(&mut self.rng)
        } else {
            Sentence(2..6).fake_with_rng(&mut self.rng)
        }
    }

    fn uuid(&mut self) -> String {
        format!(
            "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
            self.rng.random::<u32>(),
            self.rng.random::<u16>(),
            (self.rng.random::<u16>() & 0x0FFF) | 0x4000, // Version 4
            (self.rng.random::<u16>() & 0x3FFF) | 0x8000, // Variant
            self.rng.random::<u64>() & 0xFFFF_FFFF_FFFF_u64
        )
    }

    fn recent_timestamp(&mut self) -> String {
        let back = self.rng.random_range(0..RECENT_WINDOW_SECS);
        (Utc::now() - TimeDelta::seconds(back)).to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    fn integer(&mut self) -> i64 {
        self.rng.random_range(1..100_000)
    }

    fn number(&mut self) -> f64 {
        let value: f64 = self.rng.random_range(0.0..10_000.0);
        (value * 100.0).round() / 100.0
    }

    fn boolean(&mut self) -> bool {
        self.rng.random_bool(0.5)
    }

    fn pick_one_of(&mut self, values: &[Value]) -> Option<Value> {
        if values.is_empty() {
            return None;
        }
        Some(values[self.rng.random_range(0..values.len())].clone())
    }
}
