//! Fabricated user-activity records and the weighted event catalog.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::clock::SimClock;
use crate::ident::{IDENT_LEN, random_ident};

/// Fabricated user profile. Part of the domain vocabulary; nothing produces
/// these at runtime yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyntheticUser {
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "UUID")]
    pub uuid: String,
    #[serde(rename = "Created")]
    pub created: DateTime<Utc>,
    #[serde(rename = "LastLogin")]
    pub last_login: DateTime<Utc>,
    #[serde(rename = "Updated")]
    pub updated: DateTime<Utc>,
    #[serde(rename = "Gender")]
    pub gender: i32,
    #[serde(rename = "Locale")]
    pub locale: String,
    #[serde(rename = "Likes")]
    pub likes: i64,
}

/// One fabricated event. Field names are the wire contract with consumers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyntheticEvent {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "UUID")]
    pub uuid: String,
    #[serde(rename = "UserUUID")]
    pub user_uuid: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: i64,
    #[serde(rename = "Metadata")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// Event types and their relative weights (13 slots in total).
pub const DEFAULT_CATALOG: &[(&str, u32)] = &[
    ("play_song", 3),
    ("pause_song", 2),
    ("stop_song", 2),
    ("like_song", 3),
    ("update_prefs", 1),
    ("login", 1),
    ("dance", 1),
];

/// Weighted table of event names sampled by cumulative-weight draw.
#[derive(Debug, Clone)]
pub struct EventCatalog {
    entries: Vec<(&'static str, u32)>,
    total_weight: u32,
}

impl EventCatalog {
    /// Build a catalog from `(name, weight)` pairs. Zero-weight entries are
    /// never drawn. Returns `None` when the total weight is zero.
    pub fn new(entries: &[(&'static str, u32)]) -> Option<Self> {
        let total_weight: u32 = entries.iter().map(|(_, w)| *w).sum();
        if total_weight == 0 {
            return None;
        }
        Some(Self {
            entries: entries.to_vec(),
            total_weight,
        })
    }

    pub fn total_weight(&self) -> u32 {
        self.total_weight
    }

    pub fn weight_of(&self, name: &str) -> u32 {
        self.entries
            .iter()
            .filter(|(n, _)| *n == name)
            .map(|(_, w)| *w)
            .sum()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(n, _)| *n)
    }

    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> &'static str {
        let mut point = rng.random_range(0..self.total_weight);
        self.entries
            .iter()
            .find(|(_, weight)| {
                let hit = point < *weight;
                point = point.saturating_sub(*weight);
                hit
            })
            .or(self.entries.last())
            .map_or("", |(name, _)| *name)
    }
}

impl Default for EventCatalog {
    fn default() -> Self {
        Self {
            entries: DEFAULT_CATALOG.to_vec(),
            total_weight: DEFAULT_CATALOG.iter().map(|(_, w)| *w).sum(),
        }
    }
}

/// Builds [`SyntheticEvent`]s stamped with the simulated clock.
#[derive(Debug, Clone)]
pub struct EventSynthesizer {
    catalog: EventCatalog,
    clock: SimClock,
}

impl EventSynthesizer {
    pub fn new(catalog: EventCatalog, clock: SimClock) -> Self {
        Self { catalog, clock }
    }

    pub fn synthesize<R: Rng + ?Sized>(&self, rng: &mut R) -> SyntheticEvent {
        SyntheticEvent {
            name: self.catalog.pick(rng).to_string(),
            uuid: random_ident(rng, IDENT_LEN),
            user_uuid: random_ident(rng, IDENT_LEN),
            timestamp: self.clock.now_unix(),
            metadata: BTreeMap::new(),
        }
    }
}
