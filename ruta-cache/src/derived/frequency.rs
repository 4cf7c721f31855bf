//! Delivery-frequency classification.

use chrono::{Duration, NaiveDate};
use ruta_core::EntityKey;
use ruta_index::{ClientIndex, DeliveryIndex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Weeks in the observed delivery window (one month back).
const OBSERVED_WEEKS: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FrequencyCategory {
    VeryFrequent,
    Frequent,
    Regular,
    Occasional,
    Rare,
}

impl FrequencyCategory {
    pub const ALL: [FrequencyCategory; 5] = [
        FrequencyCategory::VeryFrequent,
        FrequencyCategory::Frequent,
        FrequencyCategory::Regular,
        FrequencyCategory::Occasional,
        FrequencyCategory::Rare,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FrequencyCategory::VeryFrequent => "very-frequent",
            FrequencyCategory::Frequent => "frequent",
            FrequencyCategory::Regular => "regular",
            FrequencyCategory::Occasional => "occasional",
            FrequencyCategory::Rare => "rare",
        }
    }
}

impl fmt::Display for FrequencyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FrequencyCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == s.trim())
            .ok_or_else(|| format!("unknown frequency category: {s}"))
    }
}

/// Classify a client by deliveries in the observed window.
///
/// Per-week rate is `count / 4`: at least 3 is very frequent, 2 frequent,
/// 1 regular; below that, two or more deliveries is occasional.
pub fn classify_frequency(delivery_count: usize) -> FrequencyCategory {
    let per_week = delivery_count as f64 / f64::from(OBSERVED_WEEKS);
    if per_week >= 3.0 {
        FrequencyCategory::VeryFrequent
    } else if per_week >= 2.0 {
        FrequencyCategory::Frequent
    } else if per_week >= 1.0 {
        FrequencyCategory::Regular
    } else if delivery_count >= 2 {
        FrequencyCategory::Occasional
    } else {
        FrequencyCategory::Rare
    }
}

/// Per-client delivery statistics behind the frequency category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrequencyProfile {
    pub delivery_count: usize,
    pub last_delivery: Option<NaiveDate>,
    pub category: FrequencyCategory,
}

pub(crate) struct FrequencyIndex {
    pub(crate) categories: BTreeMap<FrequencyCategory, BTreeSet<EntityKey>>,
    pub(crate) profiles: BTreeMap<EntityKey, FrequencyProfile>,
}

/// Per-client profiles and category sets.
///
/// Only deliveries inside the observed window count: the `OBSERVED_WEEKS`
/// ending at the newest dated delivery in the collection. Undated deliveries
/// are counted.
pub(crate) fn build_frequency(clients: &ClientIndex, deliveries: &DeliveryIndex) -> FrequencyIndex {
    let mut categories: BTreeMap<FrequencyCategory, BTreeSet<EntityKey>> = BTreeMap::new();
    let mut profiles = BTreeMap::new();
    let window_start = observed_window_start(deliveries);

    for client_id in clients.by_id.keys() {
        let owned = deliveries
            .by_client
            .get(client_id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let in_window = owned
            .iter()
            .filter(|d| match (d.date, window_start) {
                (Some(date), Some(start)) => date >= start,
                _ => true,
            })
            .count();
        let profile = FrequencyProfile {
            delivery_count: in_window,
            last_delivery: owned.iter().filter_map(|d| d.date).max(),
            category: classify_frequency(in_window),
        };
        categories
            .entry(profile.category)
            .or_default()
            .insert(client_id.clone());
        profiles.insert(client_id.clone(), profile);
    }

    FrequencyIndex {
        categories,
        profiles,
    }
}

/// First day of the observed window, or `None` when no delivery is dated.
fn observed_window_start(deliveries: &DeliveryIndex) -> Option<NaiveDate> {
    let newest = deliveries.by_id.values().filter_map(|d| d.date).max()?;
    let days = i64::from(OBSERVED_WEEKS) * 7 - 1;
    newest.checked_sub_signed(Duration::days(days))
}
