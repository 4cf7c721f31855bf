//! Time-of-day buckets from a client's preferred delivery time.

use ruta_core::EntityKey;
use ruta_index::ClientIndex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeSlot {
    /// Before 10:00.
    EarlyMorning,
    /// 10:00 to 11:59.
    Morning,
    /// 12:00 to 13:59.
    Lunch,
    /// 14:00 onwards.
    Afternoon,
}

impl TimeSlot {
    pub const ALL: [TimeSlot; 4] = [
        TimeSlot::EarlyMorning,
        TimeSlot::Morning,
        TimeSlot::Lunch,
        TimeSlot::Afternoon,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeSlot::EarlyMorning => "early-morning",
            TimeSlot::Morning => "morning",
            TimeSlot::Lunch => "lunch",
            TimeSlot::Afternoon => "afternoon",
        }
    }

    fn from_hour(hour: u32) -> Self {
        match hour {
            h if h < 10 => TimeSlot::EarlyMorning,
            h if h < 12 => TimeSlot::Morning,
            h if h < 14 => TimeSlot::Lunch,
            _ => TimeSlot::Afternoon,
        }
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeSlot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|slot| slot.as_str() == s.trim())
            .ok_or_else(|| format!("unknown time slot: {s}"))
    }
}

/// Minutes since midnight for an `HH:MM` string, if it parses to a real time.
pub(crate) fn minutes_of_day(preferred_time: &str) -> Option<u32> {
    let (hour, minute) = preferred_time.trim().split_once(':')?;
    let hour: u32 = hour.trim().parse().ok()?;
    let minute: u32 = minute.trim().parse().ok()?;
    (hour < 24 && minute < 60).then_some(hour * 60 + minute)
}

/// Bucket an `HH:MM` preferred time. Unparseable times have no slot.
pub fn time_slot(preferred_time: &str) -> Option<TimeSlot> {
    minutes_of_day(preferred_time).map(|minutes| TimeSlot::from_hour(minutes / 60))
}

pub(crate) fn build_time_slots(clients: &ClientIndex) -> BTreeMap<TimeSlot, BTreeSet<EntityKey>> {
    let mut slots: BTreeMap<TimeSlot, BTreeSet<EntityKey>> = BTreeMap::new();
    for client in clients.by_id.values() {
        let Some(preferred) = client.preferred_time.as_deref() else {
            continue;
        };
        match time_slot(preferred) {
            Some(slot) => {
                slots.entry(slot).or_default().insert(client.id.clone());
            }
            None => tracing::debug!(
                client_id = %client.id,
                preferred_time = preferred,
                "Unparseable preferred time, client left out of time slots"
            ),
        }
    }
    slots
}
