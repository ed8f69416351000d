//! Opening-hours and shift predicates.
//!
//! Restaurants consult the predicate before accepting an order; the assignment
//! coordinator consults it before offering a courier. Time of day is derived
//! from the clock epoch, so simulation time 0 maps to `epoch_ms` in UTC.

use std::collections::HashMap;
use std::fmt;

use bevy_ecs::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::clock::{ClockTime, ONE_DAY_MS};
use crate::ecs::AgentId;

pub trait AvailabilityPolicy: Send + Sync {
    fn is_open(&self, agent: &AgentId, timestamp_ms: u64) -> bool;
}

/// Everybody works around the clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOpen;

impl AvailabilityPolicy for AlwaysOpen {
    fn is_open(&self, _agent: &AgentId, _timestamp_ms: u64) -> bool {
        true
    }
}

/// A daily `[open, close)` window. `close < open` wraps past midnight.
///
/// Serialized as `"HH:MM-HH:MM"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DailyWindow {
    pub open: ClockTime,
    pub close: ClockTime,
}

impl DailyWindow {
    pub fn new(open: ClockTime, close: ClockTime) -> Self {
        Self { open, close }
    }

    pub fn parse(text: &str) -> Option<Self> {
        let (open, close) = text.split_once('-')?;
        Some(Self::new(ClockTime::parse(open)?, ClockTime::parse(close)?))
    }

    pub fn contains(&self, time_of_day_ms: u64) -> bool {
        let (open, close) = (self.open.ms(), self.close.ms());
        if open <= close {
            open <= time_of_day_ms && time_of_day_ms < close
        } else {
            time_of_day_ms >= open || time_of_day_ms < close
        }
    }
}

impl TryFrom<String> for DailyWindow {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
            .ok_or_else(|| format!("invalid window `{value}`, expected HH:MM-HH:MM"))
    }
}

impl From<DailyWindow> for String {
    fn from(value: DailyWindow) -> Self {
        value.to_string()
    }
}

impl fmt::Display for DailyWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.open, self.close)
    }
}

/// Per-agent daily windows. Agents without an entry are always open.
#[derive(Debug, Clone, Default)]
pub struct OpeningHours {
    epoch_ms: i64,
    windows: HashMap<AgentId, Vec<DailyWindow>>,
}

impl OpeningHours {
    pub fn new(epoch_ms: i64) -> Self {
        Self {
            epoch_ms,
            windows: HashMap::new(),
        }
    }

    pub fn with_windows(mut self, agent: AgentId, windows: Vec<DailyWindow>) -> Self {
        self.set(agent, windows);
        self
    }

    pub fn set(&mut self, agent: AgentId, windows: Vec<DailyWindow>) {
        self.windows.insert(agent, windows);
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    fn time_of_day_ms(&self, timestamp_ms: u64) -> u64 {
        let real_ms = self.epoch_ms.saturating_add(timestamp_ms as i64);
        real_ms.rem_euclid(ONE_DAY_MS as i64) as u64
    }
}

impl AvailabilityPolicy for OpeningHours {
    fn is_open(&self, agent: &AgentId, timestamp_ms: u64) -> bool {
        let Some(windows) = self.windows.get(agent) else {
            return true;
        };
        let time_of_day = self.time_of_day_ms(timestamp_ms);
        windows.iter().any(|window| window.contains(time_of_day))
    }
}

/// ECS resource wrapping a boxed availability predicate.
#[derive(Resource)]
pub struct AvailabilityResource(pub Box<dyn AvailabilityPolicy>);

impl AvailabilityResource {
    pub fn new(policy: Box<dyn AvailabilityPolicy>) -> Self {
        Self(policy)
    }
}

impl std::ops::Deref for AvailabilityResource {
    type Target = dyn AvailabilityPolicy;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ONE_MIN_MS;
    use crate::ecs::RestaurantId;

    #[test]
    fn window_contains_half_open_range() {
        let lunch = DailyWindow::parse("11:00-14:30").expect("window");
        assert!(lunch.contains(ClockTime::from_hm(11, 0).ms()));
        assert!(lunch.contains(ClockTime::from_hm(14, 29).ms()));
        assert!(!lunch.contains(ClockTime::from_hm(14, 30).ms()));
        assert!(!lunch.contains(ClockTime::from_hm(10, 59).ms()));
    }

    #[test]
    fn overnight_window_wraps() {
        let late = DailyWindow::parse("22:00-02:00").expect("window");
        assert!(late.contains(ClockTime::from_hm(23, 15).ms()));
        assert!(late.contains(ClockTime::from_hm(1, 0).ms()));
        assert!(!late.contains(ClockTime::from_hm(12, 0).ms()));
    }

    #[test]
    fn opening_hours_use_the_epoch_time_of_day() {
        // Epoch at 06:00 UTC: simulation time 5h is 11:00.
        let epoch = 6 * 60 * ONE_MIN_MS as i64;
        let agent = AgentId::Restaurant(RestaurantId(1));
        let hours = OpeningHours::new(epoch).with_windows(
            agent.clone(),
            vec![DailyWindow::parse("11:00-14:00").expect("window")],
        );
        assert!(!hours.is_open(&agent, 4 * 60 * ONE_MIN_MS));
        assert!(hours.is_open(&agent, 5 * 60 * ONE_MIN_MS));
        assert!(hours.is_open(&AgentId::Restaurant(RestaurantId(2)), 0));
    }

    #[test]
    fn window_round_trips_through_json() {
        let window: DailyWindow = serde_json::from_str(r#""18:00-23:30""#).expect("parse");
        assert_eq!(window, DailyWindow::parse("18:00-23:30").expect("window"));
        assert_eq!(serde_json::to_string(&window).expect("json"), r#""18:00-23:30""#);
    }
}
