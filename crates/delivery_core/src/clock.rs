//! Simulation clock: the time-ordered event queue.
//!
//! Events are keyed by `(timestamp, seq)` where `seq` grows with every insertion,
//! so events scheduled for the same millisecond pop in the order they were scheduled.
//! Popping an event advances [SimulationClock::now] to its timestamp.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;

use bevy_ecs::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::ecs::{CourierId, CustomerId, RestaurantId};
use crate::error::ScheduleError;
use crate::model::{OrderId, RejectionReason, SessionId};

pub const ONE_SEC_MS: u64 = 1_000;
pub const ONE_MIN_MS: u64 = 60 * ONE_SEC_MS;
pub const ONE_HOUR_MS: u64 = 60 * ONE_MIN_MS;
pub const ONE_DAY_MS: u64 = 24 * ONE_HOUR_MS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum EventKind {
    SessionStart,
    SessionEnded,
    OrderPlaced,
    OrderRejected,
    OrderReady,
    AssignmentRetry,
    OrderAssigned,
    CourierArrived,
    OrderHandedOver,
    CourierArrivedAtCustomer,
    OrderDelivered,
}

impl EventKind {
    pub const ALL: [EventKind; 11] = [
        EventKind::SessionStart,
        EventKind::SessionEnded,
        EventKind::OrderPlaced,
        EventKind::OrderRejected,
        EventKind::OrderReady,
        EventKind::AssignmentRetry,
        EventKind::OrderAssigned,
        EventKind::CourierArrived,
        EventKind::OrderHandedOver,
        EventKind::CourierArrivedAtCustomer,
        EventKind::OrderDelivered,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EventKind::SessionStart => "SessionStart",
            EventKind::SessionEnded => "SessionEnded",
            EventKind::OrderPlaced => "OrderPlaced",
            EventKind::OrderRejected => "OrderRejected",
            EventKind::OrderReady => "OrderReady",
            EventKind::AssignmentRetry => "AssignmentRetry",
            EventKind::OrderAssigned => "OrderAssigned",
            EventKind::CourierArrived => "CourierArrived",
            EventKind::OrderHandedOver => "OrderHandedOver",
            EventKind::CourierArrivedAtCustomer => "CourierArrivedAtCustomer",
            EventKind::OrderDelivered => "OrderDelivered",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Typed payload of every event the kernel knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event")]
pub enum EventPayload {
    SessionStart {
        session: SessionId,
        customer: CustomerId,
        restaurant: RestaurantId,
    },
    SessionEnded {
        session: SessionId,
        customer: CustomerId,
        converted: bool,
    },
    OrderPlaced {
        order: OrderId,
        session: SessionId,
        customer: CustomerId,
        restaurant: RestaurantId,
        created_at: u64,
    },
    OrderRejected {
        order: OrderId,
        restaurant: RestaurantId,
        reason: RejectionReason,
    },
    OrderReady {
        order: OrderId,
        restaurant: RestaurantId,
    },
    /// Another attempt to find a courier for an order nobody could take.
    AssignmentRetry {
        order: OrderId,
        restaurant: RestaurantId,
        attempt: u32,
    },
    OrderAssigned {
        order: OrderId,
        courier: CourierId,
        restaurant: RestaurantId,
    },
    CourierArrived {
        order: OrderId,
        courier: CourierId,
        restaurant: RestaurantId,
    },
    OrderHandedOver {
        order: OrderId,
        courier: CourierId,
        restaurant: RestaurantId,
        customer: CustomerId,
    },
    CourierArrivedAtCustomer {
        order: OrderId,
        courier: CourierId,
        customer: CustomerId,
    },
    OrderDelivered {
        order: OrderId,
        courier: CourierId,
        customer: CustomerId,
        created_at: u64,
        delivered_at: u64,
    },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::SessionStart { .. } => EventKind::SessionStart,
            EventPayload::SessionEnded { .. } => EventKind::SessionEnded,
            EventPayload::OrderPlaced { .. } => EventKind::OrderPlaced,
            EventPayload::OrderRejected { .. } => EventKind::OrderRejected,
            EventPayload::OrderReady { .. } => EventKind::OrderReady,
            EventPayload::AssignmentRetry { .. } => EventKind::AssignmentRetry,
            EventPayload::OrderAssigned { .. } => EventKind::OrderAssigned,
            EventPayload::CourierArrived { .. } => EventKind::CourierArrived,
            EventPayload::OrderHandedOver { .. } => EventKind::OrderHandedOver,
            EventPayload::CourierArrivedAtCustomer { .. } => EventKind::CourierArrivedAtCustomer,
            EventPayload::OrderDelivered { .. } => EventKind::OrderDelivered,
        }
    }

    /// The order this event concerns, if any.
    pub fn order(&self) -> Option<OrderId> {
        match *self {
            EventPayload::SessionStart { .. } | EventPayload::SessionEnded { .. } => None,
            EventPayload::OrderPlaced { order, .. }
            | EventPayload::OrderRejected { order, .. }
            | EventPayload::OrderReady { order, .. }
            | EventPayload::AssignmentRetry { order, .. }
            | EventPayload::OrderAssigned { order, .. }
            | EventPayload::CourierArrived { order, .. }
            | EventPayload::OrderHandedOver { order, .. }
            | EventPayload::CourierArrivedAtCustomer { order, .. }
            | EventPayload::OrderDelivered { order, .. } => Some(order),
        }
    }
}

/// Insertion sequence number; doubles as the FIFO tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: u64,
    pub payload: EventPayload,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}

/// Heap entry. Reverse ordering turns the max-heap into a min-heap on `(timestamp, seq)`.
#[derive(Debug)]
struct Queued(Event);

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.0.timestamp == other.0.timestamp && self.0.id == other.0.id
    }
}

impl Eq for Queued {}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .0
            .timestamp
            .cmp(&self.0.timestamp)
            .then_with(|| other.0.id.cmp(&self.0.id))
    }
}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default, Resource)]
pub struct SimulationClock {
    now: u64,
    /// Real-world time (ms since Unix epoch) that corresponds to simulation time 0.
    epoch_ms: i64,
    next_seq: u64,
    events: BinaryHeap<Queued>,
}

impl SimulationClock {
    pub fn with_epoch(epoch_ms: i64) -> Self {
        Self {
            epoch_ms,
            ..Default::default()
        }
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn epoch_ms(&self) -> i64 {
        self.epoch_ms
    }

    pub fn schedule_at(
        &mut self,
        timestamp: u64,
        payload: EventPayload,
    ) -> Result<EventId, ScheduleError> {
        if timestamp < self.now {
            return Err(ScheduleError::InThePast {
                timestamp,
                now: self.now,
            });
        }
        let id = EventId(self.next_seq);
        self.next_seq += 1;
        self.events.push(Queued(Event {
            id,
            timestamp,
            payload,
        }));
        Ok(id)
    }

    pub fn schedule_in(
        &mut self,
        delay_ms: u64,
        payload: EventPayload,
    ) -> Result<EventId, ScheduleError> {
        let timestamp = self
            .now
            .checked_add(delay_ms)
            .ok_or(ScheduleError::Overflow {
                now: self.now,
                delay_ms,
            })?;
        self.schedule_at(timestamp, payload)
    }

    pub fn schedule_in_secs(
        &mut self,
        delay_secs: u64,
        payload: EventPayload,
    ) -> Result<EventId, ScheduleError> {
        self.schedule_in(delay_secs.saturating_mul(ONE_SEC_MS), payload)
    }

    /// Schedules at a real-world time; fails if that time lies before the simulation start.
    pub fn schedule_at_real(
        &mut self,
        real_ms: i64,
        payload: EventPayload,
    ) -> Result<EventId, ScheduleError> {
        let timestamp = self
            .real_to_sim_ms(real_ms)
            .ok_or(ScheduleError::BeforeStart {
                real_ms,
                epoch_ms: self.epoch_ms,
            })?;
        self.schedule_at(timestamp, payload)
    }

    pub fn pop_next(&mut self) -> Option<Event> {
        let Queued(event) = self.events.pop()?;
        self.now = event.timestamp;
        Some(event)
    }

    pub fn next_event_time(&self) -> Option<u64> {
        self.events.peek().map(|queued| queued.0.timestamp)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Total number of events ever scheduled on this clock.
    pub fn scheduled_total(&self) -> u64 {
        self.next_seq
    }

    pub fn sim_to_real_ms(&self, sim_ms: u64) -> i64 {
        self.epoch_ms.saturating_add(sim_ms as i64)
    }

    pub fn real_to_sim_ms(&self, real_ms: i64) -> Option<u64> {
        real_ms
            .checked_sub(self.epoch_ms)
            .and_then(|delta| u64::try_from(delta).ok())
    }
}

/// The event currently being dispatched. Handlers read it; only the environment writes it.
#[derive(Debug, Clone, Copy, Resource)]
pub struct CurrentEvent(pub Event);

/// Wall-clock time of day, stored as milliseconds after midnight.
///
/// Serialized as `"HH:MM"` or `"HH:MM:SS"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime(u64);

impl ClockTime {
    pub fn from_hm(hours: u64, minutes: u64) -> Self {
        Self(hours * ONE_HOUR_MS + minutes * ONE_MIN_MS)
    }

    pub fn from_ms(ms: u64) -> Self {
        Self(ms)
    }

    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.trim().split(':');
        let hours: u64 = parts.next()?.parse().ok()?;
        let minutes: u64 = parts.next()?.parse().ok()?;
        let seconds: u64 = match parts.next() {
            Some(part) => part.parse().ok()?,
            None => 0,
        };
        if parts.next().is_some() || hours > 24 || minutes > 59 || seconds > 59 {
            return None;
        }
        let ms = hours * ONE_HOUR_MS + minutes * ONE_MIN_MS + seconds * ONE_SEC_MS;
        (ms <= ONE_DAY_MS).then_some(Self(ms))
    }

    pub fn ms(self) -> u64 {
        self.0
    }

    pub fn minute_of_day(self) -> u32 {
        (self.0 / ONE_MIN_MS) as u32
    }
}

impl TryFrom<String> for ClockTime {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid clock time `{value}`, expected HH:MM"))
    }
}

impl From<ClockTime> for String {
    fn from(value: ClockTime) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hours = self.0 / ONE_HOUR_MS;
        let minutes = (self.0 % ONE_HOUR_MS) / ONE_MIN_MS;
        let seconds = (self.0 % ONE_MIN_MS) / ONE_SEC_MS;
        if seconds == 0 {
            write!(f, "{hours:02}:{minutes:02}")
        } else {
            write!(f, "{hours:02}:{minutes:02}:{seconds:02}")
        }
    }
}
