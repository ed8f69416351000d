//! Metrics: read-only observers on the bus.
//!
//! Every metric is wrapped in a [MetricsObserver] agent. Its handler sees only
//! the event being dispatched and its own [MetricSlot]; nothing else in the
//! world is reachable from it. [crate::environment::Environment::get_results]
//! gathers the values into a [SimResults] snapshot.

use std::collections::{BTreeMap, HashMap};

use bevy_ecs::prelude::{Component, Entity, In, Query, Res};
use serde::{Deserialize, Serialize};

use crate::clock::{CurrentEvent, Event, EventKind, EventPayload};
use crate::ecs::AgentId;
use crate::environment::{Agent, RunStatus, Subscriptions};
use crate::error::{HandlerError, HandlerResult};
use crate::model::OrderId;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    /// Mean duration in milliseconds; `None` until the first sample.
    DurationMs(Option<f64>),
    Count(u64),
    Ratio(Option<f64>),
    /// Total with a per-key breakdown.
    Tally {
        total: u64,
        by_key: BTreeMap<String, u64>,
    },
}

impl MetricValue {
    /// Numeric reading, if there is one. Tallies report their total.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::DurationMs(value) | MetricValue::Ratio(value) => *value,
            MetricValue::Count(count) => Some(*count as f64),
            MetricValue::Tally { total, .. } => Some(*total as f64),
        }
    }
}

pub trait Metric: Send + Sync {
    fn name(&self) -> &'static str;

    /// Event kinds this metric subscribes to.
    fn observes(&self) -> &'static [EventKind];

    fn observe(&mut self, event: &Event);

    fn value(&self) -> MetricValue;
}

#[derive(Debug, Clone, Copy, Default)]
struct Mean {
    sum: f64,
    samples: u64,
}

impl Mean {
    fn push(&mut self, sample: f64) {
        self.sum += sample;
        self.samples += 1;
    }

    fn get(&self) -> Option<f64> {
        (self.samples > 0).then(|| self.sum / self.samples as f64)
    }
}

/// Mean of `delivered_at - created_at` over delivered orders.
#[derive(Debug, Default)]
pub struct DeliveryTime {
    mean: Mean,
}

impl Metric for DeliveryTime {
    fn name(&self) -> &'static str {
        "DeliveryTime"
    }

    fn observes(&self) -> &'static [EventKind] {
        &[EventKind::OrderDelivered]
    }

    fn observe(&mut self, event: &Event) {
        if let EventPayload::OrderDelivered {
            created_at,
            delivered_at,
            ..
        } = event.payload
        {
            self.mean.push(delivered_at.saturating_sub(created_at) as f64);
        }
    }

    fn value(&self) -> MetricValue {
        MetricValue::DurationMs(self.mean.get())
    }
}

/// Counts events of one kind.
#[derive(Debug)]
pub struct EventCounter {
    name: &'static str,
    kinds: &'static [EventKind],
    count: u64,
}

impl EventCounter {
    pub fn orders_delivered() -> Self {
        Self {
            name: "NumberOfOrdersDelivered",
            kinds: &[EventKind::OrderDelivered],
            count: 0,
        }
    }

    pub fn orders_placed() -> Self {
        Self {
            name: "NumberOfOrdersPlaced",
            kinds: &[EventKind::OrderPlaced],
            count: 0,
        }
    }
}

impl Metric for EventCounter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn observes(&self) -> &'static [EventKind] {
        self.kinds
    }

    fn observe(&mut self, event: &Event) {
        if self.kinds.contains(&event.kind()) {
            self.count += 1;
        }
    }

    fn value(&self) -> MetricValue {
        MetricValue::Count(self.count)
    }
}

/// Rejected orders, broken down by reason.
#[derive(Debug, Default)]
pub struct OrdersRejected {
    by_reason: BTreeMap<String, u64>,
}

impl Metric for OrdersRejected {
    fn name(&self) -> &'static str {
        "NumberOfOrdersRejected"
    }

    fn observes(&self) -> &'static [EventKind] {
        &[EventKind::OrderRejected]
    }

    fn observe(&mut self, event: &Event) {
        if let EventPayload::OrderRejected { reason, .. } = event.payload {
            *self
                .by_reason
                .entry(reason.as_str().to_string())
                .or_default() += 1;
        }
    }

    fn value(&self) -> MetricValue {
        MetricValue::Tally {
            total: self.by_reason.values().sum(),
            by_key: self.by_reason.clone(),
        }
    }
}

/// Orders placed per session started.
#[derive(Debug, Default)]
pub struct ConversionRate {
    sessions: u64,
    orders: u64,
}

impl Metric for ConversionRate {
    fn name(&self) -> &'static str {
        "ConversionRate"
    }

    fn observes(&self) -> &'static [EventKind] {
        &[EventKind::SessionStart, EventKind::OrderPlaced]
    }

    fn observe(&mut self, event: &Event) {
        match event.kind() {
            EventKind::SessionStart => self.sessions += 1,
            EventKind::OrderPlaced => self.orders += 1,
            _ => {}
        }
    }

    fn value(&self) -> MetricValue {
        MetricValue::Ratio((self.sessions > 0).then(|| self.orders as f64 / self.sessions as f64))
    }
}

/// Mean time an order sits ready before a courier takes it.
#[derive(Debug, Default)]
pub struct PickupWaitTime {
    ready_at: HashMap<OrderId, u64>,
    mean: Mean,
}

impl Metric for PickupWaitTime {
    fn name(&self) -> &'static str {
        "PickupWaitTime"
    }

    fn observes(&self) -> &'static [EventKind] {
        &[
            EventKind::OrderReady,
            EventKind::OrderHandedOver,
            EventKind::OrderRejected,
        ]
    }

    fn observe(&mut self, event: &Event) {
        match event.payload {
            EventPayload::OrderReady { order, .. } => {
                self.ready_at.insert(order, event.timestamp);
            }
            EventPayload::OrderRejected { order, .. } => {
                self.ready_at.remove(&order);
            }
            EventPayload::OrderHandedOver { order, .. } => {
                if let Some(ready) = self.ready_at.remove(&order) {
                    self.mean.push(event.timestamp.saturating_sub(ready) as f64);
                }
            }
            _ => {}
        }
    }

    fn value(&self) -> MetricValue {
        MetricValue::DurationMs(self.mean.get())
    }
}

/// Built-in metrics, by the name they report under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricKind {
    DeliveryTime,
    NumberOfOrdersDelivered,
    NumberOfOrdersPlaced,
    NumberOfOrdersRejected,
    ConversionRate,
    PickupWaitTime,
}

impl MetricKind {
    pub const ALL: [MetricKind; 6] = [
        MetricKind::DeliveryTime,
        MetricKind::NumberOfOrdersDelivered,
        MetricKind::NumberOfOrdersPlaced,
        MetricKind::NumberOfOrdersRejected,
        MetricKind::ConversionRate,
        MetricKind::PickupWaitTime,
    ];

    pub fn build(self) -> Box<dyn Metric> {
        match self {
            MetricKind::DeliveryTime => Box::<DeliveryTime>::default(),
            MetricKind::NumberOfOrdersDelivered => Box::new(EventCounter::orders_delivered()),
            MetricKind::NumberOfOrdersPlaced => Box::new(EventCounter::orders_placed()),
            MetricKind::NumberOfOrdersRejected => Box::<OrdersRejected>::default(),
            MetricKind::ConversionRate => Box::<ConversionRate>::default(),
            MetricKind::PickupWaitTime => Box::<PickupWaitTime>::default(),
        }
    }
}

/// Metric storage on an observer entity.
#[derive(Component)]
pub struct MetricSlot(pub Box<dyn Metric>);

impl MetricSlot {
    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    pub fn value(&self) -> MetricValue {
        self.0.value()
    }
}

pub struct MetricsObserver {
    metric: Box<dyn Metric>,
}

impl MetricsObserver {
    pub fn new(kind: MetricKind) -> Self {
        Self {
            metric: kind.build(),
        }
    }

    pub fn from_metric(metric: Box<dyn Metric>) -> Self {
        Self { metric }
    }
}

impl Agent for MetricsObserver {
    fn id(&self) -> AgentId {
        AgentId::Observer(self.metric.name().to_string())
    }

    fn subscribe(self, bus: &mut Subscriptions<'_>) {
        let kinds = self.metric.observes();
        bus.insert(MetricSlot(self.metric));
        for kind in kinds {
            bus.on(*kind, metric_observer_system);
        }
    }
}

pub fn metric_observer_system(
    In(entity): In<Entity>,
    event: Res<CurrentEvent>,
    mut slots: Query<&mut MetricSlot>,
) -> HandlerResult {
    let mut slot = slots
        .get_mut(entity)
        .map_err(|_| HandlerError::MissingState(entity))?;
    slot.0.observe(&event.0);
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricEntry {
    pub name: String,
    pub value: MetricValue,
}

/// Snapshot returned by `Environment::get_results`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimResults {
    pub status: RunStatus,
    /// `false` for mid-run, truncated or halted snapshots.
    pub complete: bool,
    pub simulated_time_ms: u64,
    pub events_dispatched: u64,
    pub metrics: Vec<MetricEntry>,
}

impl SimResults {
    pub fn get(&self, name: &str) -> Option<&MetricValue> {
        self.metrics
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| &entry.value)
    }

    pub fn count(&self, name: &str) -> Option<u64> {
        match self.get(name)? {
            MetricValue::Count(count) => Some(*count),
            MetricValue::Tally { total, .. } => Some(*total),
            _ => None,
        }
    }

    /// Metric name -> value, the shape drivers print.
    pub fn as_map(&self) -> BTreeMap<&str, &MetricValue> {
        self.metrics
            .iter()
            .map(|entry| (entry.name.as_str(), &entry.value))
            .collect()
    }
}
