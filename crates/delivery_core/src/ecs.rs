use std::collections::HashMap;
use std::fmt;

use bevy_ecs::prelude::{Component, Entity, Resource};
use serde::{Deserialize, Serialize};

use crate::error::HandlerError;
use crate::model::OrderId;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RestaurantId(pub u32);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CustomerId(pub u32);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CourierId(pub u32);

impl fmt::Display for RestaurantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "restaurant-{}", self.0)
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "customer-{}", self.0)
    }
}

impl fmt::Display for CourierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "courier-{}", self.0)
    }
}

/// Stable identity of a registered agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum AgentId {
    Restaurant(RestaurantId),
    Customer(CustomerId),
    Courier(CourierId),
    Coordinator,
    /// Metrics observers are identified by the metric name.
    Observer(String),
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentId::Restaurant(id) => id.fmt(f),
            AgentId::Customer(id) => id.fmt(f),
            AgentId::Courier(id) => id.fmt(f),
            AgentId::Coordinator => f.write_str("assignment-coordinator"),
            AgentId::Observer(name) => write!(f, "observer-{name}"),
        }
    }
}

/// WGS84 coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Great-circle (haversine) distance in kilometres.
    pub fn distance_km(self, other: GeoPoint) -> f64 {
        let (lat1, lon1) = (self.lat.to_radians(), self.lng.to_radians());
        let (lat2, lon2) = (other.lat.to_radians(), other.lng.to_radians());
        let sin_dlat = ((lat2 - lat1) * 0.5).sin();
        let sin_dlon = ((lon2 - lon1) * 0.5).sin();
        let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
        let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
        6371.0 * c
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Component)]
pub struct Position(pub GeoPoint);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CustomerState {
    Idle,
    InSession,
    Converted,
    NotConverted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Component)]
pub struct Customer {
    pub id: CustomerId,
    pub state: CustomerState,
    pub sessions_started: u32,
}

impl Customer {
    pub fn new(id: CustomerId) -> Self {
        Self {
            id,
            state: CustomerState::Idle,
            sessions_started: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RestaurantState {
    Idle,
    PreparingOrder,
    ReadyForPickup,
    HandedOver,
}

/// Kitchen bookkeeping. A restaurant works on several orders at once, so its
/// state is derived from the counters rather than stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Component)]
pub struct Restaurant {
    pub id: RestaurantId,
    /// Maximum orders in the kitchen (preparing or awaiting pickup); `None` = unbounded.
    pub capacity: Option<u32>,
    pub preparing: u32,
    pub awaiting_pickup: u32,
    pub handed_over: u64,
}

impl Restaurant {
    pub fn new(id: RestaurantId, capacity: Option<u32>) -> Self {
        Self {
            id,
            capacity,
            preparing: 0,
            awaiting_pickup: 0,
            handed_over: 0,
        }
    }

    pub fn open_orders(&self) -> u32 {
        self.preparing + self.awaiting_pickup
    }

    pub fn has_capacity(&self) -> bool {
        self.capacity.map_or(true, |cap| self.open_orders() < cap)
    }

    pub fn state(&self) -> RestaurantState {
        if self.preparing > 0 {
            RestaurantState::PreparingOrder
        } else if self.awaiting_pickup > 0 {
            RestaurantState::ReadyForPickup
        } else if self.handed_over > 0 {
            RestaurantState::HandedOver
        } else {
            RestaurantState::Idle
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CourierState {
    Available,
    EnRouteToRestaurant,
    EnRouteToCustomer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Component)]
pub struct Courier {
    pub id: CourierId,
    pub state: CourierState,
    pub available: bool,
    pub active_order: Option<OrderId>,
    pub deliveries: u64,
}

impl Courier {
    pub fn new(id: CourierId) -> Self {
        Self {
            id,
            state: CourierState::Available,
            available: true,
            active_order: None,
            deliveries: 0,
        }
    }

    /// Takes the courier out of the pool for `order`. A courier holds at most one order.
    pub fn claim(&mut self, order: OrderId) -> Result<(), HandlerError> {
        if let Some(active) = self.active_order {
            return Err(HandlerError::CourierBusy {
                courier: self.id,
                active,
            });
        }
        self.available = false;
        self.active_order = Some(order);
        Ok(())
    }

    /// Returns the courier to the pool after `order` is delivered.
    pub fn release(&mut self, order: OrderId) -> Result<(), HandlerError> {
        if self.active_order != Some(order) {
            return Err(HandlerError::NotHoldingOrder {
                courier: self.id,
                order,
            });
        }
        self.active_order = None;
        self.available = true;
        self.state = CourierState::Available;
        self.deliveries += 1;
        Ok(())
    }

    pub fn ensure_holds(&self, order: OrderId) -> Result<(), HandlerError> {
        if self.active_order == Some(order) {
            Ok(())
        } else {
            Err(HandlerError::NotHoldingOrder {
                courier: self.id,
                order,
            })
        }
    }
}

/// Typed id -> entity lookup for restaurants, customers and couriers.
#[derive(Debug, Default, Resource)]
pub struct Directory {
    restaurants: HashMap<RestaurantId, Entity>,
    customers: HashMap<CustomerId, Entity>,
    couriers: HashMap<CourierId, Entity>,
}

impl Directory {
    pub fn insert(&mut self, agent: &AgentId, entity: Entity) {
        match *agent {
            AgentId::Restaurant(id) => {
                self.restaurants.insert(id, entity);
            }
            AgentId::Customer(id) => {
                self.customers.insert(id, entity);
            }
            AgentId::Courier(id) => {
                self.couriers.insert(id, entity);
            }
            AgentId::Coordinator | AgentId::Observer(_) => {}
        }
    }

    pub fn restaurant(&self, id: RestaurantId) -> Result<Entity, HandlerError> {
        self.restaurants
            .get(&id)
            .copied()
            .ok_or(HandlerError::UnknownAgent(AgentId::Restaurant(id)))
    }

    pub fn customer(&self, id: CustomerId) -> Result<Entity, HandlerError> {
        self.customers
            .get(&id)
            .copied()
            .ok_or(HandlerError::UnknownAgent(AgentId::Customer(id)))
    }

    pub fn courier(&self, id: CourierId) -> Result<Entity, HandlerError> {
        self.couriers
            .get(&id)
            .copied()
            .ok_or(HandlerError::UnknownAgent(AgentId::Courier(id)))
    }

    pub fn has_restaurant(&self, id: RestaurantId) -> bool {
        self.restaurants.contains_key(&id)
    }

    pub fn has_customer(&self, id: CustomerId) -> bool {
        self.customers.contains_key(&id)
    }

    pub fn courier_count(&self) -> usize {
        self.couriers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn courier_holds_one_order_at_a_time() {
        let mut courier = Courier::new(CourierId(1));
        courier.claim(OrderId(10)).expect("first claim");
        assert!(!courier.available);

        let err = courier.claim(OrderId(11)).unwrap_err();
        assert_eq!(
            err,
            HandlerError::CourierBusy {
                courier: CourierId(1),
                active: OrderId(10),
            }
        );

        assert!(courier.release(OrderId(11)).is_err());
        courier.release(OrderId(10)).expect("release");
        assert!(courier.available);
        assert_eq!(courier.state, CourierState::Available);
        assert_eq!(courier.deliveries, 1);
    }

    #[test]
    fn restaurant_state_follows_counters() {
        let mut restaurant = Restaurant::new(RestaurantId(1), Some(2));
        assert_eq!(restaurant.state(), RestaurantState::Idle);
        restaurant.preparing = 1;
        restaurant.awaiting_pickup = 1;
        assert_eq!(restaurant.state(), RestaurantState::PreparingOrder);
        assert!(!restaurant.has_capacity());
        restaurant.preparing = 0;
        assert_eq!(restaurant.state(), RestaurantState::ReadyForPickup);
        restaurant.awaiting_pickup = 0;
        restaurant.handed_over = 1;
        assert_eq!(restaurant.state(), RestaurantState::HandedOver);
    }

    #[test]
    fn haversine_distance_is_symmetric() {
        let a = GeoPoint::new(52.52, 13.405);
        let b = GeoPoint::new(52.50, 13.45);
        let d = a.distance_km(b);
        assert!((d - b.distance_km(a)).abs() < 1e-9);
        assert!(d > 3.0 && d < 4.0, "unexpected distance {d}");
        assert_eq!(a.distance_km(a), 0.0);
    }
}
