//! Sessions and orders: the value entities carried through one simulation run.
//!
//! The [SessionBook] resource owns every session and order of a run. Handlers
//! mutate it while reacting to lifecycle events; once a session's terminal
//! event has fired the session (and its order) refuse further changes.

use std::fmt;

use bevy_ecs::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::ecs::{CourierId, CustomerId, RestaurantId};
use crate::error::HandlerError;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SessionId(pub u32);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct OrderId(pub u32);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "order-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    RestaurantClosed,
    RestaurantAtCapacity,
    NoCourierAvailable,
}

impl RejectionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectionReason::RestaurantClosed => "restaurant_closed",
            RejectionReason::RestaurantAtCapacity => "restaurant_at_capacity",
            RejectionReason::NoCourierAvailable => "no_courier_available",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OrderStatus {
    Created,
    Assigned,
    PickedUp,
    Delivered,
    Rejected,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Rejected)
    }

    fn can_move_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Created, OrderStatus::Assigned)
                | (OrderStatus::Created, OrderStatus::Rejected)
                | (OrderStatus::Assigned, OrderStatus::PickedUp)
                | (OrderStatus::PickedUp, OrderStatus::Delivered)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub id: SessionId,
    pub customer_id: CustomerId,
    pub restaurant_id: RestaurantId,
    pub start_timestamp: u64,
    pub converted: bool,
    pub order: Option<OrderId>,
    /// Set when the session's terminal event fires.
    pub closed_at: Option<u64>,
}

impl Session {
    pub fn is_closed(&self) -> bool {
        self.closed_at.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub session_id: SessionId,
    pub restaurant_id: RestaurantId,
    pub customer_id: CustomerId,
    pub created_at: u64,
    pub status: OrderStatus,
    pub assigned_courier_id: Option<CourierId>,
    pub ready_at: Option<u64>,
    pub assigned_at: Option<u64>,
    pub picked_up_at: Option<u64>,
    pub delivered_at: Option<u64>,
    pub rejected_at: Option<u64>,
    pub rejection: Option<RejectionReason>,
    /// Assignment attempts that found no courier.
    pub failed_assignments: u32,
}

impl Order {
    fn transition(&mut self, next: OrderStatus) -> Result<(), HandlerError> {
        if !self.status.can_move_to(next) {
            return Err(HandlerError::InvalidTransition {
                order: self.id,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Time from placement to delivery, once delivered.
    pub fn delivery_time_ms(&self) -> Option<u64> {
        self.delivered_at
            .map(|delivered| delivered.saturating_sub(self.created_at))
    }
}

#[derive(Debug, Default, Resource)]
pub struct SessionBook {
    sessions: Vec<Session>,
    orders: Vec<Order>,
}

impl SessionBook {
    pub fn open_session(
        &mut self,
        customer_id: CustomerId,
        restaurant_id: RestaurantId,
        start_timestamp: u64,
    ) -> SessionId {
        let id = SessionId(self.sessions.len() as u32);
        self.sessions.push(Session {
            id,
            customer_id,
            restaurant_id,
            start_timestamp,
            converted: false,
            order: None,
            closed_at: None,
        });
        id
    }

    pub fn session(&self, id: SessionId) -> Result<&Session, HandlerError> {
        self.sessions
            .get(id.0 as usize)
            .ok_or(HandlerError::UnknownSession(id))
    }

    fn open_session_mut(&mut self, id: SessionId) -> Result<&mut Session, HandlerError> {
        let session = self
            .sessions
            .get_mut(id.0 as usize)
            .ok_or(HandlerError::UnknownSession(id))?;
        if session.is_closed() {
            return Err(HandlerError::SessionClosed(id));
        }
        Ok(session)
    }

    pub fn order(&self, id: OrderId) -> Result<&Order, HandlerError> {
        self.orders
            .get(id.0 as usize)
            .ok_or(HandlerError::UnknownOrder(id))
    }

    fn order_mut(&mut self, id: OrderId) -> Result<&mut Order, HandlerError> {
        self.orders
            .get_mut(id.0 as usize)
            .ok_or(HandlerError::UnknownOrder(id))
    }

    /// Converts an open session into a fresh order created at `at`.
    pub fn place_order(&mut self, session_id: SessionId, at: u64) -> Result<OrderId, HandlerError> {
        let order_id = OrderId(self.orders.len() as u32);
        let session = self.open_session_mut(session_id)?;
        if session.converted {
            return Err(HandlerError::AlreadyConverted(session_id));
        }
        session.converted = true;
        session.order = Some(order_id);
        let (customer_id, restaurant_id) = (session.customer_id, session.restaurant_id);

        self.orders.push(Order {
            id: order_id,
            session_id,
            restaurant_id,
            customer_id,
            created_at: at,
            status: OrderStatus::Created,
            assigned_courier_id: None,
            ready_at: None,
            assigned_at: None,
            picked_up_at: None,
            delivered_at: None,
            rejected_at: None,
            rejection: None,
            failed_assignments: 0,
        });
        Ok(order_id)
    }

    /// Closes a session that did not convert.
    pub fn end_session(&mut self, session_id: SessionId, at: u64) -> Result<(), HandlerError> {
        self.open_session_mut(session_id)?.closed_at = Some(at);
        Ok(())
    }

    pub fn mark_ready(&mut self, order_id: OrderId, at: u64) -> Result<(), HandlerError> {
        let order = self.order_mut(order_id)?;
        if order.status.is_terminal() {
            return Err(HandlerError::InvalidTransition {
                order: order_id,
                from: order.status,
                to: order.status,
            });
        }
        order.ready_at = Some(at);
        Ok(())
    }

    pub fn assign_order(
        &mut self,
        order_id: OrderId,
        courier: CourierId,
        at: u64,
    ) -> Result<(), HandlerError> {
        let order = self.order_mut(order_id)?;
        order.transition(OrderStatus::Assigned)?;
        order.assigned_courier_id = Some(courier);
        order.assigned_at = Some(at);
        Ok(())
    }

    /// Records an assignment attempt that found no courier; returns the failure count.
    pub fn record_failed_assignment(&mut self, order_id: OrderId) -> Result<u32, HandlerError> {
        let order = self.order_mut(order_id)?;
        order.failed_assignments += 1;
        Ok(order.failed_assignments)
    }

    pub fn pick_up(&mut self, order_id: OrderId, at: u64) -> Result<(), HandlerError> {
        let order = self.order_mut(order_id)?;
        order.transition(OrderStatus::PickedUp)?;
        order.picked_up_at = Some(at);
        Ok(())
    }

    /// Delivers the order and closes its session.
    pub fn deliver(&mut self, order_id: OrderId, at: u64) -> Result<(), HandlerError> {
        let order = self.order_mut(order_id)?;
        order.transition(OrderStatus::Delivered)?;
        order.delivered_at = Some(at);
        let session_id = order.session_id;
        self.open_session_mut(session_id)?.closed_at = Some(at);
        Ok(())
    }

    /// Rejects the order and closes its session.
    pub fn reject(
        &mut self,
        order_id: OrderId,
        reason: RejectionReason,
        at: u64,
    ) -> Result<(), HandlerError> {
        let order = self.order_mut(order_id)?;
        order.transition(OrderStatus::Rejected)?;
        order.rejected_at = Some(at);
        order.rejection = Some(reason);
        let session_id = order.session_id;
        self.open_session_mut(session_id)?.closed_at = Some(at);
        Ok(())
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    /// Orders that are assigned or picked up but not yet delivered.
    pub fn unresolved_orders(&self) -> impl Iterator<Item = &Order> {
        self.orders
            .iter()
            .filter(|order| matches!(order.status, OrderStatus::Assigned | OrderStatus::PickedUp))
    }
}
