//! In-process order notifications: a broadcast channel for admin SSE streams
//! plus the last ten notifications for late joiners.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::broadcast;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Order, OrderStatus};

const BROADCAST_CAPACITY: usize = 256;
const RECENT_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderEventKind {
    Created,
    Paid,
    Failed,
    ReadyForPickup,
    Delivered,
}

impl OrderEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderEventKind::Created => "created",
            OrderEventKind::Paid => "paid",
            OrderEventKind::Failed => "failed",
            OrderEventKind::ReadyForPickup => "ready_for_pickup",
            OrderEventKind::Delivered => "delivered",
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderNotification {
    pub kind: OrderEventKind,
    pub order_id: Uuid,
    pub order_number: String,
    pub status: OrderStatus,
    pub total: Decimal,
    pub at: DateTime<Utc>,
}

impl OrderNotification {
    pub fn for_order(kind: OrderEventKind, order: &Order) -> Self {
        Self {
            kind,
            order_id: order.id,
            order_number: order.order_number.clone(),
            status: order.status,
            total: order.total,
            at: Utc::now(),
        }
    }
}

#[derive(Clone)]
pub struct OrderEvents {
    tx: broadcast::Sender<OrderNotification>,
    recent: Arc<Mutex<VecDeque<OrderNotification>>>,
}

impl Default for OrderEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            tx,
            recent: Arc::new(Mutex::new(VecDeque::with_capacity(RECENT_LIMIT))),
        }
    }

    pub fn publish(&self, event: OrderNotification) {
        {
            let mut recent = self.recent.lock().unwrap_or_else(|e| e.into_inner());
            recent.push_front(event.clone());
            recent.truncate(RECENT_LIMIT);
        }
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrderNotification> {
        self.tx.subscribe()
    }

    /// Newest first.
    pub fn recent(&self) -> Vec<OrderNotification> {
        let recent = self.recent.lock().unwrap_or_else(|e| e.into_inner());
        recent.iter().cloned().collect()
    }
}
