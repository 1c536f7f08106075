use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Creates a sender together with the receiving end of its channel
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the consumer is gone.
    /// Domain writes have already committed by the time events go out.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("{}", e);
        }
    }
}

/// Domain events emitted after successful writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    UserRegistered {
        user_id: Uuid,
    },
    StoreCreated {
        store_id: Uuid,
        owner_id: Uuid,
    },
    EmployeeAdded {
        store_id: Uuid,
        user_id: Uuid,
    },
    ProductAdded {
        product_id: Uuid,
        store_id: Uuid,
    },
    CustomerAdded {
        customer_id: Uuid,
        store_id: Uuid,
    },
    CouponCreated {
        coupon_id: Uuid,
        store_id: Uuid,
    },
    TransactionCreated {
        transaction_id: Uuid,
        store_id: Uuid,
        customer_id: Uuid,
        total_price: Decimal,
        occurred_at: DateTime<Utc>,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::UserRegistered { .. } => "user_registered",
            Event::StoreCreated { .. } => "store_created",
            Event::EmployeeAdded { .. } => "employee_added",
            Event::ProductAdded { .. } => "product_added",
            Event::CustomerAdded { .. } => "customer_added",
            Event::CouponCreated { .. } => "coupon_created",
            Event::TransactionCreated { .. } => "transaction_created",
        }
    }
}

/// Drains the event channel, logging every event until all senders are dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::TransactionCreated {
                transaction_id,
                store_id,
                customer_id,
                total_price,
                ..
            } => info!(
                event = event.name(),
                %transaction_id,
                %store_id,
                %customer_id,
                %total_price,
                "domain event"
            ),
            other => info!(event = other.name(), payload = ?other, "domain event"),
        }
    }

    info!("Event channel closed; stopping event processing");
}
