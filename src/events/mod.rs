use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Domain events published after a store transaction commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // Billing events
    MeterRegistered {
        meter_id: i32,
        kind: String,
        tenant: String,
    },
    ReadingRecorded {
        meter_id: i32,
        month: String,
        value: f64,
    },

    // Inventory events
    IngredientCreated {
        ingredient_id: i32,
        name: String,
    },
    StockRecorded {
        ingredient_id: i32,
        transaction_id: i32,
        action: String,
        quantity: f64,
        new_quantity: f64,
        actor: Option<i32>,
    },
    CriticalStockReached {
        ingredient_id: i32,
        name: String,
        quantity: f64,
        critical_quantity: f64,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::MeterRegistered { .. } => "meter_registered",
            Event::ReadingRecorded { .. } => "reading_recorded",
            Event::IngredientCreated { .. } => "ingredient_created",
            Event::StockRecorded { .. } => "stock_recorded",
            Event::CriticalStockReached { .. } => "critical_stock_reached",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Creates a bounded channel and returns both ends
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Publishes without waiting. The write that produced the event has
    /// already committed, so a full or closed channel is only logged.
    pub fn publish(&self, event: Event) {
        let name = event.name();
        if let Err(e) = self.sender.try_send(event) {
            warn!(event = name, error = %e, "Dropped event");
            metrics::counter!("household_events.dropped", 1);
        }
    }
}

pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::MeterRegistered {
                meter_id,
                kind,
                tenant,
            } => {
                info!(meter_id, kind = %kind, tenant = %tenant, "Meter registered");
            }
            Event::ReadingRecorded {
                meter_id,
                month,
                value,
            } => {
                info!(meter_id, month = %month, value, "Reading recorded");
            }
            Event::IngredientCreated {
                ingredient_id,
                name,
            } => {
                info!(ingredient_id, name = %name, "Ingredient created");
            }
            Event::StockRecorded {
                ingredient_id,
                transaction_id,
                action,
                quantity,
                new_quantity,
                actor,
            } => {
                info!(
                    ingredient_id,
                    transaction_id,
                    action = %action,
                    quantity,
                    new_quantity,
                    actor = ?actor,
                    "Stock recorded"
                );
            }
            Event::CriticalStockReached {
                ingredient_id,
                name,
                quantity,
                critical_quantity,
            } => {
                warn!(
                    ingredient_id,
                    name = %name,
                    quantity,
                    critical_quantity,
                    "Ingredient reached critical stock"
                );
            }
        }
        metrics::counter!("household_events.processed", 1, "event" => event.name());
    }

    warn!("Event processing loop has ended");
}
