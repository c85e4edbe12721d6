// =============================================================================
// Broker interface — the core's only contact point with a vendor
// =============================================================================
//
// Concrete wire protocols for any specific vendor are out of scope; this
// trait is the seam a host implementation plugs into. `PaperBroker` is a
// fill-on-place test double used by the crate's own tests and by scenario
// S3 (idempotent resubmission across restart).
// =============================================================================

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use super::models::{AccountSnapshot, BrokerOrder, ExecutionOrder, Position, SymbolSpec};
use crate::error::SupervisorError;
use crate::types::BrokerOrderStatus;

#[async_trait]
pub trait Broker: Send + Sync {
    async fn place_order(&self, order: &ExecutionOrder) -> Result<BrokerOrder, SupervisorError>;
    async fn cancel_order(&self, broker_order_id: &str) -> Result<(), SupervisorError>;
    async fn modify_order(&self, broker_order_id: &str, price: Option<f64>) -> Result<(), SupervisorError>;
    async fn list_open_orders(&self) -> Result<Vec<BrokerOrder>, SupervisorError>;
    async fn list_positions(&self) -> Result<Vec<Position>, SupervisorError>;
    async fn get_account_snapshot(&self) -> Result<Option<AccountSnapshot>, SupervisorError>;
    async fn get_symbol_spec(&self, symbol: &str) -> Result<Option<SymbolSpec>, SupervisorError>;

    /// Default `true`, matching the source project's `BrokerAdapter.ping`;
    /// a real adapter overrides this with an actual connectivity check.
    async fn ping(&self) -> bool {
        true
    }
}

/// A fill-on-place paper broker: every order is accepted immediately at its
/// requested price with a synthesized `broker_order_id`. Used by the core's
/// own tests; not a production execution venue.
pub struct PaperBroker {
    open_orders: Mutex<Vec<BrokerOrder>>,
    positions: Mutex<Vec<Position>>,
    place_calls: Mutex<u32>,
}

impl Default for PaperBroker {
    fn default() -> Self {
        Self {
            open_orders: Mutex::new(Vec::new()),
            positions: Mutex::new(Vec::new()),
            place_calls: Mutex::new(0),
        }
    }
}

impl PaperBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `place_order` actually ran (as opposed to being
    /// short-circuited by journal idempotence upstream).
    pub fn place_call_count(&self) -> u32 {
        *self.place_calls.lock()
    }
}

#[async_trait]
impl Broker for PaperBroker {
    async fn place_order(&self, order: &ExecutionOrder) -> Result<BrokerOrder, SupervisorError> {
        *self.place_calls.lock() += 1;
        let broker_order = BrokerOrder {
            broker_order_id: format!("paper-{}", Uuid::new_v4()),
            client_order_id: order.client_order_id.clone(),
            status: BrokerOrderStatus::Filled,
            symbol: order.symbol.clone(),
            side: order.side,
            volume: order.volume,
            time: Utc::now(),
            price: order.price,
        };
        self.open_orders.lock().push(broker_order.clone());
        Ok(broker_order)
    }

    async fn cancel_order(&self, broker_order_id: &str) -> Result<(), SupervisorError> {
        self.open_orders
            .lock()
            .retain(|o| o.broker_order_id != broker_order_id);
        Ok(())
    }

    async fn modify_order(&self, _broker_order_id: &str, _price: Option<f64>) -> Result<(), SupervisorError> {
        Ok(())
    }

    async fn list_open_orders(&self) -> Result<Vec<BrokerOrder>, SupervisorError> {
        Ok(self.open_orders.lock().clone())
    }

    async fn list_positions(&self) -> Result<Vec<Position>, SupervisorError> {
        Ok(self.positions.lock().clone())
    }

    async fn get_account_snapshot(&self) -> Result<Option<AccountSnapshot>, SupervisorError> {
        Ok(Some(AccountSnapshot {
            equity: 100_000.0,
            balance: 100_000.0,
            margin: 0.0,
            free_margin: 100_000.0,
            currency: "USD".into(),
        }))
    }

    async fn get_symbol_spec(&self, _symbol: &str) -> Result<Option<SymbolSpec>, SupervisorError> {
        Ok(None)
    }

    async fn ping(&self) -> bool {
        true
    }
}
