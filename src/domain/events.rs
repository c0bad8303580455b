// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::domain::types::Allocation;
use alloy::primitives::{Address, U256};
use serde::Serialize;
use tokio::sync::broadcast;

const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Audit record emitted by every state-changing operation.
///
/// Events are emit-only: subscribers get a best-effort broadcast stream,
/// and every event is mirrored to the log. Nothing in the engine reads
/// them back.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PortfolioEvent {
    AllocationsReplaced {
        allocations: Vec<Allocation>,
    },
    AllocationsCleared,
    TokenAllowed {
        token: Address,
        symbol: String,
        decimals: u8,
    },
    TokenDisallowed {
        token: Address,
    },
    PriceSourceSet {
        token: Address,
        source: String,
        decimals: u8,
    },
    FundsReceived {
        amount: U256,
    },
    FundsReleased {
        requested: U256,
        released: U256,
    },
    TradeExecuted {
        from: Address,
        to: Address,
        route: Vec<Address>,
        amount_in: U256,
        amount_out: U256,
    },
    TradeSkipped {
        from: Address,
        to: Address,
        amount_in: U256,
        reason: String,
    },
    LiquidationRun {
        requested: U256,
        freed: U256,
    },
    EmergencyExit {
        legs_executed: usize,
        legs_skipped: usize,
    },
    EmergencyWithdrawal {
        token: Address,
        amount: U256,
        destination: Address,
    },
}

pub struct EventBus {
    tx: broadcast::Sender<PortfolioEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PortfolioEvent> {
        self.tx.subscribe()
    }

    /// Send failures mean no live subscribers; the log mirror still has it.
    pub fn emit(&self, event: PortfolioEvent) {
        tracing::info!(target: "portfolio_events", event = ?event, "Portfolio event");
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emitted_events_reach_subscribers() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.emit(PortfolioEvent::FundsReceived {
            amount: U256::from(42),
        });
        match rx.recv().await.unwrap() {
            PortfolioEvent::FundsReceived { amount } => assert_eq!(amount, U256::from(42)),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn emit_without_subscribers_is_silent() {
        let bus = EventBus::new();
        bus.emit(PortfolioEvent::AllocationsCleared);
    }

    #[test]
    fn events_serialize_for_audit_sinks() {
        let event = PortfolioEvent::FundsReleased {
            requested: U256::from(10),
            released: U256::from(7),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("funds_released"));
    }
}
