//! # Conversation Flow Module
//!
//! Per-user flow state for guided multi-step input. Each admin interaction
//! owns exactly one state cell in an explicit session map keyed by user id;
//! the cell is cleared on completion, cancellation, unauthorized use, or a
//! conflicting command. Nothing here is persisted: a restart silently
//! abandons in-progress flows.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Offer operation a single-id flow is collecting input for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfferAction {
    SetQuantity,
    SetPrice,
    SoldOut,
    Reannounce,
}

impl OfferAction {
    /// Whether this action needs a value step after the offer id
    pub fn needs_value(self) -> bool {
        matches!(self, OfferAction::SetQuantity | OfferAction::SetPrice)
    }

    /// Prompt for the value step
    pub fn value_prompt(self) -> &'static str {
        match self {
            OfferAction::SetQuantity => "Send the new quantity (0 marks it sold out).",
            OfferAction::SetPrice => "Send the new price.",
            OfferAction::SoldOut | OfferAction::Reannounce => "",
        }
    }
}

/// Represents the conversation state for one user's pending flow
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum FlowState {
    /// No flow pending
    #[default]
    Idle,
    /// Add-offer flow: waiting for the offer name
    AwaitName,
    /// Add-offer flow: waiting for the quantity
    AwaitQuantity { name: String },
    /// Add-offer flow: waiting for the price
    AwaitPrice { name: String, quantity: i64 },
    /// Waiting for the target offer id of `action`
    AwaitOfferId { action: OfferAction },
    /// Waiting for the new value of `action` against `offer_id`
    AwaitValue { action: OfferAction, offer_id: i64 },
    /// Upload flow: waiting for a document
    AwaitUploadFile { display_count: Option<String> },
}

impl FlowState {
    /// Whether a flow is in progress
    pub fn is_pending(&self) -> bool {
        !matches!(self, FlowState::Idle)
    }
}

/// Explicit session map owning every user's flow state.
///
/// Cheap to clone; clones share the same underlying map.
#[derive(Clone, Default)]
pub struct FlowSessions {
    inner: Arc<Mutex<HashMap<u64, FlowState>>>,
}

impl FlowSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state for a user; `Idle` when no session exists
    pub async fn get(&self, user_id: u64) -> FlowState {
        self.inner
            .lock()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Replace a user's state
    pub async fn set(&self, user_id: u64, state: FlowState) {
        self.inner.lock().await.insert(user_id, state);
    }

    /// Drop a user's session entirely
    pub async fn clear(&self, user_id: u64) {
        self.inner.lock().await.remove(&user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sessions_default_to_idle() {
        let sessions = FlowSessions::new();
        assert_eq!(sessions.get(1).await, FlowState::Idle);
        assert!(!sessions.get(1).await.is_pending());
    }

    #[tokio::test]
    async fn test_sessions_are_isolated_per_user() {
        let sessions = FlowSessions::new();
        sessions.set(1, FlowState::AwaitName).await;

        assert!(sessions.get(1).await.is_pending());
        assert_eq!(sessions.get(2).await, FlowState::Idle);
    }

    #[tokio::test]
    async fn test_clear_resets_to_idle() {
        let sessions = FlowSessions::new();
        sessions
            .set(
                1,
                FlowState::AwaitQuantity {
                    name: "Widget".to_string(),
                },
            )
            .await;

        sessions.clear(1).await;
        assert_eq!(sessions.get(1).await, FlowState::Idle);
    }

    #[tokio::test]
    async fn test_set_overwrites_previous_state() {
        let sessions = FlowSessions::new();
        sessions.set(1, FlowState::AwaitName).await;
        sessions
            .set(
                1,
                FlowState::AwaitOfferId {
                    action: OfferAction::SoldOut,
                },
            )
            .await;

        assert_eq!(
            sessions.get(1).await,
            FlowState::AwaitOfferId {
                action: OfferAction::SoldOut
            }
        );
    }

    #[test]
    fn test_value_steps() {
        assert!(OfferAction::SetQuantity.needs_value());
        assert!(OfferAction::SetPrice.needs_value());
        assert!(!OfferAction::SoldOut.needs_value());
        assert!(!OfferAction::Reannounce.needs_value());
    }
}
