//! Deck event types and the broadcast event bus
//!
//! Every applied state transition is published to the bus; any number of
//! subscribers may listen and a subscriber that falls behind observes a
//! lag error rather than silently missing transitions. This replaces the
//! one-shot wait-for-next-change pattern: a subscription is durable and
//! sees every event emitted after it was created, bounded only by the bus
//! capacity.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Lifecycle state of the deck
///
/// Exactly one state is live at a time. `ShuttingDown` is terminal: no
/// transition leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerState {
    /// Pre-initialization; only an eject may follow
    Void,
    /// No track loaded
    Ejected,
    /// Track loaded, not advancing
    Stopped,
    /// Track loaded, advancing
    Playing,
    /// Terminal
    ShuttingDown,
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerState::Void => write!(f, "void"),
            PlayerState::Ejected => write!(f, "ejected"),
            PlayerState::Stopped => write!(f, "stopped"),
            PlayerState::Playing => write!(f, "playing"),
            PlayerState::ShuttingDown => write!(f, "shuttingdown"),
        }
    }
}

/// Deck event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DeckEvent {
    /// Deck state changed
    StateChanged {
        old_state: PlayerState,
        new_state: PlayerState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A track was loaded and the deck holds its handle
    TrackLoaded {
        path: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The playing track reached end of stream (normal completion)
    TrackFinished {
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl DeckEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &str {
        match self {
            DeckEvent::StateChanged { .. } => "StateChanged",
            DeckEvent::TrackLoaded { .. } => "TrackLoaded",
            DeckEvent::TrackFinished { .. } => "TrackFinished",
        }
    }
}

/// One-to-many broadcast bus for deck events
///
/// Backed by `tokio::sync::broadcast`: non-blocking publish, multiple
/// concurrent subscribers, automatic cleanup when subscribers drop, and
/// lagged-message detection for slow subscribers.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DeckEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new bus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<DeckEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)`, or `Err` if no subscriber is
    /// currently listening.
    pub fn emit(
        &self,
        event: DeckEvent,
    ) -> std::result::Result<usize, broadcast::error::SendError<DeckEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring whether anyone is listening
    pub fn emit_lossy(&self, event: DeckEvent) {
        if let Err(e) = self.tx.send(event) {
            tracing::trace!("no subscribers for event: {}", e.0.event_type());
        }
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_change(old_state: PlayerState, new_state: PlayerState) -> DeckEvent {
        DeckEvent::StateChanged {
            old_state,
            new_state,
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_eventbus_new() {
        let bus = EventBus::new(64);
        assert_eq!(bus.capacity(), 64);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_eventbus_subscribe() {
        let bus = EventBus::new(64);
        let _rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_eventbus_emit_no_subscribers() {
        let bus = EventBus::new(64);
        let event = state_change(PlayerState::Stopped, PlayerState::Playing);

        // Should return error when no subscribers
        assert!(bus.emit(event).is_err());
    }

    #[tokio::test]
    async fn test_eventbus_emit_with_subscriber() {
        let bus = EventBus::new(64);
        let mut rx = bus.subscribe();

        assert!(bus
            .emit(state_change(PlayerState::Stopped, PlayerState::Playing))
            .is_ok());

        let received = rx.recv().await.unwrap();
        match received {
            DeckEvent::StateChanged {
                old_state,
                new_state,
                ..
            } => {
                assert_eq!(old_state, PlayerState::Stopped);
                assert_eq!(new_state, PlayerState::Playing);
            }
            other => panic!("wrong event type received: {}", other.event_type()),
        }
    }

    #[tokio::test]
    async fn test_eventbus_subscriber_sees_every_transition() {
        let bus = EventBus::new(64);
        let mut rx = bus.subscribe();

        bus.emit(state_change(PlayerState::Void, PlayerState::Ejected))
            .unwrap();
        bus.emit(state_change(PlayerState::Ejected, PlayerState::Stopped))
            .unwrap();
        bus.emit(state_change(PlayerState::Stopped, PlayerState::Playing))
            .unwrap();

        let mut seen = Vec::new();
        for _ in 0..3 {
            match rx.recv().await.unwrap() {
                DeckEvent::StateChanged { new_state, .. } => seen.push(new_state),
                other => panic!("wrong event type received: {}", other.event_type()),
            }
        }
        assert_eq!(
            seen,
            vec![
                PlayerState::Ejected,
                PlayerState::Stopped,
                PlayerState::Playing
            ]
        );
    }

    #[test]
    fn test_emit_lossy_does_not_fail_without_subscribers() {
        let bus = EventBus::new(8);
        bus.emit_lossy(state_change(PlayerState::Playing, PlayerState::Ejected));
    }
}
