//! Chat delivery sink with per-villager rate limiting and truncation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;
use villagemind_domain::EntityId;

use crate::infrastructure::ports::{ClockPort, CollaboratorError, DeliveryPort, Initiator};

/// Longest message a player sees; longer replies are cut with an ellipsis.
pub const MAX_MESSAGE_CHARS: usize = 200;
/// Minimum spacing in seconds between two messages from the same villager.
pub const VILLAGER_MESSAGE_INTERVAL_SECS: i64 = 3;

/// A message handed to the chat channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub from: EntityId,
    pub to: EntityId,
    pub text: String,
}

/// Forwards replies into a channel the host drains into its chat system.
pub struct ChatDelivery {
    outbox: mpsc::UnboundedSender<ChatMessage>,
    clock: Arc<dyn ClockPort>,
    last_sent: DashMap<EntityId, DateTime<Utc>>,
}

impl ChatDelivery {
    pub fn new(clock: Arc<dyn ClockPort>) -> (Self, mpsc::UnboundedReceiver<ChatMessage>) {
        let (outbox, inbox) = mpsc::unbounded_channel();
        let delivery = Self {
            outbox,
            clock,
            last_sent: DashMap::new(),
        };
        (delivery, inbox)
    }

    /// Claims a send slot for `villager`; false while the previous one is too recent.
    fn try_claim_slot(&self, villager: EntityId) -> bool {
        let now = self.clock.now();
        match self.last_sent.entry(villager) {
            Entry::Occupied(mut last) => {
                if now - *last.get() < chrono::Duration::seconds(VILLAGER_MESSAGE_INTERVAL_SECS) {
                    return false;
                }
                last.insert(now);
            }
            Entry::Vacant(slot) => {
                slot.insert(now);
            }
        }
        true
    }
}

#[async_trait]
impl DeliveryPort for ChatDelivery {
    async fn deliver(
        &self,
        subject: EntityId,
        initiator: &Initiator,
        text: &str,
    ) -> Result<(), CollaboratorError> {
        if !self.try_claim_slot(subject) {
            tracing::debug!(villager = %subject, "Villager message rate limited, dropping");
            return Ok(());
        }

        let message = ChatMessage {
            from: subject,
            to: initiator.id,
            text: truncate_message(text),
        };
        self.outbox
            .send(message)
            .map_err(|_| CollaboratorError::delivery("chat channel closed"))
    }
}

/// Cut to [`MAX_MESSAGE_CHARS`], ending in "..." when shortened.
pub fn truncate_message(text: &str) -> String {
    if text.chars().count() <= MAX_MESSAGE_CHARS {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(MAX_MESSAGE_CHARS - 3).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::FixedClock;

    fn delivery() -> (
        ChatDelivery,
        mpsc::UnboundedReceiver<ChatMessage>,
        Arc<FixedClock>,
    ) {
        let clock = Arc::new(FixedClock::at(Utc::now()));
        let (delivery, inbox) = ChatDelivery::new(clock.clone());
        (delivery, inbox, clock)
    }

    #[test]
    fn short_messages_are_untouched() {
        assert_eq!(truncate_message("Good morning!"), "Good morning!");
    }

    #[test]
    fn long_messages_are_cut_with_ellipsis() {
        let text = "a".repeat(250);

        let cut = truncate_message(&text);

        assert_eq!(cut.chars().count(), MAX_MESSAGE_CHARS);
        assert!(cut.ends_with("..."));
    }

    #[tokio::test]
    async fn delivers_to_initiator() {
        let (delivery, mut inbox, _) = delivery();
        let villager = EntityId::new();
        let player = Initiator::new(EntityId::new(), "Steve");

        delivery.deliver(villager, &player, "[Alder] Hello").await.expect("deliver");

        let message = inbox.recv().await.expect("message");
        assert_eq!(message.from, villager);
        assert_eq!(message.to, player.id);
        assert_eq!(message.text, "[Alder] Hello");
    }

    #[tokio::test]
    async fn same_villager_is_rate_limited() {
        let (delivery, mut inbox, clock) = delivery();
        let villager = EntityId::new();
        let player = Initiator::new(EntityId::new(), "Steve");

        delivery.deliver(villager, &player, "first").await.expect("deliver");
        delivery.deliver(villager, &player, "dropped").await.expect("deliver");
        clock.advance(chrono::Duration::seconds(VILLAGER_MESSAGE_INTERVAL_SECS));
        delivery.deliver(villager, &player, "third").await.expect("deliver");

        assert_eq!(inbox.recv().await.expect("first").text, "first");
        assert_eq!(inbox.recv().await.expect("third").text, "third");
        assert!(inbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn different_villagers_are_independent() {
        let (delivery, mut inbox, _) = delivery();
        let player = Initiator::new(EntityId::new(), "Steve");

        delivery.deliver(EntityId::new(), &player, "one").await.expect("deliver");
        delivery.deliver(EntityId::new(), &player, "two").await.expect("deliver");

        assert_eq!(inbox.recv().await.expect("one").text, "one");
        assert_eq!(inbox.recv().await.expect("two").text, "two");
    }

    #[tokio::test]
    async fn closed_channel_is_a_delivery_error() {
        let (delivery, inbox, _) = delivery();
        drop(inbox);
        let player = Initiator::new(EntityId::new(), "Steve");

        let result = delivery.deliver(EntityId::new(), &player, "hello").await;

        assert!(matches!(result, Err(CollaboratorError::Delivery(_))));
    }
}
