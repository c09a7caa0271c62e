//! Conversation router.
//!
//! Each villager gets a lane: a single worker task that applies finished
//! turns in the order they were routed. Model calls for the same villager
//! still run concurrently; only the memory append and delivery wait their
//! turn. A lane with nothing to do for [`LANE_IDLE_TIMEOUT`] is retired
//! and reopened on the next turn for that villager.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use villagemind_domain::{EntityId, Position};

use super::prompt::{build_prompt, format_reply, CONVERSATION_MAX_TOKENS, CONVERSATION_TEMPERATURE};
use crate::infrastructure::ports::{
    BrainPort, ClockPort, DeliveryPort, Initiator, LlmPort, ProviderProfile, ProximityPort,
};

/// Radius, in blocks, within which villagers overhear a player.
pub const CONVERSATION_RANGE: f64 = 8.0;

/// How long a villager's lane waits for another turn before it is retired.
pub const LANE_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// What became of a routed turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Memory was updated and the formatted line delivered.
    Delivered { reply: String },
    /// No usable answer; nothing was changed.
    Silent,
}

/// Handle to a routed turn. Dropping it does not cancel the turn.
pub struct TurnTicket {
    subject: EntityId,
    done: oneshot::Receiver<TurnOutcome>,
}

impl TurnTicket {
    pub fn subject(&self) -> EntityId {
        self.subject
    }

    pub async fn outcome(self) -> TurnOutcome {
        self.done.await.unwrap_or(TurnOutcome::Silent)
    }
}

/// A turn waiting in its villager's lane.
struct PendingTurn {
    initiator: Initiator,
    text: String,
    reply: oneshot::Receiver<Option<String>>,
    done: oneshot::Sender<TurnOutcome>,
}

/// Sending side of a villager's lane.
struct Lane {
    id: u64,
    turns: mpsc::UnboundedSender<PendingTurn>,
}

type Lanes = DashMap<EntityId, Lane>;

/// Collaborators shared by the router and its lane workers.
struct RouterContext {
    llm: Arc<dyn LlmPort>,
    brains: Arc<dyn BrainPort>,
    delivery: Arc<dyn DeliveryPort>,
    clock: Arc<dyn ClockPort>,
    profile: ProviderProfile,
}

pub struct ConversationRouter {
    ctx: Arc<RouterContext>,
    proximity: Arc<dyn ProximityPort>,
    lanes: Arc<Lanes>,
    next_lane_id: AtomicU64,
    tasks: TaskTracker,
    shutdown: CancellationToken,
}

impl ConversationRouter {
    pub fn new(
        llm: Arc<dyn LlmPort>,
        brains: Arc<dyn BrainPort>,
        delivery: Arc<dyn DeliveryPort>,
        proximity: Arc<dyn ProximityPort>,
        clock: Arc<dyn ClockPort>,
        profile: ProviderProfile,
    ) -> Self {
        Self {
            ctx: Arc::new(RouterContext {
                llm,
                brains,
                delivery,
                clock,
                profile,
            }),
            proximity,
            lanes: Arc::new(DashMap::new()),
            next_lane_id: AtomicU64::new(0),
            tasks: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Route `text` from `initiator` to the villager `subject`.
    ///
    /// Returns at once. Turns routed to the same villager are applied in
    /// call order; different villagers proceed independently.
    pub fn route(&self, initiator: Initiator, subject: EntityId, text: impl Into<String>) -> TurnTicket {
        let text = text.into();
        let (done_tx, done_rx) = oneshot::channel();
        let ticket = TurnTicket {
            subject,
            done: done_rx,
        };

        if self.shutdown.is_cancelled() {
            tracing::debug!(villager = %subject, "Router shut down, dropping turn");
            let _ = done_tx.send(TurnOutcome::Silent);
            return ticket;
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        self.spawn_generation(initiator.clone(), subject, text.clone(), reply_tx);

        let turn = PendingTurn {
            initiator,
            text,
            reply: reply_rx,
            done: done_tx,
        };
        self.enqueue(subject, turn);
        ticket
    }

    /// Route `text` to every villager within [`CONVERSATION_RANGE`] of `position`.
    pub async fn route_nearby(
        &self,
        initiator: Initiator,
        position: Position,
        text: &str,
    ) -> Vec<TurnTicket> {
        let nearby = self.proximity.find_nearby(position, CONVERSATION_RANGE).await;
        tracing::debug!(
            initiator = %initiator.name,
            villagers = nearby.len(),
            "Routing message to nearby villagers"
        );
        nearby
            .into_iter()
            .filter(|villager| *villager != initiator.id)
            .map(|villager| self.route(initiator.clone(), villager, text))
            .collect()
    }

    /// Stop all lanes and wait for in-flight work to finish or abort.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.lanes.clear();
        self.tasks.close();
        self.tasks.wait().await;
        tracing::info!("Conversation router stopped");
    }

    /// Queue `turn` on the villager's lane, opening one if needed.
    ///
    /// The send happens while the lane entry is held, so it cannot interleave
    /// with the lane retiring itself.
    fn enqueue(&self, subject: EntityId, turn: PendingTurn) {
        let lane = self.lanes.entry(subject).or_insert_with(|| self.open_lane(subject));
        if let Err(mpsc::error::SendError(turn)) = lane.turns.send(turn) {
            // Lane worker already gone (shutdown raced this call)
            let _ = turn.done.send(TurnOutcome::Silent);
        }
    }

    fn open_lane(&self, subject: EntityId) -> Lane {
        let id = self.next_lane_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = LaneWorker {
            ctx: Arc::clone(&self.ctx),
            lanes: Arc::clone(&self.lanes),
            subject,
            id,
        };
        self.tasks.spawn(worker.run(rx, self.shutdown.clone()));
        tracing::trace!(villager = %subject, lane = id, "Opened conversation lane");
        Lane { id, turns: tx }
    }

    fn spawn_generation(
        &self,
        initiator: Initiator,
        subject: EntityId,
        text: String,
        reply: oneshot::Sender<Option<String>>,
    ) {
        let ctx = Arc::clone(&self.ctx);
        let shutdown = self.shutdown.clone();
        self.tasks.spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                answer = generate_reply(&ctx, &initiator, subject, &text) => {
                    let _ = reply.send(answer);
                }
            }
        });
    }
}

async fn generate_reply(
    ctx: &RouterContext,
    initiator: &Initiator,
    subject: EntityId,
    text: &str,
) -> Option<String> {
    let brain = match ctx.brains.load_brain(subject).await {
        Ok(Some(brain)) => brain,
        Ok(None) => {
            tracing::warn!(villager = %subject, "No brain for villager, ignoring message");
            return None;
        }
        Err(e) => {
            tracing::warn!(villager = %subject, error = %e, "Failed to load villager brain");
            return None;
        }
    };

    let request = match ctx
        .profile
        .request(build_prompt(&brain, initiator, text))
        .max_tokens(CONVERSATION_MAX_TOKENS)
        .temperature(CONVERSATION_TEMPERATURE)
        .build()
    {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(villager = %subject, error = %e, "Could not build conversation request");
            return None;
        }
    };

    let response = ctx.llm.generate(request).await;
    match response.usable_text() {
        Some(reply) => Some(reply.to_string()),
        None => {
            match response.failure() {
                Some(error) => tracing::debug!(villager = %subject, error = %error, "No reply from model"),
                None => tracing::debug!(villager = %subject, "Model returned an empty reply"),
            }
            None
        }
    }
}

struct LaneWorker {
    ctx: Arc<RouterContext>,
    lanes: Arc<Lanes>,
    subject: EntityId,
    id: u64,
}

impl LaneWorker {
    /// Drop this lane from the map if nothing is queued on it.
    fn retire(&self, turns: &mpsc::UnboundedReceiver<PendingTurn>) -> bool {
        self.lanes
            .remove_if(&self.subject, |_, lane| lane.id == self.id && turns.is_empty())
            .is_some()
    }

    async fn run(self, mut turns: mpsc::UnboundedReceiver<PendingTurn>, shutdown: CancellationToken) {
        let ctx = &self.ctx;
        let subject = self.subject;
        loop {
            let turn = tokio::select! {
                _ = shutdown.cancelled() => break,
                turn = turns.recv() => match turn {
                    Some(turn) => turn,
                    None => break,
                },
                _ = tokio::time::sleep(LANE_IDLE_TIMEOUT) => {
                    if self.retire(&turns) {
                        tracing::debug!(villager = %subject, lane = self.id, "Retired idle conversation lane");
                        break;
                    }
                    continue;
                }
            };

            let reply = tokio::select! {
                _ = shutdown.cancelled() => {
                    let _ = turn.done.send(TurnOutcome::Silent);
                    break;
                }
                reply = turn.reply => reply.ok().flatten(),
            };

            let outcome = match reply {
                Some(reply) => apply_turn(ctx, subject, &turn.initiator, &turn.text, reply).await,
                None => TurnOutcome::Silent,
            };
            let _ = turn.done.send(outcome);
        }

        // Anything still queued is answered so no ticket waits forever
        while let Ok(turn) = turns.try_recv() {
            let _ = turn.done.send(TurnOutcome::Silent);
        }
    }
}

/// Append, persist, then deliver. Stops at the first failing step.
async fn apply_turn(
    ctx: &RouterContext,
    subject: EntityId,
    initiator: &Initiator,
    text: &str,
    reply: String,
) -> TurnOutcome {
    // Reload so earlier turns in this lane are seen
    let mut brain = match ctx.brains.load_brain(subject).await {
        Ok(Some(brain)) => brain,
        Ok(None) => {
            tracing::warn!(villager = %subject, "Villager brain vanished before reply was applied");
            return TurnOutcome::Silent;
        }
        Err(e) => {
            tracing::warn!(villager = %subject, error = %e, "Failed to reload villager brain");
            return TurnOutcome::Silent;
        }
    };

    brain.add_interaction(initiator.id, initiator.name.clone(), text, reply.clone(), ctx.clock.now());
    if let Err(e) = ctx.brains.save_brain(&brain).await {
        tracing::warn!(villager = %subject, error = %e, "Failed to save villager memory");
        return TurnOutcome::Silent;
    }

    let line = format_reply(brain.name(), &reply);
    if let Err(e) = ctx.delivery.deliver(subject, initiator, &line).await {
        tracing::warn!(villager = %subject, error = %e, "Failed to deliver villager reply");
        return TurnOutcome::Silent;
    }

    tracing::debug!(villager = %subject, initiator = %initiator.name, "Conversation turn delivered");
    TurnOutcome::Delivered { reply }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use villagemind_domain::VillagerBrain;

    use crate::infrastructure::clock::FixedClock;
    use crate::infrastructure::memory::{InMemoryBrainStore, InMemoryProximity};
    use crate::infrastructure::ports::{
        CollaboratorError, ConversationRequest, ConversationResponse, LlmError, MockBrainPort,
        MockLlmPort, Provider,
    };

    /// Answers with the quoted player text upper-cased, after a delay
    /// chosen by the text itself ("slow ..." takes longer).
    struct EchoLlm;

    #[async_trait]
    impl LlmPort for EchoLlm {
        async fn generate(&self, request: ConversationRequest) -> ConversationResponse {
            let said = request
                .prompt()
                .split("says: \"")
                .nth(1)
                .and_then(|rest| rest.split('"').next())
                .unwrap_or_default()
                .to_string();
            let delay = if said.starts_with("slow") { 200 } else { 10 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            ConversationResponse::Success {
                text: said.to_uppercase(),
                tokens_used: 3,
                latency_ms: delay,
            }
        }
    }

    #[derive(Default)]
    struct RecordingDelivery {
        lines: Mutex<Vec<(EntityId, String)>>,
    }

    impl RecordingDelivery {
        fn lines(&self) -> Vec<(EntityId, String)> {
            self.lines.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl DeliveryPort for RecordingDelivery {
        async fn deliver(
            &self,
            subject: EntityId,
            _initiator: &Initiator,
            text: &str,
        ) -> Result<(), CollaboratorError> {
            self.lines.lock().expect("lock").push((subject, text.to_string()));
            Ok(())
        }
    }

    struct Harness {
        router: ConversationRouter,
        brains: Arc<InMemoryBrainStore>,
        delivery: Arc<RecordingDelivery>,
        proximity: Arc<InMemoryProximity>,
    }

    fn harness(llm: Arc<dyn LlmPort>) -> Harness {
        let brains = Arc::new(InMemoryBrainStore::new());
        let delivery = Arc::new(RecordingDelivery::default());
        let proximity = Arc::new(InMemoryProximity::new());
        let router = ConversationRouter::new(
            llm,
            brains.clone(),
            delivery.clone(),
            proximity.clone(),
            Arc::new(FixedClock::at(Utc::now())),
            ProviderProfile::new(Provider::Local, ""),
        );
        Harness {
            router,
            brains,
            delivery,
            proximity,
        }
    }

    fn villager(h: &Harness, name: &str) -> EntityId {
        let brain = VillagerBrain::new(EntityId::new(), name, "farmer");
        let id = brain.id();
        h.brains.insert(brain);
        id
    }

    fn steve() -> Initiator {
        Initiator::new(EntityId::new(), "Steve")
    }

    fn remembered(h: &Harness, id: EntityId) -> Vec<String> {
        h.brains
            .get(id)
            .map(|brain| brain.memory().iter().map(|i| i.message.clone()).collect())
            .unwrap_or_default()
    }

    #[tokio::test(start_paused = true)]
    async fn successful_turn_updates_memory_and_delivers() {
        let h = harness(Arc::new(EchoLlm));
        let alder = villager(&h, "Alder");

        let outcome = h.router.route(steve(), alder, "hello").outcome().await;

        assert_eq!(outcome, TurnOutcome::Delivered { reply: "HELLO".into() });
        assert_eq!(remembered(&h, alder), vec!["hello"]);
        assert_eq!(h.delivery.lines(), vec![(alder, "[Alder] HELLO".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn same_villager_turns_apply_in_dispatch_order() {
        let h = harness(Arc::new(EchoLlm));
        let alder = villager(&h, "Alder");

        let first = h.router.route(steve(), alder, "slow greeting");
        let second = h.router.route(steve(), alder, "quick question");
        let (first, second) = tokio::join!(first.outcome(), second.outcome());

        assert!(matches!(first, TurnOutcome::Delivered { .. }));
        assert!(matches!(second, TurnOutcome::Delivered { .. }));
        assert_eq!(remembered(&h, alder), vec!["slow greeting", "quick question"]);
        let delivered: Vec<String> = h.delivery.lines().into_iter().map(|(_, line)| line).collect();
        assert_eq!(delivered, vec!["[Alder] SLOW GREETING", "[Alder] QUICK QUESTION"]);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_lane_is_retired_and_reopened_in_order() {
        let h = harness(Arc::new(EchoLlm));
        let alder = villager(&h, "Alder");

        h.router.route(steve(), alder, "morning").outcome().await;
        assert_eq!(h.router.lanes.len(), 1);

        tokio::time::sleep(LANE_IDLE_TIMEOUT + Duration::from_secs(1)).await;
        assert!(h.router.lanes.is_empty());

        let first = h.router.route(steve(), alder, "slow evening");
        let second = h.router.route(steve(), alder, "goodnight");
        assert_eq!(h.router.lanes.len(), 1);
        let (first, second) = tokio::join!(first.outcome(), second.outcome());

        assert!(matches!(first, TurnOutcome::Delivered { .. }));
        assert!(matches!(second, TurnOutcome::Delivered { .. }));
        assert_eq!(remembered(&h, alder), vec!["morning", "slow evening", "goodnight"]);
    }

    #[tokio::test(start_paused = true)]
    async fn busy_lane_is_not_retired() {
        let h = harness(Arc::new(EchoLlm));
        let alder = villager(&h, "Alder");

        for _ in 0..3 {
            tokio::time::sleep(LANE_IDLE_TIMEOUT / 2).await;
            h.router.route(steve(), alder, "still here").outcome().await;
            assert_eq!(h.router.lanes.len(), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn different_villagers_do_not_wait_for_each_other() {
        let h = harness(Arc::new(EchoLlm));
        let alder = villager(&h, "Alder");
        let birch = villager(&h, "Birch");

        let slow = h.router.route(steve(), alder, "slow story");
        let fast = h.router.route(steve(), birch, "hi");

        assert!(matches!(fast.outcome().await, TurnOutcome::Delivered { .. }));
        assert!(remembered(&h, alder).is_empty());
        assert!(matches!(slow.outcome().await, TurnOutcome::Delivered { .. }));
        assert_eq!(remembered(&h, alder), vec!["slow story"]);
    }

    #[tokio::test]
    async fn failed_generation_is_silent() {
        let mut llm = MockLlmPort::new();
        llm.expect_generate().returning(|_| {
            ConversationResponse::Failure(LlmError::RetriesExhausted {
                attempts: 4,
                last: Box::new(LlmError::RateLimited("Rate limit exceeded".into())),
            })
        });
        let h = harness(Arc::new(llm));
        let alder = villager(&h, "Alder");

        let outcome = h.router.route(steve(), alder, "hello").outcome().await;

        assert_eq!(outcome, TurnOutcome::Silent);
        assert!(remembered(&h, alder).is_empty());
        assert!(h.delivery.lines().is_empty());
    }

    #[tokio::test]
    async fn blank_reply_is_silent() {
        let mut llm = MockLlmPort::new();
        llm.expect_generate().returning(|_| ConversationResponse::Success {
            text: "   ".into(),
            tokens_used: 0,
            latency_ms: 1,
        });
        let h = harness(Arc::new(llm));
        let alder = villager(&h, "Alder");

        let outcome = h.router.route(steve(), alder, "hello").outcome().await;

        assert_eq!(outcome, TurnOutcome::Silent);
        assert!(h.delivery.lines().is_empty());
    }

    #[tokio::test]
    async fn request_uses_dialogue_budget() {
        let mut llm = MockLlmPort::new();
        llm.expect_generate()
            .withf(|request| {
                request.max_tokens() == CONVERSATION_MAX_TOKENS
                    && (request.temperature() - CONVERSATION_TEMPERATURE).abs() < f32::EPSILON
                    && request.prompt().contains("Player Steve says: \"hello\"")
            })
            .times(1)
            .returning(|_| ConversationResponse::Success {
                text: "Hi.".into(),
                tokens_used: 1,
                latency_ms: 1,
            });
        let h = harness(Arc::new(llm));
        let alder = villager(&h, "Alder");

        let outcome = h.router.route(steve(), alder, "hello").outcome().await;

        assert_eq!(outcome, TurnOutcome::Delivered { reply: "Hi.".into() });
    }

    #[tokio::test]
    async fn unknown_villager_is_silent() {
        let h = harness(Arc::new(EchoLlm));

        let outcome = h.router.route(steve(), EntityId::new(), "hello").outcome().await;

        assert_eq!(outcome, TurnOutcome::Silent);
    }

    #[tokio::test]
    async fn save_failure_skips_delivery() {
        let alder = VillagerBrain::new(EntityId::new(), "Alder", "farmer");
        let alder_id = alder.id();
        let mut brains = MockBrainPort::new();
        brains
            .expect_load_brain()
            .returning(move |_| Ok(Some(alder.clone())));
        brains
            .expect_save_brain()
            .returning(|_| Err(CollaboratorError::storage("save_brain", "disk full")));
        let delivery = Arc::new(RecordingDelivery::default());
        let router = ConversationRouter::new(
            Arc::new(EchoLlm),
            Arc::new(brains),
            delivery.clone(),
            Arc::new(InMemoryProximity::new()),
            Arc::new(FixedClock::at(Utc::now())),
            ProviderProfile::new(Provider::Local, ""),
        );

        let outcome = router.route(steve(), alder_id, "hello").outcome().await;

        assert_eq!(outcome, TurnOutcome::Silent);
        assert!(delivery.lines().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn route_nearby_reaches_villagers_in_range() {
        let h = harness(Arc::new(EchoLlm));
        let near = villager(&h, "Alder");
        let far = villager(&h, "Birch");
        h.proximity.place(near, Position::new(3.0, 0.0, 0.0));
        h.proximity.place(far, Position::new(50.0, 0.0, 0.0));

        let tickets = h
            .router
            .route_nearby(steve(), Position::new(0.0, 0.0, 0.0), "anyone there?")
            .await;

        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].subject(), near);
        for ticket in tickets {
            ticket.outcome().await;
        }
        assert_eq!(remembered(&h, near), vec!["anyone there?"]);
        assert!(remembered(&h, far).is_empty());
    }

    #[tokio::test]
    async fn routing_after_shutdown_is_silent() {
        let h = harness(Arc::new(EchoLlm));
        let alder = villager(&h, "Alder");

        h.router.shutdown().await;
        let outcome = h.router.route(steve(), alder, "hello").outcome().await;

        assert_eq!(outcome, TurnOutcome::Silent);
        assert!(remembered(&h, alder).is_empty());
    }
}
