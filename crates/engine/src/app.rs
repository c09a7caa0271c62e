//! Application state and composition.

use std::sync::Arc;

use crate::infrastructure::{
    app_settings::AppSettings,
    model_registry::ModelRegistry,
    ports::{BrainPort, ClockPort, DeliveryPort, LlmGateway, LlmPort, ProximityPort},
    rate_limit::RequestPacer,
    resilient_llm::RetryOrchestrator,
};
use crate::use_cases::{AiCombatEngine, AiTradePricer, ConversationRouter};

/// Main application state.
///
/// Built once by the host. Owns every cache and worker; nothing lives in
/// process-wide statics.
pub struct App {
    pub settings: AppSettings,
    pub llm: Arc<dyn LlmPort>,
    pub registry: Arc<ModelRegistry>,
    pub use_cases: UseCases,
}

/// Container for all use cases.
pub struct UseCases {
    pub conversation: Arc<ConversationRouter>,
    pub combat: Arc<AiCombatEngine>,
    pub trade: Arc<AiTradePricer>,
}

/// Host-game collaborators the core consumes.
pub struct Collaborators {
    pub brains: Arc<dyn BrainPort>,
    pub delivery: Arc<dyn DeliveryPort>,
    pub proximity: Arc<dyn ProximityPort>,
    pub clock: Arc<dyn ClockPort>,
}

impl App {
    pub fn new(settings: AppSettings, gateway: Arc<dyn LlmGateway>, collaborators: Collaborators) -> Self {
        let pacer = Arc::new(RequestPacer::new(settings.min_request_interval()));
        let retry_config = settings.retry_config();
        tracing::info!(
            provider = %settings.provider,
            max_retries = retry_config.max_retries,
            base_delay_ms = retry_config.base_delay_ms,
            "LLM client configured with retry"
        );
        let llm: Arc<dyn LlmPort> = Arc::new(RetryOrchestrator::new(
            Arc::clone(&gateway),
            pacer,
            retry_config,
        ));
        let registry = Arc::new(ModelRegistry::new(gateway));

        let profile = settings.profile();
        let conversation = Arc::new(ConversationRouter::new(
            Arc::clone(&llm),
            collaborators.brains,
            collaborators.delivery,
            collaborators.proximity,
            collaborators.clock,
            profile.clone(),
        ));
        let combat = Arc::new(AiCombatEngine::new(
            Arc::clone(&llm),
            profile.clone(),
            settings.combat_ai_timeout(),
        ));
        let trade = Arc::new(AiTradePricer::new(Arc::clone(&llm), profile));

        Self {
            settings,
            llm,
            registry,
            use_cases: UseCases {
                conversation,
                combat,
                trade,
            },
        }
    }

    /// Stop background workers and drop cached state.
    pub async fn shutdown(&self) {
        self.use_cases.conversation.shutdown().await;
        self.use_cases.combat.clear_cache();
        tracing::info!("Engine shut down");
    }
}
