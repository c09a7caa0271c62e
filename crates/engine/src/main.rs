//! VillageMind Engine - interactive demo.
//!
//! Reads lines from stdin and says them to a villager standing next to the
//! player, printing whatever the villager answers.

use std::sync::Arc;

use futures_util::future::join_all;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use villagemind_domain::{EntityId, Mood, Position, VillagerBrain};

use villagemind_engine::infrastructure::{
    app_settings::AppSettings,
    clock::SystemClock,
    delivery::ChatDelivery,
    gateway::HttpGateway,
    memory::{InMemoryBrainStore, InMemoryProximity},
    ports::{ClockPort, Initiator},
};
use villagemind_engine::use_cases::TurnOutcome;
use villagemind_engine::{App, Collaborators};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from repo root (the binary may run from `crates/engine`).
    load_dotenv_from_repo_root();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "villagemind_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting VillageMind Engine");

    let settings = AppSettings::from_env();

    let mut gateway = HttpGateway::new();
    for (provider, url) in &settings.base_urls {
        tracing::info!(provider = %provider, url = %url, "Using custom provider URL");
        gateway = gateway.with_base_url(*provider, url);
    }

    let clock: Arc<dyn ClockPort> = Arc::new(SystemClock::new());
    let brains = Arc::new(InMemoryBrainStore::new());
    let proximity = Arc::new(InMemoryProximity::new());
    let (delivery, mut chat) = ChatDelivery::new(Arc::clone(&clock));

    let villager = VillagerBrain::new(EntityId::new(), "Alder", "farmer")
        .with_personality("warm, talkative and a little nosy")
        .with_mood(Mood::Content);
    proximity.place(villager.id(), Position::new(2.0, 0.0, 1.0));
    brains.insert(villager);

    let app = App::new(
        settings,
        Arc::new(gateway),
        Collaborators {
            brains,
            delivery: Arc::new(delivery),
            proximity,
            clock,
        },
    );

    report_provider(&app).await;

    // Print chat lines as they arrive
    let printer = tokio::spawn(async move {
        while let Some(message) = chat.recv().await {
            println!("{}", message.text);
        }
    });

    let player = Initiator::new(EntityId::new(), "Player");
    let here = Position::new(0.0, 0.0, 0.0);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Say something to the villagers (/quit to exit).");
    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text == "/quit" {
            break;
        }

        let tickets = app
            .use_cases
            .conversation
            .route_nearby(player.clone(), here, text)
            .await;
        if tickets.is_empty() {
            println!("(nobody is close enough to hear you)");
        }
        let outcomes = join_all(tickets.into_iter().map(|ticket| ticket.outcome())).await;
        for outcome in outcomes {
            if outcome == TurnOutcome::Silent {
                println!("(the villager stares at you blankly)");
            }
        }
    }

    app.shutdown().await;
    drop(app);
    let _ = printer.await;
    Ok(())
}

async fn report_provider(app: &App) {
    let provider = app.settings.provider;
    let tier = app.settings.hardware_tier;

    if !app.registry.validate_key_format(provider, &app.settings.api_key) {
        tracing::warn!(provider = %provider, "API key does not look valid for provider");
    }

    let compatibility = app.registry.check_compatibility(provider, tier);
    tracing::info!(provider = %provider, tier = ?tier, compatibility = ?compatibility, "Provider compatibility");

    let models = app
        .registry
        .fetch_dynamic_models(provider, &app.settings.api_key)
        .await;
    let recommendation = app.registry.recommend(provider, tier);
    tracing::info!(
        available = models.len(),
        recommended = ?recommendation.models,
        rationale = recommendation.rationale,
        "Model recommendation"
    );
    for warning in recommendation.warnings {
        tracing::warn!(warning, "Model recommendation warning");
    }
}

fn load_dotenv_from_repo_root() {
    let repo_root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..");

    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let path = repo_root.join(filename);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}
