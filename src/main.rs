// Demo wiring for the safety and ingestion core: in-memory policy, a handful
// of sample messages, and a clean shutdown of the gate.

use anyhow::Result;
use chrono::Utc;
use log::info;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chatguard::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("Starting chatguard v{} demo", chatguard::VERSION);

    // =================================================================
    // CONFIGURATION
    // =================================================================

    let config = CoreConfig::load(Path::new("config/chatguard.yaml")).await?;

    // =================================================================
    // POLICY AND PROFILE STORES (in-memory for the demo)
    // =================================================================

    let policy = Arc::new(InMemoryPolicyStore::new());
    policy
        .set_global(BanWordPolicy::new(
            vec!["idiot".to_string()],
            vec!["kys".to_string()],
        ))
        .await;
    policy
        .set_replacements(HashMap::from([
            ("1".to_string(), "i".to_string()),
            ("@".to_string(), "a".to_string()),
            ("0".to_string(), "o".to_string()),
        ]))
        .await;

    let profiles = Arc::new(InMemoryUserProfileStore::new());
    let templates = Arc::new(StaticTemplates::default());

    // =================================================================
    // PIPELINE ASSEMBLY
    // =================================================================

    let checker = Arc::new(SafetyChecker::new(policy));
    let afk = Arc::new(AfkLifecycle::new(
        profiles,
        templates,
        Arc::clone(&checker),
        config.afk.clone(),
    ));
    let gate = Arc::new(UserGate::new(config.gate.clone()));
    let sweeper = gate.spawn_sweeper();
    let processor = MessageProcessor::new(Arc::clone(&gate), afk, checker);

    // =================================================================
    // SAMPLE TRAFFIC
    // =================================================================

    processor
        .afk()
        .begin("42", AfkKind::Afk, "grabbing coffee".to_string())
        .await?;

    let samples = [
        ("42", "back at the keyboard"),
        ("7", "hello world"),
        ("7", "you are an 1diot"),
    ];

    for (user_id, content) in samples {
        let message = ChatMessage {
            platform: Platform::Twitch,
            channel: "demo".to_string(),
            user_id: user_id.to_string(),
            username: format!("user{}", user_id),
            content: content.to_string(),
            timestamp: Utc::now(),
        };

        let verdict = processor
            .check_outbound(&message.content, message.platform, &message.channel)
            .await;
        info!(
            "'{}' -> passed={} stage={:?} word={:?}",
            content,
            verdict.passed(),
            verdict.failed_stage(),
            verdict.matched_word()
        );

        if let Some(welcome_back) = processor.process_message(&message).await? {
            info!("welcome back line: {}", welcome_back);
        }
    }

    info!("pipeline stats: {}", processor.stats().snapshot());

    gate.shutdown();
    sweeper.await?;
    info!("chatguard demo complete");
    Ok(())
}
