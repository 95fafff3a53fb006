//! `mnge seed` - populate demo directory data for local development.
//!
//! Creates one animal (Bella the porcupine), a personality, a guardrail,
//! an active assistant wired from them, and an API key printed once to
//! stdout (only the hash is stored).

use menagerie_types::animal::CreateAnimalRequest;
use menagerie_types::assistant::CreateAssistantRequest;
use menagerie_types::guardrail::{CreateGuardrailRequest, GuardrailSeverity};
use menagerie_types::personality::CreatePersonalityRequest;

use crate::http::extractors::auth::hash_api_key;
use crate::state::AppState;

/// Seed demo data and print the generated API key.
pub async fn seed(state: &AppState, json: bool) -> anyhow::Result<()> {
    let animal = state
        .directory_service
        .create_animal(CreateAnimalRequest {
            name: "Bella".to_string(),
            species: "African crested porcupine".to_string(),
            active: true,
        })
        .await?;

    let personality = state
        .directory_service
        .create_personality(CreatePersonalityRequest {
            name: "gentle-storyteller".to_string(),
            description: "Warm and patient. Answers every question with a short \
                          story drawn from life in the savanna enclosure."
                .to_string(),
        })
        .await?;

    let guardrail = state
        .directory_service
        .create_guardrail(CreateGuardrailRequest {
            name: "family-strict".to_string(),
            rules: vec![
                "No scary or violent stories".to_string(),
                "Redirect off-topic questions back to animal facts".to_string(),
                "Never discuss visitors' personal information".to_string(),
            ],
            severity: GuardrailSeverity::Strict,
        })
        .await?;

    let assistant = state
        .assistant_service
        .create_assistant(CreateAssistantRequest {
            animal_id: animal.id,
            personality_id: personality.id,
            guardrail_id: guardrail.id,
            knowledge_ref_ids: vec!["kb-porcupine-quills".to_string()],
        })
        .await?;

    // API key: random token shown once; only its hash is stored.
    let api_key = format!("mnge_{}", uuid::Uuid::now_v7().simple());
    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query("INSERT INTO api_keys (id, name, key_hash, created_at) VALUES (?, ?, ?, ?)")
        .bind(uuid::Uuid::now_v7().to_string())
        .bind("seed")
        .bind(hash_api_key(&api_key))
        .bind(&now)
        .execute(&state.db_pool.writer)
        .await?;

    if json {
        let out = serde_json::json!({
            "animal_id": animal.id,
            "personality_id": personality.id,
            "guardrail_id": guardrail.id,
            "assistant_id": assistant.id,
            "api_key": api_key,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!("  {} Seeded demo data", console::style("✓").green());
    println!("    animal      {} ({})", animal.name, animal.id);
    println!("    personality {} ({})", personality.name, personality.id);
    println!("    guardrail   {} ({})", guardrail.name, guardrail.id);
    println!("    assistant   {}", assistant.id);
    println!();
    println!(
        "  {} API key (store it now, it is not shown again):",
        console::style("!").yellow()
    );
    println!("    {api_key}");
    Ok(())
}
