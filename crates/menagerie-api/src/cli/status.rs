//! `mnge status` - database and configuration overview.

use comfy_table::{presets::UTF8_FULL, Table};
use sqlx::Row;

use crate::state::AppState;

/// Print row counts for the main tables plus the resolved config.
pub async fn status(state: &AppState, json: bool) -> anyhow::Result<()> {
    let mut counts = Vec::new();
    for table in [
        "animals",
        "personalities",
        "guardrails",
        "assistants",
        "sandbox_assistants",
        "conversation_sessions",
        "conversation_turns",
    ] {
        let row = sqlx::query(&format!("SELECT COUNT(*) AS cnt FROM {table}"))
            .fetch_one(&state.db_pool.reader)
            .await?;
        let count: i64 = row.try_get("cnt")?;
        counts.push((table, count));
    }

    if json {
        let map: serde_json::Map<String, serde_json::Value> = counts
            .iter()
            .map(|(table, count)| (table.to_string(), serde_json::json!(count)))
            .collect();
        let out = serde_json::json!({
            "data_dir": state.data_dir,
            "generator_url": state.config.generator.base_url,
            "counts": map,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Menagerie at {}",
        console::style("◆").cyan(),
        console::style(state.data_dir.display()).dim()
    );
    println!(
        "  generator: {}",
        console::style(&state.config.generator.base_url).dim()
    );
    println!();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["table", "rows"]);
    for (name, count) in counts {
        table.add_row(vec![name.to_string(), count.to_string()]);
    }
    println!("{table}");
    Ok(())
}
