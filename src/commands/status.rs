use anyhow::{anyhow, Result};
use colored::Colorize;
use std::fmt::Write;

use super::Context;
use crate::session::{validate_agent_name, SessionRecord, SessionStore};

/// Runs the status command for one agent, or all of them.
pub async fn run(ctx: &Context, agent_name: Option<&str>) -> Result<()> {
    let output = match agent_name {
        Some(name) => {
            validate_agent_name(name).map_err(|e| anyhow!(e))?;
            format_record(name, ctx.store.load(name).await.as_ref())
        }
        None => format_list(&ctx.store.list().await?),
    };
    print!("{output}");
    Ok(())
}

fn format_timestamp(record_time: &chrono::DateTime<chrono::Utc>) -> String {
    record_time.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn format_record(agent_name: &str, record: Option<&SessionRecord>) -> String {
    let mut out = String::new();
    let Some(record) = record else {
        writeln!(
            &mut out,
            "\n{} No persisted session for agent {}.",
            "ℹ".blue(),
            agent_name.cyan()
        )
        .unwrap();
        return out;
    };

    writeln!(&mut out, "\n{}", "━".repeat(50).dimmed()).unwrap();
    writeln!(&mut out, "{}", format!("   Agent {}", record.agent_name).yellow().bold()).unwrap();
    writeln!(&mut out, "{}", "━".repeat(50).dimmed()).unwrap();
    writeln!(&mut out, "  Sandbox:      {}", record.sandbox_id.cyan()).unwrap();
    writeln!(
        &mut out,
        "  Fingerprint:  {}",
        record.fingerprint.short().to_string().dimmed()
    )
    .unwrap();
    writeln!(
        &mut out,
        "  Created:      {}",
        format_timestamp(&record.created_at).cyan()
    )
    .unwrap();
    writeln!(
        &mut out,
        "  Updated:      {}",
        format_timestamp(&record.updated_at).cyan()
    )
    .unwrap();
    writeln!(&mut out, "{}", "━".repeat(50).dimmed()).unwrap();
    out
}

fn format_list(records: &[SessionRecord]) -> String {
    let mut out = String::new();
    if records.is_empty() {
        writeln!(&mut out, "\n{} No persisted sessions.", "ℹ".blue()).unwrap();
        writeln!(&mut out, "  Run {} to start one.", "berth up <agent>".green()).unwrap();
        return out;
    }

    writeln!(&mut out, "\n{}", "Persisted sessions:".bold()).unwrap();
    for record in records {
        writeln!(
            &mut out,
            "  {:<24} {}  {}",
            record.agent_name.cyan(),
            record.sandbox_id,
            format_timestamp(&record.updated_at).dimmed()
        )
        .unwrap();
    }
    out
}
