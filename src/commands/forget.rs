//! Forget an agent's persisted session.
//!
//! Only the record is removed; the sandbox itself is left to the provider.
//! Forgetting an agent with no record is not an error.

use anyhow::{anyhow, Result};
use colored::Colorize;
use std::fmt::Write;

use super::Context;
use crate::session::{validate_agent_name, SessionRecord, SessionStore};

/// Runs the forget command.
pub async fn run(ctx: &Context, agent_name: &str) -> Result<()> {
    validate_agent_name(agent_name).map_err(|e| anyhow!(e))?;

    let _lock = ctx.store.lock(agent_name).await?;
    let existing = ctx.store.load(agent_name).await;
    ctx.store.delete(agent_name).await?;

    print!("{}", format_result(agent_name, existing.as_ref()));
    Ok(())
}

fn format_result(agent_name: &str, forgotten: Option<&SessionRecord>) -> String {
    let mut out = String::new();
    match forgotten {
        Some(record) => {
            writeln!(
                &mut out,
                "\n{} Forgot session for agent {}.",
                "✓".green(),
                agent_name.cyan()
            )
            .unwrap();
            writeln!(
                &mut out,
                "  Sandbox {} was not stopped.",
                record.sandbox_id.dimmed()
            )
            .unwrap();
        }
        None => {
            writeln!(
                &mut out,
                "\n{} No persisted session for agent {}.",
                "ℹ".blue(),
                agent_name.cyan()
            )
            .unwrap();
        }
    }
    out
}
