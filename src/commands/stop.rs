//! Stop an agent's recorded sandbox.
//!
//! The record is kept, so the next `berth up` can resume the sandbox.

use anyhow::{anyhow, Result};
use colored::Colorize;
use std::fmt::Write;

use super::Context;
use crate::session::validate_agent_name;

/// Runs the stop command.
pub async fn run(ctx: &Context, agent_name: &str) -> Result<()> {
    validate_agent_name(agent_name).map_err(|e| anyhow!(e))?;

    let manager = ctx.manager().await?;
    let stopped = manager.stop_persisted_sandbox(agent_name).await?;
    print!("{}", format_result(agent_name, stopped.as_deref()));
    Ok(())
}

fn format_result(agent_name: &str, stopped: Option<&str>) -> String {
    let mut out = String::new();
    match stopped {
        Some(sandbox_id) => {
            writeln!(
                &mut out,
                "\n{} Stopped sandbox {} for agent {}.",
                "✓".green(),
                sandbox_id.cyan(),
                agent_name.cyan()
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
