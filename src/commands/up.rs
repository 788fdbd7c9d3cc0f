//! Bring an agent's sandbox up, reusing the recorded one when possible.

use anyhow::Result;
use colored::Colorize;
use std::fmt::Write;

use super::Context;
use crate::session::Session;

/// What `berth up` did, for display.
#[derive(Debug, Clone, PartialEq, Eq)]
struct UpReport {
    agent: String,
    sandbox_id: String,
    image: String,
    state: String,
    fingerprint: String,
    reusing: bool,
    persisted: bool,
}

impl UpReport {
    fn new(session: &Session, reusing: bool, persisted: bool) -> Self {
        Self {
            agent: session.agent().name.clone(),
            sandbox_id: session.sandbox_id().to_string(),
            image: session.agent().config.image.clone(),
            state: session.sandbox().state.to_string(),
            fingerprint: session.fingerprint().short().to_string(),
            reusing,
            persisted,
        }
    }
}

/// Runs the up command.
pub async fn run(ctx: &Context, agent_name: &str, persist: bool) -> Result<()> {
    let manager = ctx.manager().await?;
    let (session, reusing) = manager
        .create_or_reuse(agent_name, &ctx.config.agent, persist)
        .await?;

    print!("{}", format_report(&UpReport::new(&session, reusing, persist)));
    Ok(())
}

fn format_report(report: &UpReport) -> String {
    let mut out = String::new();
    let verb = if report.reusing {
        "Reusing sandbox"
    } else {
        "Created sandbox"
    };

    writeln!(
        &mut out,
        "\n{} {} for agent {}",
        "✓".green(),
        verb,
        report.agent.cyan().bold()
    )
    .unwrap();
    writeln!(&mut out, "  Sandbox:      {}", report.sandbox_id.cyan()).unwrap();
    writeln!(&mut out, "  Image:        {}", report.image).unwrap();
    writeln!(&mut out, "  State:        {}", report.state.green()).unwrap();
    writeln!(&mut out, "  Fingerprint:  {}", report.fingerprint.dimmed()).unwrap();
    if !report.persisted {
        writeln!(
            &mut out,
            "  {} ephemeral session, nothing was recorded",
            "ℹ".blue()
        )
        .unwrap();
    }
    out
}
