//! Terminal user presence gate.
//!
//! A console cannot read a fingerprint, so the gate asks the user at the
//! terminal to confirm the binding instead. It reports itself unavailable
//! when stdin or stderr is not a terminal, which turns gated requests into
//! an unsupported outcome in scripts.

use std::io::{IsTerminal, Write};

use async_trait::async_trait;
use colored::Colorize;
use devbind_core::{GateMode, GateOutcome, Prompt, UserPresenceGate};
use tracing::debug;

pub struct ConsoleGate {
    interactive: bool,
}

impl ConsoleGate {
    pub fn detect() -> Self {
        Self {
            interactive: std::io::stdin().is_terminal() && std::io::stderr().is_terminal(),
        }
    }
}

#[async_trait]
impl UserPresenceGate for ConsoleGate {
    fn is_available(&self, _mode: GateMode) -> bool {
        self.interactive
    }

    async fn authenticate(&self, prompt: &Prompt, mode: GateMode) -> GateOutcome {
        let mut stderr = std::io::stderr();
        let _ = writeln!(stderr);
        let _ = writeln!(stderr, "{}", prompt.title.bold());
        if !prompt.subtitle.is_empty() {
            let _ = writeln!(stderr, "{}", prompt.subtitle);
        }
        if !prompt.description.is_empty() {
            let _ = writeln!(stderr, "{}", prompt.description.dimmed());
        }
        let _ = write!(stderr, "Confirm binding of this device? [y/N] ");
        let _ = stderr.flush();

        debug!(mode = ?mode, "Waiting for console confirmation");
        let answer = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|read| (read, line))
        })
        .await;

        match answer {
            Ok(Ok((0, _))) => GateOutcome::Cancelled,
            Ok(Ok((_, line))) => match line.trim().to_lowercase().as_str() {
                "y" | "yes" => GateOutcome::Granted,
                "" => GateOutcome::Cancelled,
                _ => GateOutcome::Failed("user declined".into()),
            },
            Ok(Err(e)) => GateOutcome::Failed(format!("cannot read confirmation: {e}")),
            Err(e) => GateOutcome::Failed(format!("confirmation task failed: {e}")),
        }
    }
}
