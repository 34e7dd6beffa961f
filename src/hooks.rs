//! Hook command execution.
//!
//! Transitions and end-of-stream are surfaced to the user as shell commands.
//! The monitor depends on the [`HookRunner`] capability rather than the shell
//! directly, so tests can substitute a recording stub.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;
use tracing::info;
use tracing::trace;
use tracing::warn;

/// The events a hook can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEvent {
    /// The stream went from IDLE to ACTIVE.
    Activated,
    /// The stream went from ACTIVE to IDLE.
    Idled,
    /// End of input was reached.
    Eof,
}

impl HookEvent {
    /// Event name for logging.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Activated => "idle-to-active",
            Self::Idled => "active-to-idle",
            Self::Eof => "eof",
        }
    }
}

/// Capability for running hook commands.
///
/// Fire-and-observe: implementations report nothing back to the monitor. A
/// failing hook must never abort the relay.
#[async_trait]
pub trait HookRunner: Send {
    /// Run the hook attached to `event`, if any, to completion.
    async fn run(&mut self, event: HookEvent);
}

/// Runs hooks through the host shell.
///
/// Commands inherit the process's standard streams and are awaited before the
/// polling loop resumes; a slow hook delays relaying. Exit status is logged
/// but never interpreted.
#[derive(Debug, Default)]
pub struct ShellHooks {
    on_activated: Option<String>,
    on_idled: Option<String>,
    on_eof: Option<String>,
    dry_run: bool,
}

impl ShellHooks {
    /// Create a runner with the configured command strings.
    pub fn new(
        on_activated: Option<String>,
        on_idled: Option<String>,
        on_eof: Option<String>,
        dry_run: bool,
    ) -> Self {
        Self {
            on_activated,
            on_idled,
            on_eof,
            dry_run,
        }
    }

    fn command_for(&self, event: HookEvent) -> Option<&str> {
        match event {
            HookEvent::Activated => self.on_activated.as_deref(),
            HookEvent::Idled => self.on_idled.as_deref(),
            HookEvent::Eof => self.on_eof.as_deref(),
        }
    }
}

#[async_trait]
impl HookRunner for ShellHooks {
    async fn run(&mut self, event: HookEvent) {
        let Some(command) = self.command_for(event) else {
            trace!("No {} hook configured", event.as_str());
            return;
        };

        if self.dry_run {
            info!("[DRY RUN] Would run {} hook: {}", event.as_str(), command);
            return;
        }

        debug!("Running {} hook: {}", event.as_str(), command);

        let status = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => {
                trace!("{} hook succeeded", event.as_str());
            }
            Ok(status) => {
                warn!(
                    "{} hook exited with status {:?}",
                    event.as_str(),
                    status.code()
                );
            }
            Err(e) => {
                warn!("Failed to run {} hook: {}", event.as_str(), e);
            }
        }
    }
}
