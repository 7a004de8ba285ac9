//! Bind command implementation.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use devbind_core::{
    BindingConfig, DeviceBinder, DeviceBindingCallback, DeviceIdentifierProvider, FileKeyStore,
    FixedGate, GateOutcome, MachineIdProvider, StaticDeviceId, UserPresenceGate,
};
use tracing::{debug, info, warn};

use crate::gate::ConsoleGate;
use crate::utils::read_input;

/// How the presence check is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Ask at the terminal
    Prompt,
    Grant,
    Deny,
    Cancel,
}

impl Presence {
    pub fn from_flags(yes: bool, deny: bool, cancel: bool) -> Self {
        match (yes, deny, cancel) {
            (true, _, _) => Self::Grant,
            (_, true, _) => Self::Deny,
            (_, _, true) => Self::Cancel,
            _ => Self::Prompt,
        }
    }

    fn gate(self) -> Arc<dyn UserPresenceGate> {
        match self {
            Self::Prompt => Arc::new(ConsoleGate::detect()),
            Self::Grant => Arc::new(FixedGate::granting()),
            Self::Deny => Arc::new(FixedGate::new(GateOutcome::Failed(
                "denied on the command line".into(),
            ))),
            Self::Cancel => Arc::new(FixedGate::new(GateOutcome::Cancelled)),
        }
    }
}

pub struct BindArgs {
    pub callback: PathBuf,
    pub output: Option<PathBuf>,
    pub device_name: Option<String>,
    pub device_id: Option<String>,
    pub store_dir: PathBuf,
    pub presence: Presence,
    pub quiet: bool,
}

/// Execute the bind command.
///
/// The response callback is emitted on success and on binding failure alike;
/// a failed binding carries its code in the `clientError` slot and sets the
/// exit status.
pub async fn execute(args: BindArgs) -> Result<()> {
    let json = read_input(&args.callback, "callback")?;
    let mut callback = DeviceBindingCallback::from_json(&json).context("Failed to parse callback")?;

    let request = callback.request();
    info!(
        authentication_type = %request.authentication_type,
        timeout_secs = ?request.timeout_secs,
        "Parsed callback"
    );
    if !args.quiet {
        eprintln!(
            "{} {} ({})",
            "Binding".cyan().bold(),
            request.user_name,
            request.authentication_type
        );
    }

    let store = FileKeyStore::open(&args.store_dir).with_context(|| {
        format!("Failed to open key store: {}", args.store_dir.display())
    })?;
    debug!(dir = %store.dir().display(), "Opened key store");

    let mut config = BindingConfig::from_env();
    if let Some(name) = args.device_name {
        config = config.with_device_name(name);
    }
    let device_ids: Arc<dyn DeviceIdentifierProvider> = match args.device_id {
        Some(id) => Arc::new(StaticDeviceId(id)),
        None => Arc::new(MachineIdProvider::new()),
    };
    if args.presence != Presence::Prompt {
        warn!(presence = ?args.presence, "Presence check answered from the command line");
    }

    let binder = DeviceBinder::new(Arc::new(store), args.presence.gate(), device_ids, config);
    let outcome = binder.bind(&mut callback).await;

    let response = callback
        .to_json()
        .context("Failed to serialize response callback")?;
    match &args.output {
        Some(path) => std::fs::write(path, format!("{response}\n"))
            .with_context(|| format!("Failed to write response: {}", path.display()))?,
        None => println!("{response}"),
    }

    match outcome {
        Ok(()) => {
            if !args.quiet {
                eprintln!("{} {}", "✓".green().bold(), "Device bound".green());
                if let Some(path) = &args.output {
                    eprintln!("   {} {}", "Response:".dimmed(), path.display());
                }
            }
            Ok(())
        }
        Err(status) => {
            if !args.quiet {
                eprintln!(
                    "{} {} ({})",
                    "✗".red().bold(),
                    status.to_string().red(),
                    status.client_error()
                );
            }
            Err(status.into())
        }
    }
}
