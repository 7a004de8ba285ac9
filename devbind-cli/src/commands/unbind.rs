//! Unbind command implementation.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use devbind_core::{BindingConfig, DeviceBinder, FileKeyStore, NoDeviceId, UnavailableGate};

/// Execute the unbind command.
pub fn execute(user_id: &str, store_dir: PathBuf, quiet: bool) -> Result<()> {
    let store = FileKeyStore::open(&store_dir)
        .with_context(|| format!("Failed to open key store: {}", store_dir.display()))?;

    let binder = DeviceBinder::new(
        Arc::new(store),
        Arc::new(UnavailableGate),
        Arc::new(NoDeviceId),
        BindingConfig::from_env(),
    );
    let existed = binder
        .unbind(user_id)
        .with_context(|| format!("Failed to remove key for {user_id}"))?;

    if !quiet {
        if existed {
            println!("{} Removed key for {}", "✓".green().bold(), user_id);
        } else {
            println!("{} No key bound for {}", "-".dimmed(), user_id);
        }
    }
    Ok(())
}
