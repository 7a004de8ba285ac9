//! Verify command implementation.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use colored::Colorize;
use devbind_core::verify_assertion;
use serde_json::json;
use tracing::{debug, error, info};

use crate::utils::{format_timestamp, load_token};

/// Execute the verify command.
pub fn execute(token: &str, challenge: Option<&str>, as_json: bool, quiet: bool) -> Result<()> {
    let token = load_token(token)?;
    debug!(bytes = token.len(), "Loaded assertion");

    let verified = verify_assertion(&token).context("Verification failed")?;

    if let Some(expected) = challenge {
        if let Err(e) = verified.check_challenge(expected) {
            error!("Challenge does not match");
            return Err(e).context("Verification failed");
        }
    }

    let now = Utc::now();
    let expired = verified.is_expired_at(now);

    if as_json {
        let report = json!({
            "header": verified.header,
            "claims": verified.claims,
            "expired": expired,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !quiet {
        let claims = &verified.claims;
        println!();
        if expired {
            println!("{}", "EXPIRED".yellow().bold());
        } else {
            println!("{}", "VALID".green().bold());
        }
        println!(
            "   {} {}",
            "Signature:".dimmed(),
            format!("Valid ({})", verified.header.alg).green()
        );
        println!("   {} {}", "Key id:".dimmed(), verified.kid());
        println!("   {} {}", "Subject:".dimmed(), claims.sub);
        if challenge.is_some() {
            println!("   {} {}", "Challenge:".dimmed(), "Matches".green());
        }
        println!("   {} {}", "Issued at:".dimmed(), format_timestamp(claims.iat));
        println!("   {} {}", "Expires:".dimmed(), format_timestamp(claims.exp));
        if let Some(iss) = &claims.iss {
            println!("   {} {}", "Issuer:".dimmed(), iss);
        }
        if let Some(platform) = &claims.platform {
            println!("   {} {}", "Platform:".dimmed(), platform);
        }
    }

    if expired {
        bail!(
            "Assertion expired at {}",
            format_timestamp(verified.claims.exp)
        );
    }

    info!(kid = %verified.kid(), "Assertion verified");
    Ok(())
}
