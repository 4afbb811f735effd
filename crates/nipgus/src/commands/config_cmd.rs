//! Config subcommand handlers.

use dialoguer::{Input, Select};

use nipgus_config::{AUTH_SECRET_ENTRY, Config, PANEL_PASSWORD_ENTRY};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, SecretKind};
use crate::config;
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

const MASK: &str = "********";

/// Copy of `cfg` with plaintext secrets masked.
fn masked(cfg: &Config) -> Config {
    let mut shown = cfg.clone();
    if shown.license.auth_secret.is_some() {
        shown.license.auth_secret = Some(MASK.into());
    }
    if shown.server.panel_password.is_some() {
        shown.server.panel_password = Some(MASK.into());
    }
    shown
}

fn secret_entry(kind: SecretKind) -> (&'static str, &'static str) {
    match kind {
        SecretKind::AuthSecret => (AUTH_SECRET_ENTRY, "License auth secret"),
        SecretKind::PanelPassword => (PANEL_PASSWORD_ENTRY, "Panel password"),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = global.config.clone().unwrap_or_else(config::config_path);

    match args.command {
        // ── Init: interactive wizard ────────────────────────────────
        ConfigCommand::Init => {
            eprintln!("nipgus configuration wizard");
            eprintln!("   Config path: {}\n", path.display());

            let mut cfg = nipgus_config::load_config_from(&path)?;

            cfg.oauth.url = Input::new()
                .with_prompt("Session server URL")
                .default(cfg.oauth.url.clone())
                .interact_text()
                .map_err(prompt_err)?;

            cfg.license.proxy_url = Input::new()
                .with_prompt("License proxy URL")
                .default(cfg.license.proxy_url.clone())
                .interact_text()
                .map_err(prompt_err)?;

            let secret = rpassword::prompt_password("License auth secret (empty to skip): ")
                .map_err(prompt_err)?;
            if !secret.is_empty() {
                let choices = &[
                    "Store in system keyring (recommended)",
                    "Save to config file (plaintext)",
                ];
                let selection = Select::new()
                    .with_prompt("Where to store the secret?")
                    .items(choices)
                    .default(0)
                    .interact()
                    .map_err(prompt_err)?;
                if selection == 0 {
                    nipgus_config::store_secret(AUTH_SECRET_ENTRY, &secret)?;
                    cfg.license.auth_secret = None;
                    eprintln!("   Secret stored in system keyring");
                } else {
                    cfg.license.auth_secret = Some(secret);
                }
            }

            // Reject URLs the services could not use before writing anything
            nipgus_config::to_plugin_config_with(&cfg, secrecy::SecretString::from(String::new()))?;
            nipgus_config::save_config_to(&cfg, &path)?;

            eprintln!("\nConfiguration written to {}", path.display());
            eprintln!("  Try it: nipgus --company <subdomain> license status");
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = masked(&config::load(global)?);
            let out = output::render_single(
                &global.output,
                &cfg,
                |c| format!("{c:#?}"),
                |_| path.display().to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        // ── Secrets ─────────────────────────────────────────────────
        ConfigCommand::SetSecret { which } => {
            let (entry, label) = secret_entry(which);
            let secret =
                rpassword::prompt_password(format!("{label}: ")).map_err(prompt_err)?;
            if secret.is_empty() {
                return Err(CliError::Validation {
                    field: entry.into(),
                    reason: "secret cannot be empty".into(),
                });
            }
            nipgus_config::store_secret(entry, &secret)?;
            if !global.quiet {
                eprintln!("{label} stored in system keyring");
            }
            Ok(())
        }
    }
}
