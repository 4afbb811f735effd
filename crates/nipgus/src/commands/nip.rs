//! Offline NIP handlers.

use serde::Serialize;
use tabled::Tabled;

use nipgus_core::nip;

use crate::cli::{GlobalOpts, NipArgs, NipCommand};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct Checked {
    input: String,
    nip: String,
    formatted: String,
    valid: bool,
}

#[derive(Tabled)]
struct CheckedRow {
    #[tabled(rename = "Input")]
    input: String,
    #[tabled(rename = "NIP")]
    formatted: String,
    #[tabled(rename = "Valid")]
    valid: String,
}

fn check(raw: &str) -> Checked {
    let digits = nip::clean(raw);
    Checked {
        input: raw.to_owned(),
        valid: nip::validate(&digits),
        formatted: nip::format(&digits),
        nip: digits,
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: NipArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        NipCommand::Validate { nips } => {
            let checked: Vec<Checked> = nips.iter().map(|raw| check(raw)).collect();
            let color = output::should_color(&global.color);
            let out = output::render_list(
                &global.output,
                &checked,
                |c| CheckedRow {
                    input: c.input.clone(),
                    formatted: c.formatted.clone(),
                    valid: output::yes_no(c.valid, color),
                },
                |c| format!("{}\t{}", c.nip, c.valid),
            );
            output::print_output(&out, global.quiet);

            let invalid: Vec<&str> = checked
                .iter()
                .filter(|c| !c.valid)
                .map(|c| c.input.as_str())
                .collect();
            if invalid.is_empty() {
                Ok(())
            } else {
                Err(CliError::Validation {
                    field: "nip".into(),
                    reason: format!("not a valid NIP: {}", invalid.join(", ")),
                })
            }
        }

        NipCommand::Format { nip: raw, partial } => {
            let out = if partial {
                nip::format_partial(&raw)
            } else {
                nip::format(&raw)
            };
            output::print_output(&out, global.quiet);
            Ok(())
        }

        NipCommand::Clean { nip: raw } => {
            output::print_output(&nip::clean(&raw), global.quiet);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_normalizes_any_notation() {
        let c = check("PL 526-000-12-46");
        assert_eq!(c.nip, "5260001246");
        assert_eq!(c.formatted, "526-000-12-46");
        assert!(c.valid);
    }

    #[test]
    fn check_flags_bad_checksum() {
        assert!(!check("5260001247").valid);
    }
}
