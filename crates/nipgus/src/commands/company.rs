//! Registry lookup handlers.

use serde_json::Value;
use tabled::Tabled;

use nipgus_core::host::format_address;
use nipgus_core::{CompanyRecord, NipStatus};

use crate::cli::{CompanyArgs, CompanyCommand, GlobalOpts};
use crate::config::{self, Needs};
use crate::error::CliError;
use crate::output;

use super::util::{self, or_dash};

// ── Detail views ────────────────────────────────────────────────────

fn record_detail(record: &CompanyRecord, color: bool) -> String {
    let address = format_address(record);
    output::detail_lines(&[
        ("Name", or_dash(record.display_name())),
        ("NIP", or_dash(record.nip.as_deref())),
        ("REGON", or_dash(record.regon.as_deref())),
        ("Address", or_dash(Some(&address))),
        ("Status", or_dash(record.nip_status.as_deref())),
        ("Registered", or_dash(record.registration_date.as_deref())),
        (
            "Closed",
            record
                .end_date
                .as_deref()
                .filter(|d| !d.is_empty())
                .map_or_else(|| output::dim("-", color), ToOwned::to_owned),
        ),
        ("Activities", record.activities.len().to_string()),
    ])
}

fn status_detail(status: &NipStatus, color: bool) -> String {
    output::detail_lines(&[
        ("NIP", status.nip.clone()),
        ("Active", output::yes_no(status.active, color)),
        ("Status", or_dash(status.status.as_deref())),
        ("Registered", or_dash(status.registration_date.as_deref())),
        ("Closed", or_dash(status.end_date.as_deref())),
    ])
}

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ActivityRow {
    #[tabled(rename = "Activity")]
    text: String,
}

fn activity_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: CompanyArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let ctx = config::bootstrap(global, Needs::Session, None)?;
    let registry = ctx.plugin.registry();
    let color = output::should_color(&global.color);

    match args.command {
        CompanyCommand::Lookup { nip } => {
            let record =
                util::with_spinner("Querying GUS...", global, registry.get_company_data(&nip))
                    .await?;
            let out = output::render_single(
                &global.output,
                &record,
                |r| record_detail(r, color),
                |r| or_dash(r.display_name()),
            );
            output::print_output(&out, global.quiet);
        }

        CompanyCommand::Status { nip } => {
            let status =
                util::with_spinner("Querying GUS...", global, registry.check_nip_status(&nip))
                    .await?;
            let out = output::render_single(
                &global.output,
                &status,
                |s| status_detail(s, color),
                |s| s.active.to_string(),
            );
            output::print_output(&out, global.quiet);
        }

        CompanyCommand::Activities { nip } => {
            let activities =
                util::with_spinner("Querying GUS...", global, registry.company_activities(&nip))
                    .await?;
            let out = output::render_list(
                &global.output,
                &activities,
                |v| ActivityRow {
                    text: activity_text(v),
                },
                activity_text,
            );
            output::print_output(&out, global.quiet);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn activity_text_unwraps_strings() {
        assert_eq!(activity_text(&json!("62.01.Z")), "62.01.Z");
        assert_eq!(activity_text(&json!({"kod": "62.01.Z"})), r#"{"kod":"62.01.Z"}"#);
    }

    #[test]
    fn status_detail_lists_activity_flag() {
        let status = NipStatus {
            nip: "5260001246".into(),
            active: true,
            status: Some("Czynny".into()),
            registration_date: None,
            end_date: None,
        };
        let out = status_detail(&status, false);
        assert!(out.contains("Active:     yes"), "{out}");
        assert!(out.contains("Status:     Czynny"), "{out}");
    }
}
