//! License handlers.

use nipgus_core::{LicenseInfo, LicenseStatus};

use crate::cli::{GlobalOpts, LicenseArgs, LicenseCommand};
use crate::config::{self, Needs};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Detail views ────────────────────────────────────────────────────

fn activations(status: &LicenseStatus) -> String {
    match (status.activations_used, status.activations_limit) {
        (Some(used), Some(limit)) => format!("{used}/{limit}"),
        (Some(used), None) => used.to_string(),
        _ => "-".into(),
    }
}

fn status_detail(status: &LicenseStatus, color: bool) -> String {
    output::detail_lines(&[
        ("Domain", status.domain.clone()),
        ("Valid", output::yes_no(status.valid, color)),
        ("Activations", activations(status)),
        (
            "Expires",
            status
                .expiry_date
                .map_or_else(|| "never".into(), |d| d.to_string()),
        ),
    ])
}

fn info_detail(info: &LicenseInfo, color: bool) -> String {
    let mut lines = vec![("Key stored", output::yes_no(info.has_key, color))];
    if let Some(status) = &info.status {
        lines.push(("Valid", output::yes_no(status.valid, color)));
        lines.push(("Domain", status.domain.clone()));
        lines.push(("Activations", activations(status)));
        lines.push((
            "Expires",
            status
                .expiry_date
                .map_or_else(|| "never".into(), |d| d.to_string()),
        ));
    }
    if let Some(error) = &info.error {
        lines.push(("Error", error.clone()));
    }
    lines.push((
        "Last checked",
        info.last_validation
            .map_or_else(|| "never".into(), |t| t.to_rfc3339()),
    ));
    output::detail_lines(&lines)
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: LicenseArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(&global.color);

    match args.command {
        LicenseCommand::Validate { key, domain } => {
            require_domain(domain.as_deref(), global)?;
            let ctx = config::bootstrap(global, Needs::License, None)?;
            let license = ctx.plugin.license();
            let key = key.or_else(|| license.stored_key()).ok_or(CliError::NoLicenseKey)?;
            let status = util::with_spinner(
                "Validating license...",
                global,
                license.validate(&key, domain.as_deref()),
            )
            .await?;
            render_status(&status, global, color);
            Ok(())
        }

        LicenseCommand::Activate { key, domain } => {
            require_domain(domain.as_deref(), global)?;
            let ctx = config::bootstrap(global, Needs::License, None)?;
            let license = ctx.plugin.license();
            let key = key.or_else(|| license.stored_key()).ok_or(CliError::NoLicenseKey)?;
            let status = util::with_spinner(
                "Activating license...",
                global,
                license.activate(&key, domain.as_deref()),
            )
            .await?;
            util::note(global, &format!("License activated for {}", status.domain));
            render_status(&status, global, color);
            Ok(())
        }

        LicenseCommand::Status => {
            require_domain(None, global)?;
            let ctx = config::bootstrap(global, Needs::License, None)?;
            let license = ctx.plugin.license();
            let info = util::with_spinner("Checking license...", global, license.license_info()).await;
            let out = output::render_single(
                &global.output,
                &info,
                |i| info_detail(i, color),
                |i| i.status.as_ref().is_some_and(|s| s.valid).to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        LicenseCommand::Clear => {
            if !util::confirm("Forget the stored license key?", global, "license clear")? {
                return Ok(());
            }
            let ctx = config::bootstrap(global, Needs::Session, None)?;
            ctx.plugin.license().clear()?;
            util::note(global, "License key removed");
            Ok(())
        }
    }
}

/// Calls without `--domain` validate for the company's host.
fn require_domain(domain: Option<&str>, global: &GlobalOpts) -> Result<(), CliError> {
    if domain.is_some_and(|d| !d.trim().is_empty()) {
        return Ok(());
    }
    util::require_company(global)
}

fn render_status(status: &LicenseStatus, global: &GlobalOpts, color: bool) {
    let out = output::render_single(
        &global.output,
        status,
        |s| status_detail(s, color),
        |s| s.valid.to_string(),
    );
    output::print_output(&out, global.quiet);
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn status() -> LicenseStatus {
        LicenseStatus {
            valid: true,
            activations_used: Some(1),
            activations_limit: Some(3),
            expiry_date: NaiveDate::from_ymd_opt(2027, 1, 31),
            domain: "acme.pipedrive.com".into(),
        }
    }

    #[test]
    fn status_detail_shows_activation_usage() {
        let out = status_detail(&status(), false);
        assert!(out.contains("Activations: 1/3"), "{out}");
        assert!(out.contains("Expires:     2027-01-31"), "{out}");
    }

    #[test]
    fn info_without_key_reports_never_checked() {
        let info = LicenseInfo {
            has_key: false,
            status: None,
            last_validation: None,
            error: None,
        };
        let out = info_detail(&info, false);
        assert!(out.contains("Key stored:   no"), "{out}");
        assert!(out.contains("Last checked: never"), "{out}");
    }
}
