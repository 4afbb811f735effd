//! Session handlers.

use serde::Serialize;
use url::Url;

use crate::cli::{GlobalOpts, SessionArgs, SessionCommand};
use crate::config::{self, Needs};
use crate::error::CliError;
use crate::output;

use super::util::{self, or_dash};

#[derive(Debug, Serialize)]
struct SessionStatus {
    stored: bool,
    accepted: bool,
    company_domain: Option<String>,
    expires_at: Option<String>,
}

fn status_detail(status: &SessionStatus, color: bool) -> String {
    output::detail_lines(&[
        ("Stored", output::yes_no(status.stored, color)),
        ("Accepted", output::yes_no(status.accepted, color)),
        ("Company", or_dash(status.company_domain.as_deref())),
        ("Expires", or_dash(status.expires_at.as_deref())),
    ])
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: SessionArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        SessionCommand::Authorize => {
            util::require_company(global)?;
            let ctx = config::bootstrap(global, Needs::Session, None)?;
            let url = ctx.plugin.session().authorization_url()?;
            util::note(
                global,
                "Open this URL, approve access, then pass the address you land on to `nipgus session login`:",
            );
            output::print_output(url.as_str(), global.quiet);
            Ok(())
        }

        SessionCommand::Login { callback_url } => {
            let url: Url = callback_url.parse().map_err(|_| CliError::Validation {
                field: "callback_url".into(),
                reason: format!("not a URL: {callback_url}"),
            })?;
            let ctx = config::bootstrap(global, Needs::Session, None)?;
            let session = ctx.plugin.session();
            if !session.adopt_from_url(&url)? {
                return Err(CliError::Validation {
                    field: "callback_url".into(),
                    reason: format!(
                        "the URL carries no '{}' parameter",
                        ctx.config.oauth.session_param
                    ),
                });
            }
            if util::with_spinner("Checking session...", global, session.validate()).await {
                util::note(global, "Session stored");
                Ok(())
            } else {
                Err(CliError::AuthRequired {
                    message: "The session server did not accept the token".into(),
                })
            }
        }

        SessionCommand::Status => {
            let ctx = config::bootstrap(global, Needs::Session, None)?;
            let session = ctx.plugin.session();
            let stored = session.is_authorized();
            let info = util::with_spinner("Checking session...", global, session.session_info())
                .await?;
            let status = SessionStatus {
                stored,
                accepted: info.is_some(),
                company_domain: info
                    .as_ref()
                    .and_then(|i| i.company_domain.clone())
                    .or_else(|| session.company_domain()),
                expires_at: info.and_then(|i| i.expires_at),
            };
            let color = output::should_color(&global.color);
            let out = output::render_single(
                &global.output,
                &status,
                |s| status_detail(s, color),
                |s| s.accepted.to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        SessionCommand::Logout => {
            let ctx = config::bootstrap(global, Needs::Session, None)?;
            let session = ctx.plugin.session();
            if !session.is_authorized() {
                util::note(global, "No session stored");
                return Ok(());
            }
            util::with_spinner("Logging out...", global, session.logout()).await;
            util::note(global, "Logged out");
            Ok(())
        }
    }
}
