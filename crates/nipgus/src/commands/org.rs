//! Organization handlers.
//!
//! `org fill` runs the plugin coordinator headless: the CLI types the NIP
//! into the field, presses fetch, and reports how the view settled.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tabled::Tabled;
use tokio::sync::watch;

use nipgus_core::nip;
use nipgus_core::{Coordinator, FetchState, HostPage, OrganizationField, Phase, ViewState};

use crate::cli::{GlobalOpts, OrgArgs, OrgCommand};
use crate::config::{self, Context, Needs};
use crate::error::CliError;
use crate::output;

use super::util::{self, or_dash};

/// Upper bound for each stage of a headless fill.
const STAGE_TIMEOUT: Duration = Duration::from_secs(60);

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Type")]
    field_type: String,
}

impl From<&OrganizationField> for FieldRow {
    fn from(f: &OrganizationField) -> Self {
        Self {
            id: f.id,
            name: f.name.clone(),
            key: f.key.clone(),
            field_type: or_dash(f.field_type.as_deref()),
        }
    }
}

#[derive(Debug, Serialize)]
struct OrgView {
    id: u64,
    name: String,
    address: Option<String>,
    nip: Option<String>,
}

fn org_detail(org: &OrgView) -> String {
    output::detail_lines(&[
        ("ID", org.id.to_string()),
        ("Name", org.name.clone()),
        ("Address", or_dash(org.address.as_deref())),
        (
            "NIP",
            org.nip
                .as_deref()
                .map_or_else(|| "-".into(), nip::format),
        ),
    ])
}

#[derive(Debug, Serialize)]
struct FillResult {
    organization_id: u64,
    nip: String,
    message: String,
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: OrgArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        OrgCommand::Show { id } => {
            let ctx = config::bootstrap(global, Needs::Session, Some(id))?;
            let host = ctx.plugin.host();
            let (org, nip) = util::with_spinner("Loading organization...", global, async {
                let org = host.get_organization(id).await?;
                let nip = host.organization_nip(id).await?;
                Ok::<_, CliError>((org, nip))
            })
            .await?;
            let view = OrgView {
                id: org.id,
                name: org.name,
                address: org.address,
                nip,
            };
            let out = output::render_single(&global.output, &view, org_detail, |o| {
                o.nip.clone().unwrap_or_default()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        OrgCommand::Fields { refresh } => {
            let ctx = config::bootstrap(global, Needs::Session, None)?;
            let fields = util::with_spinner(
                "Loading fields...",
                global,
                ctx.plugin.host().organization_fields(refresh),
            )
            .await?;
            let out = output::render_list(&global.output, &fields, |f| FieldRow::from(f), |f| {
                f.key.clone()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        OrgCommand::Fill { id, nip: raw } => {
            util::require_company(global)?;
            let ctx = config::bootstrap(global, Needs::License, Some(id))?;
            let raw = match raw {
                Some(raw) => raw,
                None => ctx
                    .plugin
                    .host()
                    .organization_nip(id)
                    .await?
                    .ok_or_else(|| CliError::Validation {
                        field: "nip".into(),
                        reason: format!("organization {id} has no NIP stored; pass one"),
                    })?,
            };
            let digits = nip::clean(&raw);
            if !nip::validate(&digits) {
                return Err(CliError::Validation {
                    field: "nip".into(),
                    reason: format!("'{raw}' is not a valid NIP"),
                });
            }

            let state = util::with_spinner("Filling from GUS...", global, fill(&ctx, &raw)).await?;
            let result = settle(&state, id, &digits)?;
            let out = output::render_single(
                &global.output,
                &result,
                |r| {
                    output::detail_lines(&[
                        ("Organization", r.organization_id.to_string()),
                        ("NIP", nip::format(&r.nip)),
                        ("Result", r.message.clone()),
                    ])
                },
                |r| r.message.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}

// ── Headless fill ───────────────────────────────────────────────────

/// Drive the coordinator through the fill and return its final view.
async fn fill(ctx: &Context, raw: &str) -> Result<ViewState, CliError> {
    let page: Arc<dyn HostPage> = ctx.page.clone();
    let (coordinator, handle) = Coordinator::new(
        ctx.plugin.services().clone(),
        page,
        ctx.plugin.config().ui.clone(),
    );
    // The CLI page never pushes navigation events
    let task = tokio::spawn(coordinator.with_polling().run());
    let mut view = handle.view();

    let driven = async {
        let started = wait(&mut view, "plugin start", |v| {
            matches!(
                v.phase,
                Phase::Ready | Phase::LicenseGate | Phase::Authorizing | Phase::Dormant
            )
        })
        .await?;
        if started.phase != Phase::Ready {
            return Ok(());
        }

        let expected = nip::format_partial(raw);
        handle.input(raw);
        handle.blur();
        wait(&mut view, "NIP validation", |v| {
            v.field.text == expected && v.field.valid
        })
        .await?;

        handle.fetch();
        wait(&mut view, "registry fetch", |v| {
            matches!(v.fetch.state, FetchState::Success | FetchState::Error)
        })
        .await?;
        Ok::<_, CliError>(())
    }
    .await;

    handle.shutdown();
    if let Err(e) = task.await {
        tracing::warn!(error = %e, "coordinator task failed");
    }
    driven?;
    Ok(handle.snapshot())
}

async fn wait(
    view: &mut watch::Receiver<ViewState>,
    stage: &str,
    cond: impl FnMut(&ViewState) -> bool,
) -> Result<ViewState, CliError> {
    match tokio::time::timeout(STAGE_TIMEOUT, view.wait_for(cond)).await {
        Ok(Ok(state)) => Ok(state.clone()),
        Ok(Err(_)) => Err(CliError::Api {
            message: format!("plugin stopped during {stage}"),
        }),
        Err(_) => Err(CliError::Timeout {
            reason: format!("{stage} took longer than {}s", STAGE_TIMEOUT.as_secs()),
        }),
    }
}

/// Map the settled view onto a result or the error that stopped the fill.
fn settle(state: &ViewState, id: u64, digits: &str) -> Result<FillResult, CliError> {
    match state.phase {
        Phase::LicenseGate => Err(match &state.license.error {
            Some(message) => CliError::License {
                message: message.clone(),
            },
            None if state.license.prefill.is_none() => CliError::NoLicenseKey,
            None => CliError::License {
                message: "The stored license key is not valid for this domain".into(),
            },
        }),
        Phase::Authorizing => Err(CliError::AuthRequired {
            message: state.authorization_url.as_ref().map_or_else(
                || "The plugin is not authorized".into(),
                |url| format!("The plugin is not authorized. Open: {url}"),
            ),
        }),
        Phase::Ready if state.fetch.state == FetchState::Success => Ok(FillResult {
            organization_id: state.organization_id.unwrap_or(id),
            nip: digits.to_owned(),
            message: state
                .fetch
                .message
                .clone()
                .unwrap_or_else(|| "Saved registry data".into()),
        }),
        _ => Err(CliError::Api {
            message: state
                .fetch
                .message
                .clone()
                .or_else(|| state.notice.clone())
                .unwrap_or_else(|| "Registry fetch did not complete".into()),
        }),
    }
}
