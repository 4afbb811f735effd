//! Command dispatch: bridges CLI args -> plugin services -> output formatting.

pub mod company;
pub mod config_cmd;
pub mod license;
pub mod nip;
pub mod org;
pub mod session;
pub mod util;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a service-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Company(args) => company::handle(args, global).await,
        Command::License(args) => license::handle(args, global).await,
        Command::Session(args) => session::handle(args, global).await,
        Command::Org(args) => org::handle(args, global).await,
        // Handled before dispatch
        Command::Nip(_) | Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
