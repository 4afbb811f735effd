//! Clap derive structures for the `nipgus` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// nipgus -- NIP validation and GUS registry data for Pipedrive organizations
#[derive(Debug, Parser)]
#[command(
    name = "nipgus",
    version,
    about = "Validate NIPs and fill Pipedrive organizations from the GUS registry",
    long_about = "Validates Polish tax identifiers (NIP), looks companies up in the\n\
        GUS business registry and writes the result onto Pipedrive\n\
        organizations, through the same session and license services the\n\
        Pipedrive plugin uses.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config dir)
    #[arg(long, env = "NIPGUS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Local storage file holding the session and license key
    #[arg(long, env = "NIPGUS_STORAGE", global = true)]
    pub storage: Option<PathBuf>,

    /// Pipedrive company subdomain (e.g. "acme" for acme.pipedrive.com)
    #[arg(long, short = 'c', env = "NIPGUS_COMPANY", global = true)]
    pub company: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "NIPGUS_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Validate, format and clean NIP numbers (offline)
    Nip(NipArgs),

    /// Look companies up in the GUS registry
    #[command(alias = "co")]
    Company(CompanyArgs),

    /// Manage the plugin license
    License(LicenseArgs),

    /// Manage the Pipedrive session
    Session(SessionArgs),

    /// Inspect and fill Pipedrive organizations
    #[command(alias = "organization")]
    Org(OrgArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  NIP
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct NipArgs {
    #[command(subcommand)]
    pub command: NipCommand,
}

#[derive(Debug, Subcommand)]
pub enum NipCommand {
    /// Check one or more NIPs (exit code 2 if any is invalid)
    Validate {
        /// NIPs in any notation (dashes, spaces, PL prefix)
        #[arg(required = true)]
        nips: Vec<String>,
    },

    /// Print a NIP as XXX-XXX-XX-XX
    Format {
        nip: String,

        /// Format partial input the way the field does while typing
        #[arg(long)]
        partial: bool,
    },

    /// Strip everything but digits
    Clean { nip: String },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPANY
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompanyArgs {
    #[command(subcommand)]
    pub command: CompanyCommand,
}

#[derive(Debug, Subcommand)]
pub enum CompanyCommand {
    /// Full registry record for a NIP
    Lookup { nip: String },

    /// Whether the taxpayer is active
    Status { nip: String },

    /// Declared business activities
    Activities { nip: String },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  LICENSE
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct LicenseArgs {
    #[command(subcommand)]
    pub command: LicenseCommand,
}

#[derive(Debug, Subcommand)]
pub enum LicenseCommand {
    /// Validate a key (the stored one when omitted)
    Validate {
        key: Option<String>,

        /// Domain to validate for (defaults to the company's Pipedrive host)
        #[arg(long)]
        domain: Option<String>,
    },

    /// Activate a key for this domain
    Activate {
        key: Option<String>,

        #[arg(long)]
        domain: Option<String>,
    },

    /// Show the stored license and its current state
    Status,

    /// Forget the stored key and validation state
    Clear,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SESSION
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct SessionArgs {
    #[command(subcommand)]
    pub command: SessionCommand,
}

#[derive(Debug, Subcommand)]
pub enum SessionCommand {
    /// Print the authorization URL to open in a browser
    Authorize,

    /// Adopt the session from the URL the browser landed on after authorizing
    Login {
        /// Callback URL carrying the session parameter
        callback_url: String,
    },

    /// Show whether the stored session is still accepted
    Status,

    /// Revoke the session and forget it
    Logout,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  ORGANIZATIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct OrgArgs {
    #[command(subcommand)]
    pub command: OrgCommand,
}

#[derive(Debug, Subcommand)]
pub enum OrgCommand {
    /// Show an organization and its stored NIP
    Show { id: u64 },

    /// List organization custom fields
    Fields {
        /// Bypass the field cache
        #[arg(long)]
        refresh: bool,
    },

    /// Fetch registry data and write it onto an organization
    Fill {
        id: u64,

        /// NIP to look up (defaults to the one stored on the organization)
        nip: Option<String>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current resolved configuration
    Show,

    /// Print the config file path
    Path,

    /// Store a secret in the system keyring
    SetSecret {
        /// Which secret to store
        #[arg(value_enum)]
        which: SecretKind,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SecretKind {
    /// License request signing secret
    AuthSecret,
    /// JSON panel password of the bundle server
    PanelPassword,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
