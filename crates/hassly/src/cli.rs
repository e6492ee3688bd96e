//! Clap derive structures for the `hassly` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// hassly -- query and drive a Home Assistant hub from the command line
#[derive(Debug, Parser)]
#[command(
    name = "hassly",
    version,
    about = "Query and control Home Assistant from the command line",
    long_about = "A CLI for a single Home Assistant instance over its WebSocket API.\n\n\
        Diagnoses reachability, verifies access tokens, lists entities and\n\
        their states, fires service calls and aggregates calendar events.",
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
    /// Hub profile to use
    #[arg(long, short = 'p', env = "HASSLY_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Home Assistant base URL (overrides profile)
    #[arg(long, short = 'u', env = "HASSLY_URL", global = true)]
    pub url: Option<String>,

    /// Long-lived access token
    #[arg(long, env = "HASSLY_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Connect through the cloud relay (skips the local reachability probe)
    #[arg(long, env = "HASSLY_CLOUD", global = true)]
    pub cloud: bool,

    /// Skip the ICMP echo stage of the reachability probe
    #[arg(long, global = true)]
    pub skip_ping: bool,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "HASSLY_OUTPUT",
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

    /// Probe and handshake timeout in seconds (overrides profile)
    #[arg(long, env = "HASSLY_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
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
    /// Check that the hub is reachable (ICMP echo + TCP connect)
    Check,

    /// Verify the URL and access token with a full handshake
    Test,

    /// List lights, sensors, climate, vacuums and covers
    #[command(alias = "ls")]
    Entities(EntitiesArgs),

    /// Show the current state of specific entities
    States(EntityIdsArgs),

    /// Report which entity ids exist on the hub
    Validate(EntityIdsArgs),

    /// Call a service on an entity (fire-and-forget)
    Call(CallArgs),

    /// Show upcoming events across all calendars
    #[command(alias = "cal")]
    Calendar(CalendarArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Entity commands ──────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct EntitiesArgs {
    /// Only show entities in this domain (e.g. light)
    #[arg(long, short = 'd')]
    pub domain: Option<String>,
}

#[derive(Debug, Args)]
pub struct EntityIdsArgs {
    /// Entity ids (e.g. light.kitchen sensor.outdoor_temperature)
    #[arg(required = true, num_args = 1..)]
    pub entity_ids: Vec<String>,
}

#[derive(Debug, Args)]
pub struct CallArgs {
    /// Service domain (e.g. light)
    pub domain: String,

    /// Service name (e.g. turn_on)
    pub service: String,

    /// Target entity id
    pub entity_id: String,
}

// ── Calendar ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CalendarArgs {
    /// Window start (ISO 8601). Defaults to the start of today.
    #[arg(long)]
    pub start: Option<String>,

    /// Window end (ISO 8601). Defaults to start + --days.
    #[arg(long)]
    pub end: Option<String>,

    /// Window length in days when --end is not given
    #[arg(long, default_value = "7")]
    pub days: u64,

    /// Max events to show (0 = all)
    #[arg(long, short = 'l', default_value = "20")]
    pub limit: usize,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current configuration (tokens masked)
    Show,

    /// Set a value on the active profile
    Set {
        /// Profile key: url, cloud_relay, token_env or timeout
        key: String,

        /// Value to set
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store an access token in the system keyring
    SetToken {
        /// Profile name
        #[arg(long)]
        profile: Option<String>,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
