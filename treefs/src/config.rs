use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "treefs-engine", about = "In-memory tree filesystem over JSON-RPC 2.0 / NDJSON stdio")]
pub struct CliArgs {
    /// Start with a filesystem of this many bytes instead of waiting for `initialize`
    #[arg(long, env = "TREEFS_CAPACITY", allow_negative_numbers = true)]
    pub capacity: Option<i64>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, default_value = "info", env = "TREEFS_LOG_LEVEL")]
    pub log_level: String,
}
