use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Chat relay server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "relay-server", version, about = "Real-time chat relay server")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "RELAY_PORT", default_value = "8080")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "RELAY_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./relay.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "RELAY_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Data directory for the message database
    #[arg(long, env = "RELAY_DATA_DIR", default_value = "./data")]
    pub data_dir: String,

    /// TTL in seconds for cached message lookups
    #[arg(long, env = "RELAY_CACHE_TTL_SECS", default_value = "600")]
    pub cache_ttl_secs: u64,

    /// Outbound buffer capacity per connection, in frames
    #[arg(long, env = "RELAY_OUTBOUND_BUFFER", default_value = "256")]
    pub outbound_buffer: usize,

    /// Milliseconds a send may wait for outbound buffer space before the
    /// connection is dropped
    #[arg(long, env = "RELAY_SEND_TIMEOUT_MS", default_value = "5000")]
    pub send_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_address: "0.0.0.0".to_string(),
            config: "./relay.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            cache_ttl_secs: 600,
            outbound_buffer: 256,
            send_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (RELAY_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("RELAY_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Chat Relay Server Configuration
# Place this file at ./relay.toml or specify with --config <path>
# All settings can be overridden via environment variables (RELAY_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 8080)
# port = 8080

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for the SQLite message database
# data_dir = "./data"

# ---- Message cache ----

# TTL in seconds for cached message lookups (default: 600 = 10 minutes).
# Entries also disappear wholesale whenever a message is written.
# cache_ttl_secs = 600

# ---- Outbound delivery ----

# Per-connection outbound buffer capacity, in frames (default: 256).
# A connection whose buffer stays full is terminated, not trimmed.
# outbound_buffer = 256

# Milliseconds a send may wait for buffer space before the connection
# is dropped (default: 5000)
# send_timeout_ms = 5000
"#
    .to_string()
}
