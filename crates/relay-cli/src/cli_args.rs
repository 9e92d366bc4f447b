use clap::Parser;

pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";
pub const DEFAULT_UPSTREAM_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_TRUSTED_ISSUERS: &str = "accounts.google.com,https://accounts.google.com";
pub const DEFAULT_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";
pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 32_000;
pub const DEFAULT_WS_HEARTBEAT_SECONDS: u64 = 20;

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_port(value: &str) -> Result<u16, String> {
    let parsed = value
        .parse::<u16>()
        .map_err(|error| format!("failed to parse port: {error}"))?;
    if parsed == 0 {
        return Err("port must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "relay-server",
    about = "Authenticated websocket relay to an OpenAI-compatible chat-completions service",
    version
)]
/// Startup configuration for the relay server.
pub struct Cli {
    #[arg(
        long,
        env = "PORT",
        value_parser = parse_port,
        help = "TCP port the websocket gateway listens on"
    )]
    pub port: u16,

    #[arg(
        long = "bind-host",
        env = "RELAY_BIND_HOST",
        default_value = DEFAULT_BIND_HOST,
        help = "Host address the websocket gateway binds"
    )]
    pub bind_host: String,

    #[arg(
        long = "allowed-origin",
        env = "ALLOWED_ORIGIN",
        help = "Single browser origin allowed to open a websocket (exact match)"
    )]
    pub allowed_origin: String,

    #[arg(
        long = "allowed-users",
        env = "ALLOWED_USERS",
        help = "Comma-separated identity subjects (emails) allowed to connect"
    )]
    pub allowed_users: String,

    #[arg(
        long = "upstream-api-url",
        env = "VENICE_API_URL",
        help = "Full chat-completions endpoint URL"
    )]
    pub upstream_api_url: String,

    #[arg(
        long = "upstream-api-key",
        env = "VENICE_API_KEY",
        hide_env_values = true,
        help = "Bearer credential for the chat-completions service"
    )]
    pub upstream_api_key: String,

    #[arg(
        long = "upstream-model",
        env = "VENICE_API_MODEL",
        help = "Model identifier sent with every completion request"
    )]
    pub upstream_model: String,

    #[arg(
        long = "upstream-timeout-ms",
        env = "RELAY_UPSTREAM_TIMEOUT_MS",
        default_value_t = DEFAULT_UPSTREAM_TIMEOUT_MS,
        value_parser = parse_positive_u64,
        help = "Transport deadline in milliseconds for one upstream call"
    )]
    pub upstream_timeout_ms: u64,

    #[arg(
        long = "google-client-id",
        env = "GOOGLE_CLIENT_ID",
        help = "OAuth client id expected as the identity token audience"
    )]
    pub google_client_id: Option<String>,

    #[arg(
        long = "vite-google-client-id",
        env = "VITE_GOOGLE_CLIENT_ID",
        hide = true,
        help = "Alias for --google-client-id shared with the web client's build environment"
    )]
    pub vite_google_client_id: Option<String>,

    #[arg(
        long = "trusted-issuers",
        env = "RELAY_TRUSTED_ISSUERS",
        default_value = DEFAULT_TRUSTED_ISSUERS,
        help = "Comma-separated identity token issuers accepted during the handshake"
    )]
    pub trusted_issuers: String,

    #[arg(
        long = "tokeninfo-url",
        env = "RELAY_TOKENINFO_URL",
        default_value = DEFAULT_TOKENINFO_URL,
        help = "Identity provider endpoint used to validate handshake tokens"
    )]
    pub tokeninfo_url: String,

    #[arg(
        long = "max-message-chars",
        env = "RELAY_MAX_MESSAGE_CHARS",
        default_value_t = DEFAULT_MAX_MESSAGE_CHARS,
        value_parser = parse_positive_usize,
        help = "Inbound user messages longer than this many characters are rejected"
    )]
    pub max_message_chars: usize,

    #[arg(
        long = "ws-heartbeat-seconds",
        env = "RELAY_WS_HEARTBEAT_SECONDS",
        default_value_t = DEFAULT_WS_HEARTBEAT_SECONDS,
        value_parser = parse_positive_u64,
        help = "Interval in seconds between server pings on idle connections"
    )]
    pub ws_heartbeat_seconds: u64,
}

impl Cli {
    /// Trusted audience, preferring `--google-client-id` over the
    /// `VITE_GOOGLE_CLIENT_ID` alias. Blank values count as unset.
    pub fn google_client_id(&self) -> Option<&str> {
        [&self.google_client_id, &self.vite_google_client_id]
            .into_iter()
            .flatten()
            .map(|value| value.trim())
            .find(|value| !value.is_empty())
    }

    /// `host:port` string handed to the listener.
    pub fn bind_address(&self) -> String {
        if self.bind_host.contains(':') && !self.bind_host.starts_with('[') {
            format!("[{}]:{}", self.bind_host, self.port)
        } else {
            format!("{}:{}", self.bind_host, self.port)
        }
    }
}
