use clap::Parser;

#[derive(Parser, Debug, Clone, Default)]
#[command(version, about = "Dynamic DNS updater for DNSExit", long_about = None)]
pub struct Args {
    /// DDNS provider (default@dnsexit.com, ipv6@dnsexit.com, dnsexit)
    #[arg(long)]
    pub provider: Option<String>,

    /// DNSExit API key
    #[arg(long, alias = "api-key")]
    pub password: Option<String>,

    /// Alias(es) to update (comma-separated)
    #[arg(long, alias = "hostname")]
    pub host: Option<String>,

    /// Update API server, optionally with :port
    #[arg(long)]
    pub server: Option<String>,

    /// Update API path
    #[arg(long)]
    pub path: Option<String>,

    /// User-Agent sent with update requests
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Manually specify IP address (instead of auto-detection)
    #[arg(long)]
    pub ip: Option<String>,

    /// Server used to look up the public IP address
    #[arg(long)]
    pub checkip_server: Option<String>,

    /// Path on the IP check server
    #[arg(long)]
    pub checkip_path: Option<String>,

    /// Command printing the public IP address (instead of the check server)
    #[arg(long)]
    pub checkip_command: Option<String>,

    /// Configuration file path
    #[arg(long)]
    pub file: Option<String>,

    /// Cache file path
    #[arg(long)]
    pub cache: Option<String>,

    /// Check period (e.g. 30s, 10m, 1h); run once when not set
    #[arg(long)]
    pub period: Option<String>,

    /// Update request buffer size in bytes
    #[arg(long)]
    pub buffer_size: Option<usize>,

    /// Update even if the IP address has not changed
    #[arg(long, default_value = "false")]
    pub force: bool,

    /// Test mode - validate config and show what would happen without updating
    #[arg(long, default_value = "false")]
    pub test: bool,

    /// Verbose output
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Debug output
    #[arg(long, default_value = "false")]
    pub debug: bool,

    /// Quiet mode - suppress all output except errors
    #[arg(long, default_value = "false")]
    pub quiet: bool,
}

impl Args {
    pub fn new() -> Self {
        Self::parse()
    }
}
