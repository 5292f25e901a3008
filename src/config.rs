//! Configuration file parser and CLI merge
//!
//! The file format is a flat list of settings:
//! - key=value pairs (comma-separated or on separate lines)
//! - Backslash line continuation
//! - `#` comments
//! - Bare words on a line are extra aliases to update
//!
//! Example:
//! ```text
//! provider=default@dnsexit.com
//! password=0123456789abcdef, \
//! period=10m
//! host=home.example.com, office.example.com
//! ```

use crate::args::Args;
use crate::clients::ProviderInfo;
use crate::request::{UpdateContext, DEFAULT_REQUEST_CAPACITY};
use std::error::Error;
use std::fs;
use std::path::Path;

/// Provider used when none is configured
pub const DEFAULT_PROVIDER: &str = "default@dnsexit.com";

const DEFAULT_CONFIG_PATH: &str = "dnsexit-ddns.conf";

// Main Config struct used throughout the codebase
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub provider: Option<String>,
    pub username: Option<String>,
    /// API key
    pub password: Option<String>,
    pub host: Option<String>,
    pub server: Option<String>,
    pub path: Option<String>,
    pub user_agent: Option<String>,
    pub ip: Option<String>,
    pub checkip_server: Option<String>,
    pub checkip_path: Option<String>,
    pub checkip_command: Option<String>,
    /// Check period in seconds
    pub period: Option<u64>,
    pub buffer_size: Option<usize>,
}

impl Config {
    /// Load a configuration file.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the file cannot be read or contains an invalid value.
    pub fn from_file(path: &str) -> Result<Self, Box<dyn Error>> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path, e))?;
        Self::parse(&content)
    }

    /// Parse configuration text.
    ///
    /// Later values override earlier ones, except aliases which accumulate
    /// from every `host=` entry and bare word.
    ///
    /// # Examples
    ///
    /// ```
    /// use dnsexit_ddns::config::Config;
    ///
    /// let cfg = Config::parse("password=key\nhost=a.example.com, b.example.com\n").unwrap();
    /// assert_eq!(cfg.password.as_deref(), Some("key"));
    /// assert_eq!(cfg.dns_records(), vec!["a.example.com", "b.example.com"]);
    /// ```
    pub fn parse(content: &str) -> Result<Self, Box<dyn Error>> {
        let mut config = Config::default();
        let mut hosts: Vec<String> = Vec::new();

        // Join lines that end with backslash
        let normalized = join_continued_lines(content);

        for line in normalized.lines() {
            let line = line.trim();

            // Skip comments and empty lines
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            for part in line.split(',').map(str::trim) {
                if part.is_empty() {
                    continue;
                }
                if part.starts_with('#') {
                    break;
                }

                match part.split_once('=') {
                    Some((key, value)) => {
                        let key = key.trim();
                        let value = value.trim();
                        if matches!(key, "host" | "hostname") {
                            hosts.push(value.to_string());
                        } else {
                            config.set(key, value)?;
                        }
                    }
                    // Bare word, another alias
                    None => hosts.push(part.to_string()),
                }
            }
        }

        if !hosts.is_empty() {
            config.host = Some(hosts.join(","));
        }

        Ok(config)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let value = value.to_string();

        match key {
            "provider" => self.provider = Some(value),
            "username" => self.username = Some(value),
            "password" | "api-key" => self.password = Some(value),
            "server" => self.server = Some(value),
            "path" => self.path = Some(value),
            "user-agent" => self.user_agent = Some(value),
            "checkip-server" => self.checkip_server = Some(value),
            "checkip-path" => self.checkip_path = Some(value),
            "checkip-command" => self.checkip_command = Some(value),
            "period" => self.period = Some(parse_interval(&value)?),
            "buffer-size" => {
                let size: usize = value
                    .parse()
                    .map_err(|_| format!("Invalid buffer-size: '{}'", value))?;
                self.buffer_size = Some(size);
            }
            _ => log::warn!("Ignoring unknown config key '{}'", key),
        }

        Ok(())
    }

    /// Combine an optional file-derived Config with CLI arguments, using CLI values when provided.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `--period` is not a valid interval.
    pub fn merge(file_config: Option<Self>, args: &Args) -> Result<Self, Box<dyn Error>> {
        let base = file_config.unwrap_or_default();

        let period = match args.period.as_deref() {
            Some(period) => Some(parse_interval(period)?),
            None => base.period,
        };

        Ok(Config {
            provider: args.provider.clone().or(base.provider),
            username: base.username,
            password: args.password.clone().or(base.password),
            host: args.host.clone().or(base.host),
            server: args.server.clone().or(base.server),
            path: args.path.clone().or(base.path),
            user_agent: args.user_agent.clone().or(base.user_agent),
            ip: args.ip.clone().or(base.ip),
            checkip_server: args.checkip_server.clone().or(base.checkip_server),
            checkip_path: args.checkip_path.clone().or(base.checkip_path),
            checkip_command: args.checkip_command.clone().or(base.checkip_command),
            period,
            buffer_size: args.buffer_size.or(base.buffer_size),
        })
    }

    /// Load configuration from the file named by `--file` (or the default path if it exists)
    /// and merge it with CLI arguments.
    pub fn load(args: &Args) -> Result<Self, Box<dyn Error>> {
        let file_config = match args.file.as_deref() {
            Some(path) => Some(Self::from_file(path)?),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Some(Self::from_file(DEFAULT_CONFIG_PATH)?),
            None => None,
        };

        Self::merge(file_config, args)
    }

    /// Ensures the config names at least one alias and carries an API key.
    pub fn validate(&self) -> Result<(), Box<dyn Error>> {
        if self.dns_records().is_empty() {
            return Err("Host is required (use --host)".into());
        }
        if self.password.as_deref().map_or(true, str::is_empty) {
            return Err("API key is required (use --password)".into());
        }
        if self.buffer_size == Some(0) {
            return Err("buffer-size must be greater than zero".into());
        }

        Ok(())
    }

    pub fn provider_name(&self) -> &str {
        self.provider.as_deref().unwrap_or(DEFAULT_PROVIDER)
    }

    pub fn request_capacity(&self) -> usize {
        self.buffer_size.unwrap_or(DEFAULT_REQUEST_CAPACITY)
    }

    /// Split the `host` field into individual aliases.
    ///
    /// Trims whitespace around each comma-separated token and drops empty ones.
    pub fn dns_records(&self) -> Vec<String> {
        self.host
            .as_ref()
            .map(|h| {
                h.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Update context for `alias`, falling back to the provider's defaults.
    pub fn update_context(&self, alias: &str, info: &ProviderInfo) -> UpdateContext {
        UpdateContext {
            api_key: self.password.clone().unwrap_or_default(),
            alias_name: alias.to_string(),
            server_host: self.server.clone().unwrap_or_else(|| info.server_name.to_string()),
            server_path: self.path.clone().unwrap_or_else(|| info.server_url.to_string()),
            user_agent: self.user_agent.clone().unwrap_or_else(|| crate::USER_AGENT.to_string()),
        }
    }

    /// IP check URL when overridden by config, `None` to use the provider's.
    pub fn checkip_url(&self) -> Option<String> {
        let server = self.checkip_server.as_deref()?;
        let path = self.checkip_path.as_deref().unwrap_or("/");
        if server.contains("://") {
            Some(format!("{}{}", server, path))
        } else {
            Some(format!("http://{}{}", server, path))
        }
    }
}

/// Collapse lines ending with a backslash into single lines, joining the parts with a space.
fn join_continued_lines(content: &str) -> String {
    let mut result = String::new();
    let mut current_line = String::new();

    for line in content.lines() {
        let trimmed = line.trim_end();

        if let Some(stripped) = trimmed.strip_suffix('\\') {
            // Remove backslash and append
            current_line.push_str(stripped);
            current_line.push(' ');
        } else {
            // Complete the line
            current_line.push_str(trimmed);
            result.push_str(&current_line);
            result.push('\n');
            current_line.clear();
        }
    }

    // Add any remaining line
    if !current_line.is_empty() {
        result.push_str(&current_line);
        result.push('\n');
    }

    result
}

/// Convert a duration string with a single-unit suffix into a number of seconds.
///
/// Accepts a numeric value followed by one of the units `s`, `m`, `h`, or `d` (seconds, minutes, hours, days).
/// Returns an error for empty input, an invalid or zero numeric portion, an
/// unknown unit, or a period too long to count in seconds.
///
/// # Examples
///
/// ```
/// use dnsexit_ddns::config::parse_interval;
///
/// assert_eq!(parse_interval("30s").unwrap(), 30);
/// assert_eq!(parse_interval("5m").unwrap(), 300);
/// assert_eq!(parse_interval("1h").unwrap(), 3600);
/// assert_eq!(parse_interval("2d").unwrap(), 172800);
/// ```
pub fn parse_interval(interval: &str) -> Result<u64, Box<dyn Error>> {
    let interval = interval.trim();
    if interval.is_empty() {
        return Err("Interval cannot be empty".into());
    }

    let len = interval.len();
    if len < 2 || !interval.is_char_boundary(len - 1) {
        return Err(format!("Invalid interval format: '{}'", interval).into());
    }

    let (num_str, unit) = interval.split_at(len - 1);
    let num: u64 = num_str.parse()
        .map_err(|_| format!("Invalid number in interval: '{}'", num_str))?;

    if num == 0 {
        return Err(format!("Interval must be greater than zero: '{}'", interval).into());
    }

    let scale = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86400,
        _ => return Err(format!("Invalid interval unit '{}'. Use s, m, h, or d", unit).into()),
    };

    num.checked_mul(scale)
        .ok_or_else(|| format!("Interval too large: '{}'", interval).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::dnsexit::DNSEXIT;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_simple_config() {
        let config = r#"
provider=default@dnsexit.com
password=secret
host1.example.com
"#;

        let parsed = Config::parse(config).unwrap();
        assert_eq!(parsed.provider.as_deref(), Some("default@dnsexit.com"));
        assert_eq!(parsed.password.as_deref(), Some("secret"));
        assert_eq!(parsed.host.as_deref(), Some("host1.example.com"));
    }

    #[test]
    fn test_parse_comma_separated() {
        let config = r#"
provider=dnsexit, password=secret, host=host1.example.com,host2.example.com
"#;

        let parsed = Config::parse(config).unwrap();
        assert_eq!(parsed.dns_records(), vec!["host1.example.com", "host2.example.com"]);
    }

    #[test]
    fn test_parse_backslash_continuation() {
        let config = r#"
provider=dnsexit, \
password=secret, \
server=api.example.net:8080 \
"#;

        let parsed = Config::parse(config).unwrap();
        assert_eq!(parsed.provider.as_deref(), Some("dnsexit"));
        assert_eq!(parsed.password.as_deref(), Some("secret"));
        assert_eq!(parsed.server.as_deref(), Some("api.example.net:8080"));
    }

    #[test]
    fn test_hosts_accumulate() {
        let config = r#"
host=a.example.com
hostname=b.example.com
c.example.com
"#;

        let parsed = Config::parse(config).unwrap();
        assert_eq!(parsed.dns_records(), vec!["a.example.com", "b.example.com", "c.example.com"]);
    }

    #[test]
    fn test_ignore_comments() {
        let config = r#"
# This is a comment
password=secret, # rest of line ignored, not.a.host
# Another comment
host.example.com
"#;

        let parsed = Config::parse(config).unwrap();
        assert_eq!(parsed.password.as_deref(), Some("secret"));
        assert_eq!(parsed.dns_records(), vec!["host.example.com"]);
    }

    #[test]
    fn test_period_and_buffer_size() {
        let parsed = Config::parse("period=10m\nbuffer-size=512\n").unwrap();
        assert_eq!(parsed.period, Some(600));
        assert_eq!(parsed.buffer_size, Some(512));
        assert_eq!(parsed.request_capacity(), 512);

        assert!(Config::parse("period=often\n").is_err());
        assert!(Config::parse("buffer-size=-1\n").is_err());
    }

    #[test]
    fn test_unknown_key_ignored() {
        let parsed = Config::parse("ttl=300\npassword=key\n").unwrap();
        assert_eq!(parsed.password.as_deref(), Some("key"));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "password=filekey").unwrap();
        writeln!(file, "host=file.example.com").unwrap();

        let parsed = Config::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(parsed.password.as_deref(), Some("filekey"));
        assert_eq!(parsed.dns_records(), vec!["file.example.com"]);
    }

    #[test]
    fn test_from_missing_file() {
        let err = Config::from_file("/nonexistent/dnsexit-ddns.conf").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_merge_cli_overrides_file() {
        let file_config = Config {
            password: Some("filekey".to_string()),
            host: Some("file.example.com".to_string()),
            server: Some("file.server".to_string()),
            period: Some(60),
            ..Default::default()
        };
        let args = Args {
            password: Some("clikey".to_string()),
            period: Some("2h".to_string()),
            ..Default::default()
        };

        let merged = Config::merge(Some(file_config), &args).unwrap();
        assert_eq!(merged.password.as_deref(), Some("clikey"));
        assert_eq!(merged.host.as_deref(), Some("file.example.com"));
        assert_eq!(merged.server.as_deref(), Some("file.server"));
        assert_eq!(merged.period, Some(7200));
    }

    #[test]
    fn test_merge_invalid_period() {
        let args = Args {
            period: Some("soon".to_string()),
            ..Default::default()
        };
        assert!(Config::merge(None, &args).is_err());
    }

    #[test]
    fn test_validate() {
        let config = Config {
            password: Some("key".to_string()),
            host: Some("a.example.com".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        let no_host = Config {
            host: Some(" , ".to_string()),
            ..config.clone()
        };
        assert!(no_host.validate().unwrap_err().to_string().contains("Host is required"));

        let no_key = Config {
            password: None,
            ..config.clone()
        };
        assert!(no_key.validate().unwrap_err().to_string().contains("API key is required"));

        let zero_buffer = Config {
            buffer_size: Some(0),
            ..config
        };
        assert!(zero_buffer.validate().is_err());
    }

    #[test]
    fn test_update_context_defaults() {
        let config = Config {
            password: Some("ABC123".to_string()),
            ..Default::default()
        };

        let ctx = config.update_context("host.example.com", &DNSEXIT);
        assert_eq!(ctx.api_key, "ABC123");
        assert_eq!(ctx.alias_name, "host.example.com");
        assert_eq!(ctx.server_host, "api.dnsexit.com");
        assert_eq!(ctx.server_path, "/dns/ud/");
        assert_eq!(ctx.user_agent, crate::USER_AGENT);
        assert_eq!(config.provider_name(), DEFAULT_PROVIDER);
        assert_eq!(config.request_capacity(), DEFAULT_REQUEST_CAPACITY);
    }

    #[test]
    fn test_update_context_overrides() {
        let config = Config {
            password: Some("ABC123".to_string()),
            server: Some("127.0.0.1:8080".to_string()),
            path: Some("/custom/".to_string()),
            user_agent: Some("client/1.0".to_string()),
            ..Default::default()
        };

        let ctx = config.update_context("host.example.com", &DNSEXIT);
        assert_eq!(ctx.server_host, "127.0.0.1:8080");
        assert_eq!(ctx.server_path, "/custom/");
        assert_eq!(ctx.user_agent, "client/1.0");
    }

    #[test]
    fn test_checkip_url() {
        let mut config = Config::default();
        assert_eq!(config.checkip_url(), None);

        config.checkip_server = Some("ip.example.net".to_string());
        assert_eq!(config.checkip_url().as_deref(), Some("http://ip.example.net/"));

        config.checkip_server = Some("https://ip.example.net".to_string());
        config.checkip_path = Some("/ip".to_string());
        assert_eq!(config.checkip_url().as_deref(), Some("https://ip.example.net/ip"));
    }

    #[test]
    fn test_join_continued_lines() {
        let input = "a=1 \\\n  b=2\\\nc=3\n";
        assert_eq!(join_continued_lines(input), "a=1    b=2 c=3\n");
    }

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval("30s").unwrap(), 30);
        assert_eq!(parse_interval("5m").unwrap(), 300);
        assert_eq!(parse_interval("2h").unwrap(), 7200);
        assert_eq!(parse_interval("1d").unwrap(), 86400);
        assert_eq!(parse_interval("25d").unwrap(), 2160000);
        assert!(parse_interval("invalid").is_err());
        assert!(parse_interval("").is_err());
        assert!(parse_interval("5").is_err());
    }

    #[test]
    fn test_parse_interval_rejects_zero_and_overflow() {
        assert!(parse_interval("0s").unwrap_err().to_string().contains("greater than zero"));
        assert!(parse_interval("0d").is_err());

        let huge = format!("{}d", u64::MAX / 86400 + 1);
        assert!(parse_interval(&huge).unwrap_err().to_string().contains("too large"));
        assert_eq!(parse_interval(&format!("{}s", u64::MAX)).unwrap(), u64::MAX);
    }

    #[test]
    fn test_zero_period_in_file_is_an_error() {
        assert!(Config::parse("password=key\nhost=a.example.com\nperiod=0m\n").is_err());
    }
}
