use crate::clients::ProviderInfo;
use crate::config::Config;
use std::error::Error;
use std::net::IpAddr;
use std::process::Command;

/// Public services tried when the provider's check server fails
const FALLBACK_SERVICES: [&str; 2] = [
    "http://checkip.amazonaws.com",
    "http://icanhazip.com",
];

/// IP detection method
#[derive(Debug, Clone, PartialEq)]
pub enum IpDetectionMethod {
    /// Manual IP address
    Manual(String),
    /// Check server URL, `None` for the provider's own check endpoint
    Web(Option<String>),
    /// Execute command
    Command(String),
}

impl Default for IpDetectionMethod {
    fn default() -> Self {
        Self::Web(None)
    }
}

impl IpDetectionMethod {
    /// Pick the detection method from config: manual IP, then command, then check server.
    pub fn from_config(config: &Config) -> Self {
        if let Some(ip) = &config.ip {
            Self::Manual(ip.clone())
        } else if let Some(cmd) = &config.checkip_command {
            Self::Command(cmd.clone())
        } else {
            Self::Web(config.checkip_url())
        }
    }
}

/// Get external IP address from the provider's check endpoint, falling back to public services
pub fn get_external_ip(info: &ProviderInfo) -> Result<IpAddr, Box<dyn Error>> {
    let primary = info.checkip_address();
    let services = std::iter::once(primary.as_str()).chain(FALLBACK_SERVICES);

    let mut last_error = None;

    for service in services {
        match try_service(service, info.ipv6) {
            Ok(ip) => return Ok(ip),
            Err(e) => {
                log::debug!("Failed to get IP from {}: {}", service, e);
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| "Failed to get external IP from any service".into()))
}

/// Try to get an IPv4 (or IPv6) address from a specific service
fn try_service(url: &str, ipv6: bool) -> Result<IpAddr, Box<dyn Error>> {
    let resp = minreq::get(url)
        .with_header("User-Agent", crate::USER_AGENT)
        .with_timeout(10)
        .send()?;

    if resp.status_code != 200 {
        return Err(format!("HTTP error: {}", resp.status_code).into());
    }

    let body = resp.as_str()?;
    find_ip(body, ipv6).ok_or_else(|| format!("No {} address in response from {}", family(ipv6), url).into())
}

/// Find the first address of the wanted family in a check server response.
///
/// Some check servers wrap the address in text or HTML.
fn find_ip(body: &str, ipv6: bool) -> Option<IpAddr> {
    body.split(|c: char| !(c.is_ascii_hexdigit() || c == '.' || c == ':'))
        .filter(|word| !word.is_empty())
        .filter_map(|word| word.trim_matches(|c: char| c == '.' || c == ':').parse::<IpAddr>().ok())
        .find(|ip| ip.is_ipv6() == ipv6)
}

fn family(ipv6: bool) -> &'static str {
    if ipv6 {
        "IPv6"
    } else {
        "IPv4"
    }
}

/// Reject an address the provider cannot publish.
fn check_family(ip: IpAddr, info: &ProviderInfo) -> Result<IpAddr, Box<dyn Error>> {
    if ip.is_ipv6() != info.ipv6 {
        return Err(format!("{} is not an {} address, required by {}", ip, family(info.ipv6), info.name).into());
    }
    Ok(ip)
}

/// Parse and validate a provided IP address string
pub fn parse_ip(ip_str: &str) -> Result<IpAddr, Box<dyn Error>> {
    ip_str.parse().map_err(|e| {
        format!("'{}' is an invalid IP address: {}", ip_str, e).into()
    })
}

/// Get IP by executing a command
pub fn get_ip_from_command(cmd: &str) -> Result<IpAddr, Box<dyn Error>> {
    // Parse command into program and args
    let parts: Vec<&str> = cmd.split_whitespace().collect();
    let (program, args) = parts.split_first().ok_or("Empty command")?;

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| format!("Failed to execute command '{}': {}", cmd, e))?;

    if !output.status.success() {
        return Err(format!("Command '{}' failed with status: {}", cmd, output.status).into());
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let first_line = stdout.lines().next().unwrap_or("").trim();

    parse_ip(first_line)
}

/// Get IP address using specified detection method
pub fn get_ip_with_method(method: &IpDetectionMethod, info: &ProviderInfo) -> Result<IpAddr, Box<dyn Error>> {
    let ip = match method {
        IpDetectionMethod::Manual(ip_str) => parse_ip(ip_str)?,
        IpDetectionMethod::Web(Some(url)) => try_service(url, info.ipv6)?,
        IpDetectionMethod::Web(None) => get_external_ip(info)?,
        IpDetectionMethod::Command(cmd) => get_ip_from_command(cmd)?,
    };
    check_family(ip, info)
}
