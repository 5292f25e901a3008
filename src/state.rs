//! Update cache, tracking the last address sent for each alias
//!
//! The cache lets the updater skip aliases whose address has not changed,
//! and remember failures so that a `RetryLater` answer is retried on the
//! next check instead of being mistaken for an applied update.
//!
//! Format is one line per alias: comma-separated key=value pairs, a space,
//! then the alias.
//!
//! ```text
//! ## dnsexit-ddns cache file
//! ip=203.0.113.7,mtime=1704067200,status=good home.example.com
//! ```

use crate::clients::UpdateOutcome;
use std::collections::HashMap;
use std::error::Error;
use std::fs;
use std::io::Write;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Forced refresh after this many seconds without a successful update
pub const DEFAULT_MAX_INTERVAL: u64 = 30 * 86400;

/// State for a single alias
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostState {
    /// Last address the provider accepted
    pub ip: Option<IpAddr>,

    /// Last successful update timestamp (Unix epoch seconds)
    pub mtime: Option<u64>,

    /// Last update status ("good", "nochg", or a failure description)
    pub status: Option<String>,

    /// Time of the last failed attempt
    pub atime: Option<u64>,
}

impl HostState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Determines whether the provided IP differs from the cached IP.
    ///
    /// Returns `true` if there is no cached IP or if `new_ip` is different from the cached IP.
    ///
    /// # Examples
    ///
    /// ```
    /// use dnsexit_ddns::state::HostState;
    /// use std::net::{IpAddr, Ipv4Addr};
    ///
    /// let mut state = HostState::new();
    /// let ip = IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4));
    /// assert!(state.ip_changed(ip));
    ///
    /// state.ip = Some(ip);
    /// assert!(!state.ip_changed(ip));
    /// ```
    pub fn ip_changed(&self, new_ip: IpAddr) -> bool {
        match self.ip {
            Some(cached_ip) => cached_ip != new_ip,
            None => true,  // No cached IP means we should update
        }
    }

    /// Record a successful update: store the IP, the status and the time, clear the error time.
    pub fn update_success(&mut self, ip: IpAddr, status: &str) {
        self.ip = Some(ip);
        self.mtime = Some(current_timestamp());
        self.status = Some(status.to_string());
        self.atime = None;
    }

    /// Record a failed update. The cached IP is kept so the next check retries.
    pub fn update_failure(&mut self, error: &str) {
        self.status = Some(format!("FAILED: {}", error));
        self.atime = Some(current_timestamp());
    }

    /// Record the provider's verdict for an update of `ip`.
    pub fn record(&mut self, ip: IpAddr, outcome: UpdateOutcome) {
        if outcome.is_ok() {
            self.update_success(ip, outcome.as_status());
        } else {
            self.update_failure(outcome.as_status());
        }
    }

    fn to_line(&self, alias: &str) -> Option<String> {
        let mut parts = Vec::new();

        if let Some(ip) = self.ip {
            parts.push(format!("ip={}", ip));
        }
        if let Some(mtime) = self.mtime {
            parts.push(format!("mtime={}", mtime));
        }
        if let Some(status) = &self.status {
            // Separators would break the line format
            parts.push(format!("status={}", status.replace([',', ' ', '\n'], "_")));
        }
        if let Some(atime) = self.atime {
            parts.push(format!("atime={}", atime));
        }

        if parts.is_empty() {
            None
        } else {
            Some(format!("{} {}", parts.join(","), alias))
        }
    }

    fn from_opts(opts: &str) -> Self {
        let mut state = HostState::new();

        for pair in opts.split(',') {
            let Some((key, value)) = pair.trim().split_once('=') else {
                continue;
            };
            let value = value.trim();

            match key.trim() {
                "ip" => state.ip = value.parse().ok(),
                "mtime" => state.mtime = value.parse().ok(),
                "status" => state.status = Some(value.to_string()),
                "atime" => state.atime = value.parse().ok(),
                _ => {}  // Ignore unknown keys
            }
        }

        state
    }
}

/// State manager - handles reading/writing cache file
pub struct StateManager {
    cache_file: PathBuf,
    states: HashMap<String, HostState>,
}

impl StateManager {
    /// Creates a new `StateManager`, loading the cache file if it exists.
    ///
    /// If `cache_file` is `None`, the per-user cache directory is used.
    pub fn new(cache_file: Option<PathBuf>) -> Result<Self, Box<dyn Error>> {
        let cache_file = match cache_file {
            Some(path) => path,
            None => Self::default_cache_path()?,
        };

        let mut manager = Self {
            cache_file,
            states: HashMap::new(),
        };

        if manager.cache_file.exists() {
            manager.load()?;
        }

        Ok(manager)
    }

    fn default_cache_path() -> Result<PathBuf, Box<dyn Error>> {
        let cache_dir = dirs::cache_dir().ok_or("Failed to determine cache file location")?;
        Ok(cache_dir.join("dnsexit-ddns").join("dnsexit-ddns.cache"))
    }

    pub fn cache_file(&self) -> &Path {
        &self.cache_file
    }

    pub fn get(&self, alias: &str) -> Option<&HostState> {
        self.states.get(alias)
    }

    /// Get a mutable HostState for the alias, inserting a default state if none exists.
    pub fn get_mut(&mut self, alias: &str) -> &mut HostState {
        self.states.entry(alias.to_string()).or_default()
    }

    /// Loads state entries from the cache file.
    ///
    /// Skips empty lines and lines beginning with `##`. Lines without an
    /// alias are ignored.
    pub fn load(&mut self) -> Result<(), Box<dyn Error>> {
        let content = fs::read_to_string(&self.cache_file)?;

        for line in content.lines() {
            let line = line.trim();

            // Skip comments and empty lines
            if line.is_empty() || line.starts_with("##") {
                continue;
            }

            // Find last space to separate options from alias
            if let Some((opts, alias)) = line.rsplit_once(' ') {
                let alias = alias.trim();
                if !alias.is_empty() {
                    self.states.insert(alias.to_string(), HostState::from_opts(opts));
                }
            }
        }

        Ok(())
    }

    /// Write all states to the cache file, creating its directory if needed.
    pub fn save(&self) -> Result<(), Box<dyn Error>> {
        if let Some(parent) = self.cache_file.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::File::create(&self.cache_file)?;

        writeln!(file, "## dnsexit-ddns cache file")?;
        writeln!(file, "## last updated at {} ({})",
                 format_timestamp(current_timestamp()),
                 current_timestamp())?;

        let mut aliases: Vec<&String> = self.states.keys().collect();
        aliases.sort();

        for alias in aliases {
            if let Some(line) = self.states[alias].to_line(alias) {
                writeln!(file, "{}", line)?;
            }
        }

        Ok(())
    }

    /// Decide whether `alias` needs an update.
    ///
    /// The returned boolean says whether to update; when skipping, the
    /// string says why.
    pub fn should_update(
        &self,
        alias: &str,
        ip_changed: bool,
        force: bool,
        max_interval: u64,  // seconds
    ) -> (bool, Option<String>) {
        if force {
            return (true, None);
        }

        let Some(state) = self.states.get(alias) else {
            // No previous state, allow update
            return (true, None);
        };

        // Last attempt failed: retry regardless of the address
        if state.atime.is_some() {
            return (true, None);
        }

        // Periodic refresh keeps the provider from expiring the record
        if let Some(mtime) = state.mtime {
            if current_timestamp() >= mtime.saturating_add(max_interval) {
                let days = max_interval / 86400;
                return (true, Some(format!(
                    "update forced because it has been {} days since the previous update",
                    days
                )));
            }
        }

        if !ip_changed {
            return (false, Some("IP address hasn't changed".to_string()));
        }

        (true, None)
    }
}

/// Get the current Unix timestamp in seconds.
fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// Basic debug representation, good enough for the cache header
fn format_timestamp(timestamp: u64) -> String {
    let datetime = UNIX_EPOCH + std::time::Duration::from_secs(timestamp);
    format!("{:?}", datetime)
}
