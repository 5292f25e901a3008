use crate::config::Config;
use crate::error::UpdateError;
use crate::http::{self, HttpTransaction};
use crate::request::UpdateContext;
use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;

pub mod dnsexit;

/// What an update attempt amounted to, once the provider has answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The provider applied the update
    Success,
    /// The provider already had this address, nothing to do
    NoChange,
    /// Error or unreadable answer, try again at the next check
    RetryLater,
}

impl UpdateOutcome {
    /// True when the alias can be considered up to date.
    pub fn is_ok(&self) -> bool {
        matches!(self, UpdateOutcome::Success | UpdateOutcome::NoChange)
    }

    /// Status string recorded in the update cache
    pub fn as_status(&self) -> &'static str {
        match self {
            UpdateOutcome::Success => "good",
            UpdateOutcome::NoChange => "nochg",
            UpdateOutcome::RetryLater => "retry",
        }
    }
}

/// TLS support of a provider's IP check endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckipSsl {
    Unsupported,
    Supported,
    Required,
}

/// Static description of a provider, fixed at registration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInfo {
    /// Registered name, e.g. `default@dnsexit.com`
    pub name: &'static str,
    /// Provider authenticates with an API key only
    pub nousername: bool,
    pub checkip_name: &'static str,
    pub checkip_url: &'static str,
    pub checkip_ssl: CheckipSsl,
    pub server_name: &'static str,
    pub server_url: &'static str,
    /// Registered for IPv6 (AAAA) updates: the address is discovered and
    /// the update sent over IPv6
    pub ipv6: bool,
}

impl ProviderInfo {
    /// Full URL of the IP check endpoint.
    pub fn checkip_address(&self) -> String {
        let scheme = match self.checkip_ssl {
            CheckipSsl::Unsupported => "http",
            CheckipSsl::Supported | CheckipSsl::Required => "https",
        };
        format!("{}://{}{}", scheme, self.checkip_name, self.checkip_url)
    }
}

/// Common trait that all DDNS provider implementations must implement
///
/// A provider never touches the network: it renders the update request and
/// judges the response, the caller moves the bytes in between.
pub trait DdnsProvider: Send + Sync {
    /// Static provider metadata
    fn info(&self) -> &ProviderInfo;

    /// Render the update request for one alias into at most `capacity` bytes
    fn build_request(&self, ctx: &UpdateContext, capacity: usize) -> Result<Vec<u8>, UpdateError>;

    /// Classify the provider's answer to a request built by `build_request`
    fn interpret_response(&self, transaction: &HttpTransaction) -> Result<UpdateOutcome, UpdateError>;

    /// Validate that the configuration carries what this provider needs
    fn validate_config(&self, config: &Config) -> Result<(), Box<dyn Error>> {
        let info = self.info();
        if !info.nousername && config.username.as_deref().map_or(true, str::is_empty) {
            return Err(format!("username is required for {}", info.name).into());
        }
        if config.password.as_deref().map_or(true, str::is_empty) {
            return Err(format!("password is required for {}", info.name).into());
        }
        Ok(())
    }

    /// Get the provider name for logging purposes
    fn provider_name(&self) -> &str {
        self.info().name
    }
}

/// Run one update: render the request, send it, classify the answer.
///
/// Transport failures and request-level errors are returned as `Err`;
/// anything the provider answered becomes an outcome.
pub fn send_update(
    provider: &dyn DdnsProvider,
    ctx: &UpdateContext,
    capacity: usize,
) -> Result<UpdateOutcome, Box<dyn Error>> {
    let request = provider.build_request(ctx, capacity)?;
    log::debug!("Sending {} byte update request for {} to {}", request.len(), ctx.alias_name, ctx.server_host);

    let ipv6 = provider.info().ipv6;
    let transaction = http::send(&ctx.server_host, &request, http::DEFAULT_TIMEOUT, ipv6)?;
    log::debug!("Response status: {}, body: {}", transaction.status, transaction.body.trim());

    Ok(provider.interpret_response(&transaction)?)
}

/// Provider lookup by name.
///
/// Names are matched case-insensitively. The same provider may be
/// registered under several names.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn DdnsProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in provider
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        dnsexit::register(&mut registry);
        registry
    }

    pub fn register(&mut self, name: &str, provider: Arc<dyn DdnsProvider>) {
        let name = name.to_ascii_lowercase();
        if self.providers.insert(name.clone(), provider).is_some() {
            log::warn!("Provider {} registered twice, keeping the latest", name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn DdnsProvider>> {
        self.providers.get(&name.to_ascii_lowercase()).cloned()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Look up `name`, failing with the list of supported names.
    pub fn create_client(&self, name: &str) -> Result<Arc<dyn DdnsProvider>, Box<dyn Error>> {
        self.get(name).ok_or_else(|| {
            format!(
                "Unsupported provider: {}. Supported providers: {}",
                name,
                self.names().join(", ")
            )
            .into()
        })
    }
}
