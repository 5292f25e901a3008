use crate::clients::{CheckipSsl, DdnsProvider, ProviderInfo, ProviderRegistry, UpdateOutcome};
use crate::error::UpdateError;
use crate::http::HttpTransaction;
use crate::json::{self, TokenKind};
use crate::request::{self, UpdateContext};
use std::sync::Arc;

/// DNSExit update API, see https://dnsexit.com/apps/dynamic-dns-update-clients/
///
/// Placeholders: server path, API key, alias, server host, user agent.
pub const UPDATE_REQUEST_TEMPLATE: &str = concat!(
    "GET {}?",
    "apikey={}&",
    "host={} ",
    "HTTP/1.0\r\n",
    "Host: {}\r\n",
    "User-Agent: {}\r\n\r\n",
);

pub const DNSEXIT: ProviderInfo = ProviderInfo {
    name: "default@dnsexit.com",
    nousername: true,
    checkip_name: "ip3.dnsexit.com",
    checkip_url: "/",
    checkip_ssl: CheckipSsl::Unsupported,
    server_name: "api.dnsexit.com",
    server_url: "/dns/ud/",
    ipv6: false,
};

pub const DNSEXIT_V6: ProviderInfo = ProviderInfo {
    name: "ipv6@dnsexit.com",
    ipv6: true,
    ..DNSEXIT
};

const CODE_KEY: &str = "code";

/// DNSExit client
///
/// The API answers with a line of text followed by a JSON object whose
/// `code` field tells the result: `0` updated, `1` address unchanged,
/// anything else is an error.
#[derive(Debug, Clone)]
pub struct DnsExitClient {
    info: ProviderInfo,
}

impl DnsExitClient {
    pub fn new(info: ProviderInfo) -> Self {
        Self { info }
    }
}

impl DdnsProvider for DnsExitClient {
    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    fn build_request(&self, ctx: &UpdateContext, capacity: usize) -> Result<Vec<u8>, UpdateError> {
        request::build(ctx, UPDATE_REQUEST_TEMPLATE, capacity)
    }

    fn interpret_response(&self, transaction: &HttpTransaction) -> Result<UpdateOutcome, UpdateError> {
        interpret(transaction)
    }
}

/// Register the IPv4 and IPv6 variants, plus the short `dnsexit` alias.
pub fn register(registry: &mut ProviderRegistry) {
    let v4: Arc<dyn DdnsProvider> = Arc::new(DnsExitClient::new(DNSEXIT));
    registry.register(DNSEXIT.name, Arc::clone(&v4));
    registry.register("dnsexit", v4);
    registry.register(DNSEXIT_V6.name, Arc::new(DnsExitClient::new(DNSEXIT_V6)));
}

/// Classify a DNSExit response.
///
/// A rejected status line is a hard failure for this cycle. Anything else
/// ends up as an outcome; a body we cannot read is `RetryLater`.
pub fn interpret(transaction: &HttpTransaction) -> Result<UpdateOutcome, UpdateError> {
    if !transaction.status_valid() {
        return Err(UpdateError::TransportRejected {
            status: transaction.status,
        });
    }

    let code = extract_code(&transaction.body);
    log::debug!("DNSExit result code: {}", code.unwrap_or(-1));

    Ok(classify(code))
}

/// Pull the numeric `code` out of a DNSExit response body.
///
/// The JSON document starts after the first newline. `None` if there is no
/// newline, the JSON does not parse, the document is not an object, or no
/// `code` key is followed by a number.
pub fn extract_code(body: &str) -> Option<i64> {
    let start = body.find('\n')?;
    code_value(&body[start..])
}

/// Map a result code onto an outcome.
pub fn classify(code: Option<i64>) -> UpdateOutcome {
    match code {
        Some(0) => UpdateOutcome::Success,
        Some(1) => UpdateOutcome::NoChange,
        _ => UpdateOutcome::RetryLater,
    }
}

fn code_value(json: &str) -> Option<i64> {
    let tokens = match json::tokenize(json) {
        Ok(tokens) => tokens,
        Err(e) => {
            log::debug!("Failed parsing DNSExit response: {}", e);
            return None;
        }
    };

    if tokens.first().map(|t| t.kind) != Some(TokenKind::Object) {
        log::error!("JSON response contained no objects.");
        return None;
    }

    for pair in tokens[1..].windows(2) {
        let (key, value) = (&pair[0], &pair[1]);
        if !json::key_eq(key, CODE_KEY) || value.kind != TokenKind::Primitive {
            continue;
        }

        // true, false and null are not codes, keep looking
        match value.text.as_bytes().first() {
            Some(b't' | b'f' | b'n') => continue,
            _ => return Some(json::leading_int(&value.text)),
        }
    }

    log::info!("Could not find number primitive '{}'.", CODE_KEY);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn create_test_context() -> UpdateContext {
        UpdateContext {
            api_key: "ABC123".to_string(),
            alias_name: "host.example.com".to_string(),
            server_host: DNSEXIT.server_name.to_string(),
            server_path: DNSEXIT.server_url.to_string(),
            user_agent: "client/1.0".to_string(),
        }
    }

    fn ok(body: &str) -> HttpTransaction {
        HttpTransaction::new(200, body)
    }

    #[test]
    fn test_provider_metadata() {
        let client = DnsExitClient::new(DNSEXIT);
        let info = client.info();

        assert_eq!(client.provider_name(), "default@dnsexit.com");
        assert_eq!(info.server_name, "api.dnsexit.com");
        assert_eq!(info.server_url, "/dns/ud/");
        assert_eq!(info.checkip_name, "ip3.dnsexit.com");
        assert_eq!(info.checkip_url, "/");
        assert_eq!(info.checkip_ssl, CheckipSsl::Unsupported);
        assert!(info.nousername);
        assert!(!info.ipv6);
    }

    #[test]
    fn test_ipv6_variant_shares_endpoints() {
        assert_eq!(DNSEXIT_V6.name, "ipv6@dnsexit.com");
        assert!(DNSEXIT_V6.ipv6);
        assert_eq!(DNSEXIT_V6.server_name, DNSEXIT.server_name);
        assert_eq!(DNSEXIT_V6.server_url, DNSEXIT.server_url);
        assert_eq!(DNSEXIT_V6.checkip_name, DNSEXIT.checkip_name);
    }

    #[test]
    fn test_build_request() {
        let client = DnsExitClient::new(DNSEXIT);
        let request = client
            .build_request(&create_test_context(), request::DEFAULT_REQUEST_CAPACITY)
            .unwrap();

        assert_eq!(
            String::from_utf8(request).unwrap(),
            "GET /dns/ud/?apikey=ABC123&host=host.example.com HTTP/1.0\r\nHost: api.dnsexit.com\r\nUser-Agent: client/1.0\r\n\r\n"
        );
    }

    #[test]
    fn test_build_request_truncated() {
        let client = DnsExitClient::new(DNSEXIT);
        let result = client.build_request(&create_test_context(), 32);

        assert!(matches!(
            result,
            Err(UpdateError::TruncatedRequest { capacity: 32, .. })
        ));
    }

    #[test]
    fn test_validate_config_needs_only_api_key() {
        let client = DnsExitClient::new(DNSEXIT);

        let config = Config {
            password: Some("ABC123".to_string()),
            ..Default::default()
        };
        assert!(client.validate_config(&config).is_ok());

        let config = Config {
            password: Some(String::new()),
            ..Default::default()
        };
        let err = client.validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("password is required"));
    }

    #[test]
    fn test_code_success() {
        assert_eq!(extract_code("OK\n{\"code\":0}"), Some(0));
        assert_eq!(interpret(&ok("OK\n{\"code\":0}")), Ok(UpdateOutcome::Success));
    }

    #[test]
    fn test_code_no_change() {
        assert_eq!(extract_code("OK\n{\"code\":1}"), Some(1));
        assert_eq!(interpret(&ok("OK\n{\"code\":1}")), Ok(UpdateOutcome::NoChange));
    }

    #[test]
    fn test_code_provider_error() {
        assert_eq!(extract_code("OK\n{\"code\":5}"), Some(5));
        assert_eq!(interpret(&ok("OK\n{\"code\":5}")), Ok(UpdateOutcome::RetryLater));
    }

    #[test]
    fn test_no_newline() {
        assert_eq!(extract_code("no json here"), None);
        assert_eq!(interpret(&ok("no json here")), Ok(UpdateOutcome::RetryLater));
    }

    #[test]
    fn test_null_code_is_skipped() {
        assert_eq!(extract_code("OK\n{\"code\":null}"), None);
        assert_eq!(interpret(&ok("OK\n{\"code\":null}")), Ok(UpdateOutcome::RetryLater));
    }

    #[test]
    fn test_non_numeric_code_continues_scanning() {
        assert_eq!(extract_code("OK\n{\"code\":true,\"code\":1}"), Some(1));
        assert_eq!(extract_code("OK\n{\"code\":false,\"x\":{\"code\":0}}"), Some(0));
        assert_eq!(extract_code("OK\n{\"code\":\"0\",\"code\":4}"), Some(4));
        assert_eq!(extract_code("OK\n{\"code\":{\"a\":1}}"), None);
    }

    #[test]
    fn test_first_numeric_code_wins() {
        assert_eq!(extract_code("OK\n{\"code\":3,\"code\":0}"), Some(3));
        assert_eq!(extract_code("OK\n{\"a\":{\"code\":2},\"code\":0}"), Some(2));
    }

    #[test]
    fn test_leading_numeric_prefix() {
        assert_eq!(extract_code("OK\n{\"code\":2.9}"), Some(2));
        assert_eq!(extract_code("OK\n{\"code\":-1}"), Some(-1));
        assert_eq!(classify(Some(-1)), UpdateOutcome::RetryLater);
    }

    #[test]
    fn test_code_read_from_source_text() {
        assert_eq!(extract_code("OK\n{\"code\":5e-1}"), Some(5));
        assert_eq!(interpret(&ok("OK\n{\"code\":5e-1}")), Ok(UpdateOutcome::RetryLater));

        assert_eq!(extract_code("OK\n{\"code\":1E-1}"), Some(1));
        assert_eq!(extract_code("OK\n{\"code\":1e2}"), Some(1));
        assert_eq!(interpret(&ok("OK\n{\"code\":1e2}")), Ok(UpdateOutcome::NoChange));
        assert_eq!(extract_code("OK\n{\"code\":0.0}"), Some(0));
    }

    #[test]
    fn test_escaped_key_is_not_code() {
        assert_eq!(extract_code("OK\n{\"co\\u0064e\":0}"), None);
        assert_eq!(extract_code("OK\n{\"co\\u0064e\":0,\"code\":1}"), Some(1));
    }

    #[test]
    fn test_realistic_response() {
        let body = "Success\n{\"code\":0,\"message\":\"Success\",\"details\":[\"host.example.com IP set to 203.0.113.7\"]}\n";
        assert_eq!(extract_code(body), Some(0));

        let body = "HTTP/1.1 200\n{\"code\":1,\"message\":\"IP not changed. To prevent abuse, update is skipped.\"}";
        assert_eq!(interpret(&ok(body)), Ok(UpdateOutcome::NoChange));

        let body = "Failed\n{\"code\":2,\"message\":\"Invalid API Key\"}";
        assert_eq!(interpret(&ok(body)), Ok(UpdateOutcome::RetryLater));
    }

    #[test]
    fn test_malformed_json() {
        assert_eq!(extract_code("OK\n{\"code\":"), None);
        assert_eq!(extract_code("OK\n"), None);
        assert_eq!(extract_code("OK\nnot json"), None);
    }

    #[test]
    fn test_top_level_not_object() {
        assert_eq!(extract_code("OK\n[\"code\",0]"), None);
        assert_eq!(extract_code("OK\n0"), None);
    }

    #[test]
    fn test_code_as_string_value_is_not_a_key_match() {
        // "code" appearing as a value is followed by a key, not a primitive
        assert_eq!(extract_code("OK\n{\"field\":\"code\",\"other\":0}"), None);
    }

    #[test]
    fn test_extract_code_idempotent() {
        let body = "OK\n{\"code\":true,\"code\":7}";
        assert_eq!(extract_code(body), extract_code(body));
        assert_eq!(extract_code(body), Some(7));
    }

    #[test]
    fn test_rejected_status_is_hard_failure() {
        for status in [301, 404, 500, 503] {
            let tx = HttpTransaction::new(status, "OK\n{\"code\":0}");
            assert_eq!(interpret(&tx), Err(UpdateError::TransportRejected { status }));
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(Some(0)), UpdateOutcome::Success);
        assert_eq!(classify(Some(1)), UpdateOutcome::NoChange);
        assert_eq!(classify(Some(2)), UpdateOutcome::RetryLater);
        assert_eq!(classify(Some(i64::MAX)), UpdateOutcome::RetryLater);
        assert_eq!(classify(None), UpdateOutcome::RetryLater);
    }

    #[test]
    fn test_register() {
        let mut registry = ProviderRegistry::new();
        register(&mut registry);

        let provider = registry.create_client("dnsexit").unwrap();
        let tx = ok("OK\n{\"code\":0}");
        assert_eq!(provider.interpret_response(&tx), Ok(UpdateOutcome::Success));
    }
}
