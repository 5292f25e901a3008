//! Update request rendering.
//!
//! Provider templates are plain HTTP/1.0 request text with five positional
//! `{}` placeholders, always filled in this order:
//! server path, API key, alias name, server host, user agent.
//!
//! Fields are inserted verbatim. Escaping the alias or the key, if a
//! provider ever needs it, is the job of whoever builds the context.

use crate::error::UpdateError;

/// Default size of the request buffer, in bytes.
pub const DEFAULT_REQUEST_CAPACITY: usize = 2500;

const PLACEHOLDER: &str = "{}";
const FIELD_COUNT: usize = 5;

/// Everything needed to render one update request for one alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateContext {
    pub api_key: String,
    pub alias_name: String,
    pub server_host: String,
    pub server_path: String,
    pub user_agent: String,
}

impl UpdateContext {
    fn fields(&self) -> [&str; FIELD_COUNT] {
        [
            self.server_path.as_str(),
            self.api_key.as_str(),
            self.alias_name.as_str(),
            self.server_host.as_str(),
            self.user_agent.as_str(),
        ]
    }
}

/// Render `template` for `ctx` into `buf`.
///
/// Returns the number of bytes written. If the request does not fit, the
/// leading part that fits is still copied into `buf` (like a bounded
/// formatted write) and [`UpdateError::TruncatedRequest`] is returned; the
/// buffer contents must not be sent in that case.
///
/// # Examples
///
/// ```
/// use dnsexit_ddns::request::{render, UpdateContext};
///
/// let ctx = UpdateContext {
///     api_key: "key".into(),
///     alias_name: "a.example.com".into(),
///     server_host: "api.example.com".into(),
///     server_path: "/u".into(),
///     user_agent: "ua".into(),
/// };
/// let mut buf = [0u8; 128];
/// let n = render(&ctx, "{}?k={}&h={} {} {}", &mut buf).unwrap();
/// assert_eq!(&buf[..n], b"/u?k=key&h=a.example.com api.example.com ua");
/// ```
pub fn render(ctx: &UpdateContext, template: &str, buf: &mut [u8]) -> Result<usize, UpdateError> {
    let text = substitute(template, &ctx.fields())?;
    let bytes = text.as_bytes();

    let written = bytes.len().min(buf.len());
    buf[..written].copy_from_slice(&bytes[..written]);

    if bytes.len() > buf.len() {
        return Err(UpdateError::TruncatedRequest {
            needed: bytes.len(),
            capacity: buf.len(),
        });
    }

    Ok(written)
}

/// Render `template` into a freshly allocated buffer of `capacity` bytes and
/// return exactly the rendered request.
pub fn build(ctx: &UpdateContext, template: &str, capacity: usize) -> Result<Vec<u8>, UpdateError> {
    let mut buf = vec![0u8; capacity];
    let written = render(ctx, template, &mut buf)?;
    buf.truncate(written);
    Ok(buf)
}

fn substitute(template: &str, fields: &[&str; FIELD_COUNT]) -> Result<String, UpdateError> {
    let found = template.matches(PLACEHOLDER).count();
    if found != FIELD_COUNT {
        return Err(UpdateError::Template {
            expected: FIELD_COUNT,
            found,
        });
    }

    let extra: usize = fields.iter().map(|f| f.len()).sum();
    let mut out = String::with_capacity(template.len() + extra);
    let mut pieces = template.split(PLACEHOLDER);

    if let Some(head) = pieces.next() {
        out.push_str(head);
    }
    for (field, piece) in fields.iter().zip(pieces) {
        out.push_str(field);
        out.push_str(piece);
    }

    Ok(out)
}
