//! URL validation gate run before any call to the scraping service.
//!
//! A URL is accepted only when it parses as an absolute URI with both a
//! scheme and a non-empty host. Parsing never touches the network and never
//! panics; anything unparsable is simply invalid.

use crate::error::WebRagError;
use url::Url;

/// `true` iff `input` has a non-empty scheme and a non-empty host.
pub fn is_valid_url(input: &str) -> bool {
    parse_absolute(input).is_some()
}

/// Parse `input`, returning [`WebRagError::InvalidUrl`] when it fails the
/// [`is_valid_url`] check.
pub fn validate_url(input: &str) -> Result<Url, WebRagError> {
    parse_absolute(input).ok_or_else(|| WebRagError::InvalidUrl {
        input: input.to_string(),
    })
}

fn parse_absolute(input: &str) -> Option<Url> {
    if !has_authority(input) {
        return None;
    }
    let url = Url::parse(input).ok()?;
    if url.scheme().is_empty() {
        return None;
    }
    match url.host_str() {
        Some(host) if !host.is_empty() => Some(url),
        _ => None,
    }
}

/// `true` when the text after `<scheme>:` is `//` followed by a non-empty
/// authority. The WHATWG parser infers a host for `http:example.com` and
/// similar, so this is checked on the raw input.
fn has_authority(input: &str) -> bool {
    let Some((scheme, rest)) = input.trim().split_once(':') else {
        return false;
    };
    if scheme.is_empty() {
        return false;
    }
    match rest.strip_prefix("//") {
        Some(after) => after
            .split(['/', '?', '#'])
            .next()
            .is_some_and(|authority| !authority.is_empty()),
        None => false,
    }
}
