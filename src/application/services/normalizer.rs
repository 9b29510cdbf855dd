//! Request parameter parsing and URL rewrite rules.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{LogicalRequest, ProxyError, ProxyResult};

/// Characters escaped in the embedded URL of a redirect location.
const QUERY_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const LEGACY_PATTERN: &str = r"^(view/)?([a-f0-9]+)/(.*?)\.(.*)$";
const WEBP_MARKER: &str = "@webp";
const DOUBLED_EXTENSIONS: [&str; 2] = ["..jpeg", "..png"];
const PLAIN_SEGMENT: &str = "plain/";

/// Host-specific rewrite configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteRules {
    /// Hosts of this proxy; URLs containing them are unwrapped instead of proxied.
    pub self_hosts: Vec<String>,
    /// Prefix of the legacy content host whose links are rewritten.
    pub legacy_host: String,
    /// Base URL legacy links are rewritten onto.
    pub canonical_media_base: String,
    /// Redirect-wrapper prefixes stripped from embedded URLs.
    pub decommissioned_prefixes: Vec<String>,
    /// Patterns of upstream URLs clients are sent to directly.
    pub bypass_patterns: Vec<String>,
}

impl Default for RewriteRules {
    fn default() -> Self {
        Self {
            self_hosts: vec!["https://thumbnails.odycdn.com".to_string()],
            legacy_host: "https://spee.ch/".to_string(),
            canonical_media_base: "https://player.odycdn.com/speech".to_string(),
            decommissioned_prefixes: vec![
                "https://lbry-boost.org/redirect-event?source=".to_string(),
            ],
            bypass_patterns: vec![r"^https?://i?\.?imgur\.com/.+?$".to_string()],
        }
    }
}

/// Redirect produced by a rewrite rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    /// Value of the `Location` header.
    pub location: String,
    /// 308 when true, 307 otherwise.
    pub permanent: bool,
}

impl Redirect {
    fn temporary(location: String) -> Self {
        Self {
            location,
            permanent: false,
        }
    }

    fn permanent(location: String) -> Self {
        Self {
            location,
            permanent: true,
        }
    }
}

/// Outcome of normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    /// Fetch and transcode this request.
    Proceed(LogicalRequest),
    /// Answer with a redirect; nothing is fetched.
    Redirect(Redirect),
}

/// Turns raw route parameters into a [`LogicalRequest`] or a redirect.
pub struct UrlNormalizer {
    rules: RewriteRules,
    legacy: Regex,
    bypass: Vec<Regex>,
    default_quality: u32,
}

impl UrlNormalizer {
    /// Compiles `rules`.
    ///
    /// # Errors
    ///
    /// Returns an error if a bypass pattern is not a valid regular expression.
    pub fn new(rules: RewriteRules, default_quality: u32) -> Result<Self, regex::Error> {
        let bypass = rules
            .bypass_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            legacy: Regex::new(LEGACY_PATTERN)?,
            bypass,
            rules,
            default_quality,
        })
    }

    /// Normalizes an optimize request.
    ///
    /// `raw_path_and_query` is the undecoded request target; it is used to
    /// recover a query string that routing split off the embedded URL.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::MalformedInput`] for unparsable dimensions or
    /// quality, or a self-referencing URL with no inner URL.
    pub fn normalize(
        &self,
        dimensions: &str,
        quality: &str,
        url_param: &str,
        raw_path_and_query: &str,
    ) -> ProxyResult<Normalized> {
        let (width, height) = parse_dimensions(dimensions)?;
        let quality = parse_quality(quality)?;
        let source_url = extract_upstream_url(url_param, raw_path_and_query);
        let redirect_to =
            |url: &str| format!("/optimize/s:{width}:{height}/quality:{quality}/plain/{}", query_escape(url));

        if self.bypass.iter().any(|re| re.is_match(&source_url)) {
            debug!(url = %source_url, "Bypassing proxy for host");
            return Ok(Normalized::Redirect(Redirect::temporary(source_url)));
        }

        if let Some(rest) = source_url.strip_prefix(self.rules.legacy_host.as_str())
            && let Some(parts) = self.legacy.captures(rest)
        {
            let canonical = format!(
                "{}/{}:{}.{}",
                self.rules.canonical_media_base, &parts[3], &parts[2], &parts[4]
            );
            debug!(from = %source_url, to = %canonical, "Rewriting legacy content link");
            return Ok(Normalized::Redirect(Redirect::temporary(redirect_to(
                &canonical,
            ))));
        }

        if let Some(stripped) = source_url.strip_suffix(WEBP_MARKER) {
            return Ok(Normalized::Redirect(Redirect::permanent(redirect_to(
                stripped,
            ))));
        }

        if let Some(stripped) = DOUBLED_EXTENSIONS
            .iter()
            .find_map(|ext| source_url.strip_suffix(ext))
        {
            return Ok(Normalized::Redirect(Redirect::permanent(redirect_to(
                stripped,
            ))));
        }

        if let Some(prefix) = self
            .rules
            .decommissioned_prefixes
            .iter()
            .find(|p| source_url.contains(p.as_str()))
        {
            let unwrapped = source_url.replace(prefix.as_str(), "");
            return Ok(Normalized::Redirect(Redirect::permanent(redirect_to(
                &unwrapped,
            ))));
        }

        let bare = url_param.strip_prefix('/').unwrap_or(url_param);
        if self.rules.self_hosts.iter().any(|h| bare.contains(h.as_str())) {
            return match bare.rfind(PLAIN_SEGMENT) {
                Some(idx) if idx > 0 => {
                    let inner = &bare[idx + PLAIN_SEGMENT.len()..];
                    debug!(inner = %inner, "Unwrapping self-referencing URL");
                    Ok(Normalized::Redirect(Redirect::permanent(redirect_to(inner))))
                }
                _ => Err(ProxyError::malformed("malformed recursive URL")),
            };
        }

        Ok(Normalized::Proceed(LogicalRequest::new(
            source_url, width, height, quality,
        )))
    }

    /// Redirect for the legacy route without explicit size or quality.
    #[must_use]
    pub fn legacy_redirect(&self, url_param: &str, raw_path_and_query: &str) -> Redirect {
        let source_url = extract_upstream_url(url_param, raw_path_and_query);
        Redirect::temporary(format!(
            "/optimize/s:0:0/quality:{}/plain/{}",
            self.default_quality,
            query_escape(&source_url)
        ))
    }
}

/// Parses `s:<width>:<height>`.
///
/// When both sides are non-zero the height is dropped so resizing follows the
/// source aspect ratio.
///
/// # Errors
///
/// Returns [`ProxyError::MalformedInput`] unless there are exactly three parts
/// and the last two are unsigned integers.
pub fn parse_dimensions(segment: &str) -> ProxyResult<(u32, u32)> {
    let parts: Vec<&str> = segment.split(':').collect();
    let [_, width, height] = parts.as_slice() else {
        return Err(ProxyError::malformed(
            "dimensions should be in the form of /s:width:height/",
        ));
    };
    let width = parse_number("width", width)?;
    let height = parse_number("height", height)?;
    if width != 0 && height != 0 {
        return Ok((width, 0));
    }
    Ok((width, height))
}

/// Parses `quality:<q>`.
///
/// # Errors
///
/// Returns [`ProxyError::MalformedInput`] if the prefix is missing or the value
/// is not an unsigned integer.
pub fn parse_quality(segment: &str) -> ProxyResult<u32> {
    let value = segment
        .strip_prefix("quality:")
        .ok_or_else(|| ProxyError::malformed("quality should be in the form of /quality:value/"))?;
    parse_number("quality", value)
}

fn parse_number(name: &str, value: &str) -> ProxyResult<u32> {
    value
        .parse::<u32>()
        .map_err(|e| ProxyError::malformed(format!("invalid {name} {value:?}: {e}")))
}

/// Recovers the upstream URL from the wildcard path value.
///
/// Routing drops the query string from path parameters, so whatever follows
/// the value in the raw request target is re-attached.
#[must_use]
pub fn extract_upstream_url(url_param: &str, raw_path_and_query: &str) -> String {
    let url = url_param.strip_prefix('/').unwrap_or(url_param);
    if url.is_empty() {
        return String::new();
    }
    let trailing = raw_path_and_query
        .split_once(url)
        .map(|(_, rest)| rest.split(url).next().unwrap_or_default())
        .unwrap_or_default();
    format!("{url}{trailing}")
}

/// Escapes a URL for embedding as a single path segment.
#[must_use]
pub fn query_escape(url: &str) -> String {
    utf8_percent_encode(url, QUERY_ESCAPE).to_string()
}
