//! `{{token}}` interpolation for chunk content

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::debug;

use crate::sanitize::{HtmlSanitizer, Sanitizer, escape_attr};

/// Token name to value
pub type Variables = HashMap<String, String>;

/// Element wrapped around substituted values when not in raw mode
pub const MARKER_TAG: &str = "em-var";

static TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{([^{}]*?)\}\}").expect("static pattern"));

static DEFAULT_SANITIZER: LazyLock<HtmlSanitizer> = LazyLock::new(HtmlSanitizer::new);

/// Substitute `{{token}}` markers using the default sanitizer
pub fn interpolate(text: &str, fallbacks: &Variables, values: &Variables, raw: bool) -> String {
    interpolate_with(&*DEFAULT_SANITIZER, text, fallbacks, values, raw)
}

/// Substitute `{{token}}` markers in `text`
///
/// Each token resolves to the call-site value, then the payload fallback,
/// then the empty string. The text is sanitized once before scanning and
/// every substituted value is sanitized before insertion. Unless `raw`,
/// values are wrapped in an `<em-var>` element that records the token name
/// and value so editing tools can find the span again.
pub fn interpolate_with(
    sanitizer: &dyn Sanitizer,
    text: &str,
    fallbacks: &Variables,
    values: &Variables,
    raw: bool,
) -> String {
    let content = sanitizer.sanitize(text);
    let mut resolved: HashMap<String, String> = HashMap::new();

    // One pass, so substituted values are never scanned for further tokens
    let out = TOKEN.replace_all(&content, |caps: &Captures| {
        let token = &caps[1];
        resolved
            .entry(token.to_string())
            .or_insert_with(|| render_token(sanitizer, token, fallbacks, values, raw))
            .clone()
    });

    debug!(tokens = resolved.len(), raw, "interpolate_with: substituted tokens");
    out.into_owned()
}

fn render_token(
    sanitizer: &dyn Sanitizer,
    token: &str,
    fallbacks: &Variables,
    values: &Variables,
    raw: bool,
) -> String {
    let value = values
        .get(token)
        .or_else(|| fallbacks.get(token))
        .map(String::as_str)
        .unwrap_or("");
    let value = sanitizer.sanitize(value);

    if raw {
        return value;
    }

    format!(
        r#"<{tag} data-chunk-variable="{name}" data-chunk-variable-value="{attr}">{value}</{tag}>"#,
        tag = MARKER_TAG,
        name = escape_attr(token),
        attr = escape_attr(&value),
        value = value,
    )
}

/// Distinct token names in `text`, in order of first appearance
pub fn tokens(text: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for caps in TOKEN.captures_iter(text) {
        let token = caps[1].to_string();
        if !seen.contains(&token) {
            seen.push(token);
        }
    }
    seen
}
