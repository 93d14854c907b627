//! Markup sanitizing for chunk content and substituted values

use std::fmt;

use regex::{Captures, Regex};
use tracing::debug;

/// Strips unsafe markup from text while keeping formatting intact
///
/// Implementations must be idempotent: sanitizing twice gives the same
/// result as sanitizing once.
pub trait Sanitizer: Send + Sync + fmt::Debug {
    fn sanitize(&self, text: &str) -> String;
}

/// Elements removed together with everything between their tags
const DROPPED_ELEMENTS: &[&str] = &["script", "style", "iframe", "object", "embed", "noscript", "template"];

/// Formatting tags kept in the output; any other tag is removed (its text stays)
const ALLOWED_TAGS: &[&str] = &[
    "a", "abbr", "b", "blockquote", "br", "cite", "code", "dd", "del", "dfn", "div", "dl", "dt", "em", "h1", "h2",
    "h3", "h4", "h5", "h6", "hr", "i", "img", "ins", "kbd", "li", "mark", "ol", "p", "pre", "q", "s", "samp", "small",
    "span", "strike", "strong", "sub", "sup", "table", "tbody", "td", "tfoot", "th", "thead", "tr", "u", "ul", "var",
];

/// Attributes kept on allowed tags
const ALLOWED_ATTRS: &[&str] = &[
    "abbr", "alt", "cite", "class", "colspan", "datetime", "height", "href", "lang", "name", "rowspan", "src",
    "title", "width",
];

/// Attributes holding a URL; their scheme is checked after entity decoding
const URL_ATTRS: &[&str] = &["cite", "href", "src"];

const ALLOWED_SCHEMES: &[&str] = &["http", "https", "mailto", "tel"];

/// Quote-aware tag body: a `>` inside a quoted value does not end the tag
const TAG_BODY: &str = r#"(?:"[^"]*"|'[^']*'|[^'">])*"#;

/// Upper bound on sanitizing passes; each pass only removes or canonicalizes markup
const MAX_PASSES: usize = 16;

/// Default HTML sanitizer
///
/// Allow-list based: formatting tags in `ALLOWED_TAGS` are rebuilt with only
/// the attributes in `ALLOWED_ATTRS`, URL attributes must use an allowed
/// scheme, executable elements are dropped with their bodies, and every
/// other tag (including unterminated ones) is removed.
pub struct HtmlSanitizer {
    elements: Vec<Regex>,
    comment: Regex,
    tag: Regex,
    attr: Regex,
    entity: Regex,
}

impl HtmlSanitizer {
    pub fn new() -> Self {
        let elements = DROPPED_ELEMENTS
            .iter()
            .map(|name| {
                Regex::new(&format!(r"(?is)<{name}\b{TAG_BODY}>.*?</{name}\s*>")).expect("static pattern")
            })
            .collect();

        Self {
            elements,
            comment: Regex::new(r"(?s)<!--.*?(?:-->|$)").expect("static pattern"),
            tag: Regex::new(&format!(r"<(/?)([A-Za-z][A-Za-z0-9:-]*)({TAG_BODY})(>?)")).expect("static pattern"),
            attr: Regex::new(r#"([^\s"'>/=]+)(?:\s*=\s*("[^"]*"|'[^']*'|[^\s"'>]+))?"#).expect("static pattern"),
            entity: Regex::new(r"&(?:#([0-9]+)|#[xX]([0-9a-fA-F]+)|([A-Za-z]+));?").expect("static pattern"),
        }
    }

    fn sanitize_once(&self, text: &str) -> String {
        let mut out = text.to_string();
        for element in &self.elements {
            out = element.replace_all(&out, "").into_owned();
        }
        out = self.comment.replace_all(&out, "").into_owned();
        self.tag
            .replace_all(&out, |caps: &Captures| self.rebuild_tag(caps))
            .into_owned()
    }

    fn rebuild_tag(&self, caps: &Captures) -> String {
        let closing = !caps[1].is_empty();
        let name = caps[2].to_ascii_lowercase();
        let terminated = !caps[4].is_empty();

        if !terminated || !ALLOWED_TAGS.contains(&name.as_str()) {
            return String::new();
        }
        if closing {
            return format!("</{}>", name);
        }

        let mut tag = format!("<{}", name);
        for attr in self.attr.captures_iter(&caps[3]) {
            let attr_name = attr[1].to_ascii_lowercase();
            let Some(raw_value) = attr.get(2) else {
                continue;
            };
            if !ALLOWED_ATTRS.contains(&attr_name.as_str()) {
                continue;
            }
            let value = self.decode_entities(unquote(raw_value.as_str()));
            if URL_ATTRS.contains(&attr_name.as_str()) && !is_safe_url(&value) {
                debug!(tag = %name, attr = %attr_name, "HtmlSanitizer: dropped unsafe url");
                continue;
            }
            tag.push_str(&format!(r#" {}="{}""#, attr_name, escape_attr(&value)));
        }
        tag.push('>');
        tag
    }

    /// Decode character references in a single pass
    fn decode_entities(&self, text: &str) -> String {
        self.entity
            .replace_all(text, |caps: &Captures| {
                let decoded = if let Some(dec) = caps.get(1) {
                    dec.as_str().parse::<u32>().ok().and_then(char::from_u32)
                } else if let Some(hex) = caps.get(2) {
                    u32::from_str_radix(hex.as_str(), 16).ok().and_then(char::from_u32)
                } else {
                    named_entity(&caps[3])
                };
                match decoded {
                    Some(c) => c.to_string(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value)
}

fn named_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "colon" => Some(':'),
        "Tab" => Some('\t'),
        "NewLine" => Some('\n'),
        "nbsp" => Some('\u{a0}'),
        _ => None,
    }
}

/// Relative URLs pass; absolute ones need an allowed scheme
///
/// Whitespace and control characters are ignored, as browsers do when
/// reading a scheme.
fn is_safe_url(value: &str) -> bool {
    let compact: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    let scheme_end = compact.find(|c| matches!(c, ':' | '/' | '?' | '#'));
    match scheme_end {
        Some(i) if compact[i..].starts_with(':') => ALLOWED_SCHEMES.contains(&&compact[..i]),
        _ => true,
    }
}

impl Default for HtmlSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HtmlSanitizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HtmlSanitizer")
            .field("allowed_tags", &ALLOWED_TAGS.len())
            .field("dropped_elements", &DROPPED_ELEMENTS)
            .finish()
    }
}

impl Sanitizer for HtmlSanitizer {
    fn sanitize(&self, text: &str) -> String {
        // Removing one construct can splice together another, so run to a fixed point
        let mut current = text.to_string();
        for _ in 0..MAX_PASSES {
            let next = self.sanitize_once(&current);
            if next == current {
                return next;
            }
            debug!(before = current.len(), after = next.len(), "HtmlSanitizer::sanitize: stripped markup");
            current = next;
        }
        current
    }
}

/// Escape text for use inside a double-quoted HTML attribute
pub fn escape_attr(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sanitize(text: &str) -> String {
        HtmlSanitizer::new().sanitize(text)
    }

    #[test]
    fn test_keeps_formatting() {
        let html = r#"<p>Hello <b>bold</b> and <a href="https://example.com">link</a></p>"#;
        assert_eq!(sanitize(html), html);
    }

    #[test]
    fn test_keeps_tokens() {
        assert_eq!(sanitize("Hi {{name}}!"), "Hi {{name}}!");
    }

    #[test]
    fn test_strips_script_elements() {
        assert_eq!(sanitize("a<script>alert(1)</script>b"), "ab");
        assert_eq!(sanitize("a<SCRIPT type=\"x\">\nalert(1)\n</SCRIPT >b"), "ab");
        assert_eq!(sanitize("a<style>p{}</style>b<iframe src=x></iframe>c"), "abc");
    }

    #[test]
    fn test_strips_unclosed_script_tag() {
        assert_eq!(sanitize("a<script src=evil.js>b"), "ab");
    }

    #[test]
    fn test_strips_event_handlers() {
        assert_eq!(sanitize(r#"<img src="x.png" onerror="alert(1)">"#), r#"<img src="x.png">"#);
        assert_eq!(sanitize("<div onclick='go()' class=\"c\">x</div>"), "<div class=\"c\">x</div>");
    }

    #[test]
    fn test_strips_javascript_urls() {
        assert_eq!(sanitize(r#"<a href="javascript:alert(1)">x</a>"#), "<a>x</a>");
        assert_eq!(sanitize("<a href=javascript:void(0)>x</a>"), "<a>x</a>");
    }

    #[test]
    fn test_nested_construction_is_removed() {
        let out = sanitize("<scr<script></script>ipt>alert(1)</script>");
        assert!(!out.to_lowercase().contains("<script"));
    }

    #[test]
    fn test_strips_slash_separated_handlers() {
        assert_eq!(sanitize("<svg/onload=alert(1)>"), "");
        assert_eq!(sanitize(r#"<img/src="x.png"/onerror=alert(1)>"#), r#"<img src="x.png">"#);
    }

    #[test]
    fn test_quoted_gt_does_not_end_tag() {
        assert_eq!(sanitize(r#"<a title=">" onclick="alert(1)">x</a>"#), r#"<a title="&gt;">x</a>"#);
    }

    #[test]
    fn test_strips_unterminated_tags() {
        assert_eq!(sanitize("<img src=x onerror=alert(1)"), "");
        assert_eq!(sanitize("ok <b"), "ok ");
    }

    #[test]
    fn test_strips_entity_encoded_schemes() {
        assert_eq!(sanitize(r#"<a href="&#106;avascript:alert(1)">x</a>"#), "<a>x</a>");
        assert_eq!(sanitize(r#"<a href="&#x6A;avascript&colon;alert(1)">x</a>"#), "<a>x</a>");
        assert_eq!(sanitize("<a href=\"java\tscript:alert(1)\">x</a>"), "<a>x</a>");
    }

    #[test]
    fn test_strips_unknown_tags_and_attributes() {
        assert_eq!(sanitize("<form action=/x><input value=1>go</form>"), "go");
        assert_eq!(sanitize(r#"<p style="color:red" data-x="1">t</p>"#), "<p>t</p>");
        assert_eq!(sanitize("a<!-- <script>x</script> -->b"), "ab");
    }

    #[test]
    fn test_keeps_relative_and_mail_urls() {
        assert_eq!(sanitize(r#"<a href="/about#team">a</a>"#), r#"<a href="/about#team">a</a>"#);
        assert_eq!(sanitize(r#"<a href="mailto:hi@example.com">m</a>"#), r#"<a href="mailto:hi@example.com">m</a>"#);
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "plain",
            "<p onclick=x>hi</p><script>1</script>",
            "<scr<script></script>ipt>alert(1)</scr<script></script>ipt>",
            r#"<a href="javascript:x" title="t">y</a>"#,
            "<svg/onload=alert(1)>",
            r#"<a title=">" onclick="alert(1)">x</a>"#,
            "<img src=x onerror=alert(1)",
            r#"<a href="&#106;avascript:alert(1)">x</a>"#,
            r#"<a title="&amp;lt; &bogus; 'q'">x</a>"#,
            "<B CLASS='x'>y</B>",
        ];
        for input in inputs {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once, "not idempotent for {input}");
        }
    }

    #[test]
    fn test_escape_attr() {
        assert_eq!(escape_attr(r#"a "b" <c> & 'd'"#), "a &quot;b&quot; &lt;c&gt; &amp; &#39;d&#39;");
        assert_eq!(escape_attr("plain"), "plain");
    }
}
