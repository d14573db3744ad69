//! Input normalisers and output escapers.
//!
//! Everything that enters the content store from the API passes through one
//! of the `sanitize_*` functions, and everything the CTA renderer writes into
//! HTML passes through one of the `esc_*` functions.

use std::collections::{HashMap, HashSet};

use ammonia::{Builder, UrlRelative};
use serde_json::Value;

/// Elements removed together with everything inside them.
const DROP_WITH_CONTENT: &[&str] = &["script", "style"];

/// URL schemes never allowed in links or attributes.
const BLOCKED_SCHEMES: &[&str] = &["javascript", "data", "vbscript"];

/// A tag found while scanning HTML.
struct Tag<'a> {
    /// Lowercased element name. Empty for comments and declarations.
    name: String,
    closing: bool,
    /// Text between the name and the closing `>`.
    rest: &'a str,
    /// Byte offset just past the closing `>`.
    end: usize,
}

/// Try to read a tag starting at `html[start] == '<'`.
fn read_tag(html: &str, start: usize) -> Option<Tag<'_>> {
    let bytes = html.as_bytes();
    let mut i = start + 1;
    let closing = bytes.get(i) == Some(&b'/');
    if closing {
        i += 1;
    }
    let first = *bytes.get(i)?;
    if !(first.is_ascii_alphabetic() || (!closing && matches!(first, b'!' | b'?'))) {
        return None;
    }

    if html[i..].starts_with("!--") {
        let end = html[i..].find("-->").map_or(html.len(), |p| i + p + 3);
        return Some(Tag {
            name: String::new(),
            closing: false,
            rest: &html[start..end],
            end,
        });
    }

    let name_start = i;
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'-') {
        i += 1;
    }
    let name = html[name_start..i].to_ascii_lowercase();

    // Find the closing '>' outside of quoted attribute values.
    let rest_start = i;
    let mut quote: Option<u8> = None;
    while i < bytes.len() {
        match (quote, bytes[i]) {
            (None, b'>') => break,
            (None, q @ (b'"' | b'\'')) => quote = Some(q),
            (Some(q), b) if b == q => quote = None,
            _ => {}
        }
        i += 1;
    }
    let rest = &html[rest_start..i];
    let end = (i + 1).min(html.len());
    Some(Tag {
        name,
        closing,
        rest,
        end,
    })
}

/// Byte offset just past `</name ...>` at or after `from`, or the end.
fn skip_past_closing(html: &str, from: usize, name: &str) -> usize {
    let lower = html.to_ascii_lowercase();
    let needle = format!("</{name}");
    let mut search = from;
    while let Some(pos) = lower[search..].find(&needle) {
        let at = search + pos;
        if let Some(tag) = read_tag(html, at) {
            if tag.closing && tag.name == name {
                return tag.end;
            }
        }
        search = at + needle.len();
    }
    html.len()
}

/// Remove all tags. `<script>` and `<style>` blocks go with their contents.
#[must_use]
pub fn strip_all_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    while let Some(pos) = input[i..].find('<') {
        let at = i + pos;
        out.push_str(&input[i..at]);
        match read_tag(input, at) {
            Some(tag) if !tag.closing && DROP_WITH_CONTENT.contains(&tag.name.as_str()) => {
                i = skip_past_closing(input, tag.end, &tag.name);
            }
            Some(tag) => i = tag.end,
            None => {
                out.push('<');
                i = at + 1;
            }
        }
    }
    out.push_str(&input[i..]);
    out.trim().to_owned()
}

/// Collapse every whitespace run (tabs and newlines included) to one space.
fn collapse_whitespace(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_space = false;
    for c in input.chars() {
        if c.is_whitespace() {
            pending_space = true;
        } else {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        }
    }
    out
}

/// Single-line text: tags stripped, whitespace collapsed, trimmed.
#[must_use]
pub fn sanitize_text_field(input: &str) -> String {
    collapse_whitespace(&strip_all_tags(input))
}

/// Multi-line text: tags stripped, line breaks kept, trimmed.
#[must_use]
pub fn sanitize_textarea_field(input: &str) -> String {
    let stripped = strip_all_tags(input);
    let lines: Vec<String> = stripped
        .replace("\r\n", "\n")
        .split('\n')
        .map(collapse_whitespace)
        .collect();
    lines.join("\n").trim().to_owned()
}

/// URL slug: lowercase ASCII alphanumerics separated by single dashes.
#[must_use]
pub fn sanitize_title(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in strip_all_tags(input).chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Internal identifier: lowercase `[a-z0-9_-]` only.
#[must_use]
pub fn sanitize_key(input: &str) -> String {
    input
        .chars()
        .map(|c| c.to_ascii_lowercase())
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-'))
        .collect()
}

/// Safe file name: no directories, whitespace as dashes, `[A-Za-z0-9._-]`.
#[must_use]
pub fn sanitize_file_name(input: &str) -> String {
    let base = input.rsplit(['/', '\\']).next().unwrap_or_default();
    let mut out = String::with_capacity(base.len());
    let mut in_space = false;
    for c in base.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push('-');
            }
            in_space = true;
            continue;
        }
        in_space = false;
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            out.push(c);
        }
    }
    out.trim_matches(['.', '-']).to_owned()
}

/// Elements allowed in post HTML.
const POST_TAGS: &[&str] = &[
    "a", "abbr", "acronym", "address", "area", "article", "aside", "audio", "b", "bdo", "big",
    "blockquote", "br", "caption", "cite", "code", "col", "colgroup", "dd", "del", "details",
    "dfn", "div", "dl", "dt", "em", "figcaption", "figure", "footer", "h1", "h2", "h3", "h4",
    "h5", "h6", "header", "hgroup", "hr", "i", "img", "ins", "kbd", "li", "main", "map", "mark",
    "nav", "ol", "p", "picture", "pre", "q", "rp", "rt", "ruby", "s", "samp", "section",
    "small", "source", "span", "strike", "strong", "sub", "summary", "sup", "table", "tbody",
    "td", "tfoot", "th", "thead", "time", "tr", "track", "tt", "u", "ul", "var", "video", "wbr",
];

/// Attributes allowed on every post element.
const POST_GENERIC_ATTRIBUTES: &[&str] = &["class", "dir", "id", "lang", "role", "title"];

/// Per-element attributes allowed in post HTML.
const POST_TAG_ATTRIBUTES: &[(&str, &[&str])] = &[
    ("a", &["href", "hreflang", "name", "rel", "rev", "target", "download", "referrerpolicy"]),
    ("area", &["alt", "coords", "href", "rel", "shape", "target"]),
    ("audio", &["autoplay", "controls", "loop", "muted", "preload", "src"]),
    ("blockquote", &["cite"]),
    ("col", &["align", "span", "valign", "width"]),
    ("colgroup", &["align", "span", "valign", "width"]),
    ("del", &["cite", "datetime"]),
    ("details", &["open"]),
    ("img", &["align", "alt", "border", "decoding", "height", "loading", "sizes", "src", "srcset", "width"]),
    ("ins", &["cite", "datetime"]),
    ("li", &["value"]),
    ("map", &["name"]),
    ("ol", &["reversed", "start", "type"]),
    ("q", &["cite"]),
    ("source", &["media", "sizes", "src", "srcset", "type"]),
    ("table", &["align", "border", "cellpadding", "cellspacing", "summary", "width"]),
    ("td", &["align", "colspan", "headers", "rowspan", "valign"]),
    ("th", &["align", "colspan", "headers", "rowspan", "scope", "valign"]),
    ("time", &["datetime"]),
    ("track", &["default", "kind", "label", "src", "srclang"]),
    ("video", &["autoplay", "controls", "height", "loop", "muted", "playsinline", "poster", "preload", "src", "width"]),
];

/// Link protocols allowed in post HTML. Relative URLs always pass.
const POST_URL_SCHEMES: &[&str] = &[
    "http", "https", "ftp", "ftps", "mailto", "news", "irc", "irc6", "ircs", "gopher", "nntp",
    "feed", "telnet", "mms", "rtsp", "sms", "svn", "tel", "fax", "xmpp", "webcal", "urn",
];

/// Filter post HTML down to the post allow-list.
///
/// The input is parsed as an HTML fragment, so entity-encoded schemes and
/// unquoted attribute values are seen the way a browser sees them. Elements
/// outside the allow-list lose their tags but keep their text, except
/// `script` and `style`, which go with their content. Event handlers and
/// links with a protocol outside the allow-list are removed. Comments are
/// kept.
#[must_use]
pub fn kses_post(input: &str) -> String {
    let tag_attributes: HashMap<&str, HashSet<&str>> = POST_TAG_ATTRIBUTES
        .iter()
        .map(|(tag, attrs)| (*tag, attrs.iter().copied().collect()))
        .collect();

    Builder::default()
        .tags(POST_TAGS.iter().copied().collect())
        .clean_content_tags(DROP_WITH_CONTENT.iter().copied().collect())
        .generic_attributes(POST_GENERIC_ATTRIBUTES.iter().copied().collect())
        .generic_attribute_prefixes(["aria-", "data-"].into_iter().collect())
        .tag_attributes(tag_attributes)
        .url_schemes(POST_URL_SCHEMES.iter().copied().collect())
        .url_relative(UrlRelative::PassThrough)
        .link_rel(None)
        .strip_comments(false)
        .clean(input)
        .to_string()
}

/// Leading integer of a string, the lenient way (`"12abc"` is 12).
fn leading_int(s: &str) -> i64 {
    crate::signing::parse_timestamp(s)
}

/// Integer value of a JSON scalar. Non-numeric values are 0.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn intval(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or_default(),
        Value::String(s) => leading_int(s),
        Value::Bool(b) => i64::from(*b),
        _ => 0,
    }
}

/// Absolute integer value of a JSON scalar. Non-numeric values are 0.
#[must_use]
pub fn absint(value: &Value) -> u64 {
    intval(value).unsigned_abs()
}

/// Escape text for an HTML text node.
#[must_use]
pub fn esc_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape text for a quoted HTML attribute value.
#[must_use]
pub fn esc_attr(input: &str) -> String {
    esc_html(input)
}

/// Clean a URL for output in an attribute.
///
/// Whitespace and control characters are removed. URLs with a blocked
/// scheme become empty.
#[must_use]
pub fn esc_url(input: &str) -> String {
    let url: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect();
    if url.is_empty() {
        return url;
    }

    if let Some(colon) = url.find(':') {
        let scheme = &url[..colon];
        let is_scheme = !scheme.is_empty()
            && !scheme.contains(['/', '?', '#'])
            && scheme.bytes().all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.'));
        if is_scheme
            && BLOCKED_SCHEMES
                .iter()
                .any(|blocked| scheme.eq_ignore_ascii_case(blocked))
        {
            return String::new();
        }
    }
    esc_attr(&url)
}
