use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// The site's stock allow-list for post markup. `form` is in here but never offered for republication.
pub const SITE_ALLOWED_POST_TAGS: &[&str] = &[
    "a", "abbr", "acronym", "address", "area", "article", "aside", "audio", "b", "bdo", "big",
    "blockquote", "br", "button", "caption", "cite", "code", "col", "colgroup", "dd", "del",
    "details", "dfn", "div", "dl", "dt", "em", "fieldset", "figcaption", "figure", "font",
    "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hgroup", "hr", "i", "img",
    "ins", "kbd", "label", "legend", "li", "main", "map", "mark", "menu", "nav", "object", "ol",
    "p", "pre", "q", "rb", "rp", "rt", "rtc", "ruby", "s", "samp", "section", "small", "span",
    "strike", "strong", "sub", "summary", "sup", "table", "tbody", "td", "textarea", "tfoot",
    "th", "thead", "title", "tr", "track", "tt", "u", "ul", "var", "video",
];

/// Tags that paragraph wrapping treats as blocks.
const BLOCK_TAGS: &str = "table|thead|tfoot|caption|col|colgroup|tbody|tr|td|th|div|dl|dd|dt|ul|ol|li|pre|form|map|area|blockquote|address|math|style|p|h[1-6]|hr|fieldset|legend|section|article|aside|hgroup|header|footer|nav|figure|figcaption|details|menu|summary";

fn comment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<!--.*?-->").expect("valid comment pattern"))
}

fn block_open_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!(r"(?i)(<(?:{})\b[^>]*>)", BLOCK_TAGS)).expect("valid block pattern"))
}

fn block_close_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!(r"(?i)(</(?:{})>)", BLOCK_TAGS)).expect("valid block pattern"))
}

fn any_block_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!(r"(?i)</?(?:{})\b", BLOCK_TAGS)).expect("valid block pattern"))
}

fn blank_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n[ \t]*\n").expect("valid blank line pattern"))
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid tag pattern"))
}

fn break_after_block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!(r"(?i)(</?(?:{})\b[^>]*>)\s*<br>", BLOCK_TAGS)).expect("valid block pattern"))
}

fn break_before_block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!(r"(?i)<br>(\s*</?(?:{})\b[^>]*>)", BLOCK_TAGS)).expect("valid block pattern"))
}

fn pre_block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<pre\b[^>]*>.*?</pre>").expect("valid pre pattern"))
}

fn presentation_attribute_regexes() -> &'static [Regex; 3] {
    static RES: OnceLock<[Regex; 3]> = OnceLock::new();
    RES.get_or_init(|| {
        [
            Regex::new(r#" class=".*?""#).expect("valid class pattern"),
            Regex::new(r#" srcset=".*?""#).expect("valid srcset pattern"),
            Regex::new(r#" sizes=".*?""#).expect("valid sizes pattern"),
        ]
    })
}

/// The default republication whitelist: the site allow-list without `form`.
pub fn default_allowed_tags() -> Vec<String> {
    SITE_ALLOWED_POST_TAGS
        .iter()
        .filter(|tag| **tag != "form")
        .map(|tag| tag.to_string())
        .collect()
}

/// Removes registered shortcodes, including any content they enclose.
/// Bracketed text that is not a registered shortcode is left alone.
pub fn strip_shortcodes(content: &str, shortcode_tags: &[String]) -> String {
    let mut output = content.to_string();
    for tag in shortcode_tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        let name = regex::escape(tag);
        let pattern = format!(r"(?s)\[{name}(?:\s[^\]]*)?/?\](?:.*?\[/{name}\])?");
        match Regex::new(&pattern) {
            Ok(re) => output = re.replace_all(&output, "").into_owned(),
            Err(e) => log::warn!("Skipping shortcode '{}': {}", tag, e),
        }
    }
    output
}

pub fn strip_comments(content: &str) -> String {
    comment_regex().replace_all(content, "").into_owned()
}

/// Filters markup against a tag whitelist. Disallowed tags are dropped and their text kept,
/// except `script`/`style`, whose content goes with them unless they are whitelisted.
pub fn kses(content: &str, allowed_tags: &[String]) -> String {
    let tags: HashSet<&str> = allowed_tags.iter().map(String::as_str).collect();
    let clean_content_tags: HashSet<&str> = ["script", "style"]
        .into_iter()
        .filter(|tag| !tags.contains(tag))
        .collect();

    ammonia::Builder::default()
        .tags(tags)
        .clean_content_tags(clean_content_tags)
        .add_generic_attributes(&["class", "id", "dir"])
        .add_tag_attributes("img", &["srcset", "sizes", "loading", "decoding"])
        .link_rel(None)
        .strip_comments(true)
        .clean(content)
        .to_string()
}

/// Sanitizes the site's license statement for display as rich text.
pub fn clean_license_statement(html: &str) -> String {
    ammonia::clean(html)
}

/// Turns newlines in text into `<br>` line breaks. Newlines inside tags are left alone.
fn newlines_to_breaks(chunk: &str) -> String {
    let mut output = String::with_capacity(chunk.len());
    let mut last = 0;
    for tag in tag_regex().find_iter(chunk) {
        output.push_str(&chunk[last..tag.start()].replace('\n', "<br>\n"));
        output.push_str(tag.as_str());
        last = tag.end();
    }
    output.push_str(&chunk[last..].replace('\n', "<br>\n"));
    output
}

/// Wraps loose text in paragraphs. Blank lines separate paragraphs and single newlines become
/// `<br>`, except next to block-level tags. Block markup itself is never wrapped.
pub fn autop(content: &str) -> String {
    if content.trim().is_empty() {
        return String::new();
    }

    let normalized = content.replace("\r\n", "\n").replace('\r', "\n");

    // Keep preformatted blocks out of the paragraph logic entirely.
    let mut pre_blocks: Vec<String> = Vec::new();
    let with_placeholders = pre_block_regex().replace_all(&normalized, |caps: &regex::Captures| {
        pre_blocks.push(caps[0].to_string());
        format!("\n\n__AUTOP_PRE_PLACEHOLDER_{}__\n\n", pre_blocks.len() - 1)
    });

    let spaced = block_open_regex().replace_all(&with_placeholders, "\n\n$1");
    let spaced = block_close_regex().replace_all(&spaced, "$1\n\n");

    let mut output = String::new();
    for chunk in blank_line_regex().split(&spaced) {
        let chunk = chunk.trim();
        if chunk.is_empty() {
            continue;
        }
        if chunk.starts_with("__AUTOP_PRE_PLACEHOLDER_") {
            output.push_str(chunk);
        } else if any_block_tag_regex().is_match(chunk) {
            let broken = newlines_to_breaks(chunk);
            let broken = break_after_block_regex().replace_all(&broken, "$1");
            output.push_str(&break_before_block_regex().replace_all(&broken, "$1"));
        } else {
            output.push_str("<p>");
            output.push_str(&newlines_to_breaks(chunk));
            output.push_str("</p>");
        }
        output.push('\n');
    }

    for (i, block) in pre_blocks.iter().enumerate() {
        let placeholder = format!("__AUTOP_PRE_PLACEHOLDER_{}__", i);
        output = output.replacen(&placeholder, block, 1);
    }

    output
}

pub fn remove_empty_paragraphs(content: &str) -> String {
    content.replace("<p></p>", "")
}

/// Drops `class`, `srcset` and `sizes` attributes so the snippet carries no site styling.
pub fn strip_presentation_attributes(markup: &str) -> String {
    presentation_attribute_regexes()
        .iter()
        .fold(markup.to_string(), |acc, re| re.replace_all(&acc, "").into_owned())
}
