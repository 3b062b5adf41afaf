//! Reading time estimation for chapter HTML

/// Elements whose text is never shown to readers
const SKIPPED_ELEMENTS: [&str; 2] = ["script", "style"];

const ENTITIES: [(&str, &str); 5] = [
    ("&nbsp;", " "),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
];

fn tag_name(tag: &str) -> String {
    tag.trim_start_matches('/')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

fn decode_entities(text: &str) -> String {
    let mut decoded = text.to_string();
    for (entity, replacement) in ENTITIES {
        decoded = decoded.replace(entity, replacement);
    }
    // Last, so "&amp;lt;" stays a literal "&lt;"
    decoded.replace("&amp;", "&")
}

/// Visible text of an HTML fragment.
///
/// Tags become whitespace so adjacent block elements do not glue words
/// together. An unterminated tag swallows the rest of the input.
pub fn plain_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        out.push(' ');

        let after = &rest[start + 1..];
        let Some(end) = after.find('>') else {
            rest = "";
            break;
        };
        let tag = &after[..end];
        rest = &after[end + 1..];

        let name = tag_name(tag);
        if !tag.starts_with('/') && SKIPPED_ELEMENTS.contains(&name.as_str()) {
            // ASCII lowercasing keeps byte offsets intact
            let closing = format!("</{name}");
            rest = match rest.to_ascii_lowercase().find(&closing) {
                Some(pos) => &rest[pos..],
                None => "",
            };
        }
    }
    out.push_str(rest);

    decode_entities(&out)
}

/// Number of whitespace-separated words a reader sees
pub fn word_count(html: &str) -> usize {
    plain_text(html).split_whitespace().count()
}

/// Minutes needed at `wpm` words per minute; at least one for any text
pub fn reading_minutes(words: usize, wpm: u32) -> u32 {
    if words == 0 {
        return 0;
    }
    let wpm = wpm.max(1) as usize;
    words.div_ceil(wpm).max(1) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_words_across_tags() {
        assert_eq!(word_count("<p>One two</p><p>three</p>"), 3);
        assert_eq!(word_count("<p>glued</p><p>words</p>"), 2);
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("<br/><hr>"), 0);
    }

    #[test]
    fn test_skips_script_and_style() {
        let html = "<p>Hello</p><script>var a = 1;</script><STYLE>p { color: red }</STYLE><p>world</p>";
        assert_eq!(word_count(html), 2);
    }

    #[test]
    fn test_decodes_entities() {
        assert_eq!(plain_text("a&nbsp;b").split_whitespace().count(), 2);
        assert_eq!(plain_text("Tom &amp; Jerry").trim(), "Tom & Jerry");
        assert_eq!(plain_text("&amp;lt;").trim(), "&lt;");
        assert_eq!(plain_text("it&#39;s &quot;ok&quot;").trim(), "it's \"ok\"");
    }

    #[test]
    fn test_unterminated_tag_drops_remainder() {
        assert_eq!(word_count("one two <p class=\"x\" three"), 2);
    }

    #[test]
    fn test_reading_minutes() {
        assert_eq!(reading_minutes(0, 250), 0);
        assert_eq!(reading_minutes(1, 250), 1);
        assert_eq!(reading_minutes(250, 250), 1);
        assert_eq!(reading_minutes(251, 250), 2);
        assert_eq!(reading_minutes(1000, 200), 5);
        assert_eq!(reading_minutes(10, 0), 10);
    }
}
