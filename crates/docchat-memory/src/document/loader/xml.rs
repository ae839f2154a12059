//! Minimal OOXML text scanner shared by the DOCX and PPTX loaders.

/// Collect the text of every paragraph element `para_tag`, concatenating the
/// runs found inside `text_tag` elements. Empty paragraphs are dropped.
pub(super) fn paragraphs(xml: &str, text_tag: &str, para_tag: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut rest = xml;

    while let Some(open) = rest.find('<') {
        if in_text {
            current.push_str(&rest[..open]);
        }
        let after = &rest[open + 1..];
        let Some(close) = after.find('>') else {
            break;
        };
        let tag = &after[..close];
        rest = &after[close + 1..];

        let closing = tag.starts_with('/');
        let self_closing = tag.ends_with('/');
        let name = tag
            .trim_start_matches('/')
            .split(|c: char| c.is_whitespace() || c == '/')
            .next()
            .unwrap_or("");

        if name == text_tag {
            in_text = !closing && !self_closing;
        } else if name == para_tag && closing {
            flush(&mut current, &mut out);
        } else if self_closing && name.ends_with(":tab") {
            current.push('\t');
        } else if self_closing && name.ends_with(":br") {
            current.push('\n');
        }
    }
    flush(&mut current, &mut out);
    out
}

fn flush(current: &mut String, out: &mut Vec<String>) {
    let text = unescape(current.trim());
    if !text.is_empty() {
        out.push(text);
    }
    current.clear();
}

/// Decode the five predefined XML entities.
pub(super) fn unescape(s: &str) -> String {
    if !s.contains('&') {
        return s.to_owned();
    }
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
