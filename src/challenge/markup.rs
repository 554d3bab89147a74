//! Streaming markup tokenizer
//!
//! Turns loosely structured HTML into a flat stream of open-tag, close-tag and
//! text events without building a tree. The tokenizer never fails: anything it
//! cannot make sense of is either passed through as text or skipped.

/// One event of the markup stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupEvent {
    StartTag {
        name: String,
        attributes: Vec<(String, String)>,
        self_closing: bool,
    },
    EndTag {
        name: String,
    },
    Text(String),
}

impl MarkupEvent {
    /// Value of the named attribute on a start tag
    pub fn attribute(&self, key: &str) -> Option<&str> {
        match self {
            MarkupEvent::StartTag { attributes, .. } => attributes
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    /// Whether a start tag lists `class_name` in its class attribute
    pub fn has_class(&self, class_name: &str) -> bool {
        self.attribute("class")
            .map(|classes| classes.split_ascii_whitespace().any(|c| c == class_name))
            .unwrap_or(false)
    }
}

/// Elements that never have content or a closing tag
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Elements whose content is raw text rather than markup
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

pub fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

/// Iterator over the events of a markup document
pub struct MarkupTokenizer<'a> {
    input: &'a str,
    pos: usize,
    raw_text_end: Option<String>,
}

impl<'a> MarkupTokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            raw_text_end: None,
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    /// Skip the body of a script/style element, up to its closing tag
    fn skip_raw_text(&mut self, closing: &str) {
        let rest = self.rest();
        let lowered = rest.to_ascii_lowercase();
        match lowered.find(closing) {
            Some(offset) => self.pos += offset,
            None => self.pos = self.input.len(),
        }
    }

    /// Text from the current position up to the next tag opener
    fn read_text(&mut self) -> Option<MarkupEvent> {
        let rest = self.rest();
        let mut end = 0;
        let bytes = rest.as_bytes();
        // A '<' only starts markup when followed by a tag name, '/', '!' or '?'
        while end < bytes.len() {
            if bytes[end] == b'<' {
                match bytes.get(end + 1) {
                    Some(next) if next.is_ascii_alphabetic() || matches!(next, b'/' | b'!' | b'?') => {
                        break
                    }
                    _ => {}
                }
            }
            end += 1;
        }
        if end == 0 {
            return None;
        }
        self.pos += end;
        Some(MarkupEvent::Text(decode_entities(&rest[..end])))
    }

    fn skip_past(&mut self, terminator: &str) {
        match self.rest().find(terminator) {
            Some(offset) => self.pos += offset + terminator.len(),
            None => self.pos = self.input.len(),
        }
    }

    fn read_end_tag(&mut self) -> Option<MarkupEvent> {
        // Positioned on "</"
        let rest = &self.rest()[2..];
        let name_len = rest
            .find(|c: char| c.is_ascii_whitespace() || c == '>' || c == '/')
            .unwrap_or(rest.len());
        let name = rest[..name_len].to_ascii_lowercase();
        let Some(close) = rest.find('>') else {
            self.pos = self.input.len();
            return None;
        };
        self.pos += 2 + close + 1;
        if name.is_empty() {
            return self.next();
        }
        Some(MarkupEvent::EndTag { name })
    }

    fn read_start_tag(&mut self) -> Option<MarkupEvent> {
        let start = self.pos;
        let bytes = self.input.as_bytes();
        let mut i = start + 1;

        while i < bytes.len() && !bytes[i].is_ascii_whitespace() && !matches!(bytes[i], b'>' | b'/')
        {
            i += 1;
        }
        let name = self.input[start + 1..i].to_ascii_lowercase();
        let mut attributes = Vec::new();
        let mut self_closing = false;

        loop {
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            match bytes.get(i) {
                // Unterminated tag: the document ends here
                None => {
                    self.pos = self.input.len();
                    return None;
                }
                Some(b'>') => {
                    i += 1;
                    break;
                }
                Some(b'/') => {
                    if bytes.get(i + 1) == Some(&b'>') {
                        self_closing = true;
                        i += 2;
                        break;
                    }
                    i += 1;
                }
                Some(_) => {
                    let key_start = i;
                    while i < bytes.len()
                        && !bytes[i].is_ascii_whitespace()
                        && !matches!(bytes[i], b'=' | b'>' | b'/')
                    {
                        i += 1;
                    }
                    let key = self.input[key_start..i].to_ascii_lowercase();
                    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                        i += 1;
                    }
                    let mut value = String::new();
                    if bytes.get(i) == Some(&b'=') {
                        i += 1;
                        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                            i += 1;
                        }
                        match bytes.get(i) {
                            Some(&quote) if quote == b'"' || quote == b'\'' => {
                                let value_start = i + 1;
                                let value_end = self.input[value_start..]
                                    .find(quote as char)
                                    .map(|offset| value_start + offset);
                                match value_end {
                                    Some(end) => {
                                        value = decode_entities(&self.input[value_start..end]);
                                        i = end + 1;
                                    }
                                    None => {
                                        self.pos = self.input.len();
                                        return None;
                                    }
                                }
                            }
                            _ => {
                                let value_start = i;
                                while i < bytes.len()
                                    && !bytes[i].is_ascii_whitespace()
                                    && bytes[i] != b'>'
                                {
                                    i += 1;
                                }
                                value = decode_entities(&self.input[value_start..i]);
                            }
                        }
                    }
                    if !key.is_empty() {
                        attributes.push((key, value));
                    }
                }
            }
        }

        self.pos = i;
        if !self_closing && RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
            self.raw_text_end = Some(format!("</{}", name));
        }
        Some(MarkupEvent::StartTag {
            name,
            attributes,
            self_closing,
        })
    }
}

impl Iterator for MarkupTokenizer<'_> {
    type Item = MarkupEvent;

    fn next(&mut self) -> Option<MarkupEvent> {
        if let Some(closing) = self.raw_text_end.take() {
            self.skip_raw_text(&closing);
        }

        loop {
            if self.pos >= self.input.len() {
                return None;
            }
            let rest = self.rest();
            if !rest.starts_with('<') {
                return self.read_text();
            }
            if rest.starts_with("<!--") {
                self.skip_past("-->");
                continue;
            }
            if rest.starts_with("<!") || rest.starts_with("<?") {
                self.skip_past(">");
                continue;
            }
            if rest.starts_with("</") {
                return self.read_end_tag();
            }
            match rest.as_bytes().get(1) {
                Some(next) if next.is_ascii_alphabetic() => return self.read_start_tag(),
                _ => return self.read_text(),
            }
        }
    }
}

/// Decode character references; unknown references are kept verbatim
pub fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    let mut decoded = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        decoded.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let reference = rest[1..]
            .find(';')
            .filter(|&end| end <= 10)
            .and_then(|end| resolve_reference(&rest[1..1 + end]).map(|c| (c, end + 2)));
        match reference {
            Some((c, consumed)) => {
                decoded.push(c);
                rest = &rest[consumed..];
            }
            None => {
                decoded.push('&');
                rest = &rest[1..];
            }
        }
    }
    decoded.push_str(rest);
    decoded
}

fn resolve_reference(name: &str) -> Option<char> {
    if let Some(number) = name.strip_prefix('#') {
        let hex = number
            .strip_prefix('x')
            .or_else(|| number.strip_prefix('X'));
        let code = match hex {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => number.parse().ok()?,
        };
        return char::from_u32(code);
    }
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(input: &str) -> Vec<MarkupEvent> {
        MarkupTokenizer::new(input).collect()
    }

    fn start(name: &str, attributes: &[(&str, &str)]) -> MarkupEvent {
        MarkupEvent::StartTag {
            name: name.to_string(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            self_closing: false,
        }
    }

    fn end(name: &str) -> MarkupEvent {
        MarkupEvent::EndTag {
            name: name.to_string(),
        }
    }

    fn text(value: &str) -> MarkupEvent {
        MarkupEvent::Text(value.to_string())
    }

    #[test]
    fn test_tags_and_text() {
        assert_eq!(
            events(r#"<DIV class="handrecords">Hi <b>there</b></div>"#),
            vec![
                start("div", &[("class", "handrecords")]),
                text("Hi "),
                start("b", &[]),
                text("there"),
                end("b"),
                end("div"),
            ]
        );
    }

    #[test]
    fn test_attribute_forms() {
        let parsed = events(r#"<a href='x.php?a=1&amp;b=2' target=_blank disabled>"#);
        assert_eq!(
            parsed,
            vec![start(
                "a",
                &[("href", "x.php?a=1&b=2"), ("target", "_blank"), ("disabled", "")]
            )]
        );
    }

    #[test]
    fn test_quoted_attribute_may_contain_angle_bracket() {
        let parsed = events(r#"<span title="a > b">x</span>"#);
        assert_eq!(parsed[0].attribute("title"), Some("a > b"));
        assert_eq!(parsed[1], text("x"));
    }

    #[test]
    fn test_self_closing_and_comments() {
        let parsed = events("<!DOCTYPE html><!-- <td> --><br/>a<?xml ?>");
        assert_eq!(
            parsed,
            vec![
                MarkupEvent::StartTag {
                    name: "br".to_string(),
                    attributes: vec![],
                    self_closing: true,
                },
                text("a"),
            ]
        );
    }

    #[test]
    fn test_script_content_is_skipped() {
        let parsed = events("<script>if (a < b) { x = '</td>'; }</script><p>ok</p>");
        assert_eq!(
            parsed,
            vec![
                start("script", &[]),
                end("script"),
                start("p", &[]),
                text("ok"),
                end("p"),
            ]
        );
    }

    #[test]
    fn test_stray_angle_bracket_is_text() {
        assert_eq!(events("3 < 4"), vec![text("3 < 4")]);
    }

    #[test]
    fn test_unterminated_tag_ends_stream() {
        assert_eq!(events("ok<td class=\"odd"), vec![text("ok")]);
        assert_eq!(events("ok<td"), vec![text("ok")]);
    }

    #[test]
    fn test_entity_decoding() {
        assert_eq!(decode_entities("a&amp;b"), "a&b");
        assert_eq!(decode_entities("&#55;&#x41;&nbsp;"), "7A\u{a0}");
        assert_eq!(decode_entities("R&D &bogus; & done"), "R&D &bogus; & done");
    }

    #[test]
    fn test_class_membership() {
        let tag = start("tr", &[("class", "row odd highlighted")]);
        assert!(tag.has_class("odd"));
        assert!(!tag.has_class("even"));
        assert!(!text("odd").has_class("odd"));
    }
}
