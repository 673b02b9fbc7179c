//! Rich text payloads and the codec seam
//!
//! Formatting normalization lives outside this crate. The codec trait is the
//! seam; `BasicCodec` covers what the daemon needs on its own, which is
//! deriving a plain-text form from whatever representation is available.

use crate::clipboard::{Pasteboard, HTML_TYPE, PLAIN_TEXT_TYPE, RTF_TYPE};

/// Captured selection handed to the consumer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RichTextPayload {
    /// Always populated
    pub plain: String,
    pub html: Option<String>,
    pub rtf: Option<Vec<u8>>,
}

impl RichTextPayload {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            plain: text.into(),
            html: None,
            rtf: None,
        }
    }

    /// A payload with only whitespace is not a selection
    pub fn is_blank(&self) -> bool {
        self.plain.trim().is_empty()
    }

    pub fn is_rich(&self) -> bool {
        self.html.is_some() || self.rtf.is_some()
    }
}

/// Formatted text as read from an accessibility attribute
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributedText {
    pub string: String,
    pub rtf: Option<Vec<u8>>,
    pub html: Option<String>,
}

/// Conversion between attributed text and payloads
pub trait RichTextCodec: Send + Sync {
    fn to_payload(&self, text: &AttributedText) -> RichTextPayload;

    fn to_attributed(&self, payload: &RichTextPayload) -> AttributedText;

    /// Plain text carried by an HTML fragment
    fn plain_from_html(&self, html: &str) -> Option<String>;

    /// Plain text carried by an RTF document
    fn plain_from_rtf(&self, rtf: &[u8]) -> Option<String>;
}

/// Codec that keeps representations as-is and strips markup for plain text
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicCodec;

impl RichTextCodec for BasicCodec {
    fn to_payload(&self, text: &AttributedText) -> RichTextPayload {
        let plain = if text.string.is_empty() {
            text.html
                .as_deref()
                .and_then(|h| self.plain_from_html(h))
                .or_else(|| text.rtf.as_deref().and_then(|r| self.plain_from_rtf(r)))
                .unwrap_or_default()
        } else {
            text.string.clone()
        };
        RichTextPayload {
            plain,
            html: text.html.clone(),
            rtf: text.rtf.clone(),
        }
    }

    fn to_attributed(&self, payload: &RichTextPayload) -> AttributedText {
        AttributedText {
            string: payload.plain.clone(),
            rtf: payload.rtf.clone(),
            html: payload.html.clone(),
        }
    }

    fn plain_from_html(&self, html: &str) -> Option<String> {
        let mut out = String::with_capacity(html.len());
        let mut in_tag = false;
        for ch in html.chars() {
            match ch {
                '<' => in_tag = true,
                '>' if in_tag => in_tag = false,
                _ if !in_tag => out.push(ch),
                _ => {}
            }
        }
        let text = decode_entities(&out);
        (!text.trim().is_empty()).then_some(text)
    }

    fn plain_from_rtf(&self, rtf: &[u8]) -> Option<String> {
        let text = rtf_text(std::str::from_utf8(rtf).ok()?);
        (!text.trim().is_empty()).then_some(text)
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Header groups whose content is not document text
const RTF_SKIP_GROUPS: &[&str] = &["fonttbl", "colortbl", "stylesheet", "info", "*"];

/// Extract the visible text of an RTF document
fn rtf_text(rtf: &str) -> String {
    let mut out = String::new();
    // Depth at which a skipped group started, if any
    let mut skip_from: Option<usize> = None;
    let mut depth = 0usize;
    let mut chars = rtf.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '{' => depth += 1,
            '}' => {
                if skip_from == Some(depth) {
                    skip_from = None;
                }
                depth = depth.saturating_sub(1);
            }
            '\\' => {
                let mut word = String::new();
                match chars.peek().copied() {
                    Some(c @ ('\\' | '{' | '}')) => {
                        chars.next();
                        if skip_from.is_none() {
                            out.push(c);
                        }
                        continue;
                    }
                    Some('\'') => {
                        chars.next();
                        let hex: String = chars.by_ref().take(2).collect();
                        if skip_from.is_none() {
                            if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                                out.push(char::from(byte));
                            }
                        }
                        continue;
                    }
                    Some('*') => {
                        chars.next();
                        word.push('*');
                    }
                    _ => {
                        while let Some(&c) = chars.peek() {
                            if c.is_ascii_alphabetic() {
                                word.push(c);
                                chars.next();
                            } else {
                                break;
                            }
                        }
                        // Numeric parameter and one delimiting space
                        while matches!(chars.peek(), Some(c) if c.is_ascii_digit() || *c == '-') {
                            chars.next();
                        }
                        if chars.peek() == Some(&' ') {
                            chars.next();
                        }
                    }
                }

                if skip_from.is_none() && RTF_SKIP_GROUPS.contains(&word.as_str()) {
                    skip_from = Some(depth);
                } else if skip_from.is_none() && (word == "par" || word == "line") {
                    out.push('\n');
                } else if skip_from.is_none() && word == "tab" {
                    out.push('\t');
                }
            }
            '\r' | '\n' => {}
            _ if skip_from.is_none() && depth > 0 => out.push(ch),
            _ => {}
        }
    }

    out.trim_end_matches('\n').to_string()
}

/// Build a payload from the first pasteboard item.
///
/// Returns `None` when the pasteboard holds no text in any representation.
pub fn payload_from_pasteboard<P: Pasteboard + ?Sized>(
    pasteboard: &P,
    codec: &dyn RichTextCodec,
) -> Option<RichTextPayload> {
    if pasteboard.item_count() == 0 {
        return None;
    }

    let read_text = |type_tag: &str| {
        pasteboard
            .string(0, type_tag)
            .or_else(|| pasteboard.data(0, type_tag).and_then(|b| String::from_utf8(b).ok()))
    };

    let html = read_text(HTML_TYPE);
    let rtf = pasteboard.data(0, RTF_TYPE);
    let plain = read_text(PLAIN_TEXT_TYPE)
        .filter(|p| !p.is_empty())
        .or_else(|| html.as_deref().and_then(|h| codec.plain_from_html(h)))
        .or_else(|| rtf.as_deref().and_then(|r| codec.plain_from_rtf(r)))?;

    let payload = RichTextPayload { plain, html, rtf };
    (!payload.is_blank()).then_some(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::{MemoryPasteboard, PasteboardItem, PasteboardValue};

    const RTF: &str = r"{\rtf1\ansi{\fonttbl\f0\fswiss Helvetica;}{\colortbl;\red255\green0\blue0;}\f0\b Hello\b0  world\par second}";

    #[test]
    fn test_plain_payload() {
        let payload = RichTextPayload::plain("bar");
        assert_eq!(payload.plain, "bar");
        assert!(!payload.is_rich());
        assert!(!payload.is_blank());
        assert!(RichTextPayload::plain("  \n").is_blank());
    }

    #[test]
    fn test_html_to_plain() {
        let text = BasicCodec
            .plain_from_html("<p>Tom &amp; <b>Jerry</b></p>")
            .unwrap();
        assert_eq!(text, "Tom & Jerry");
        assert_eq!(BasicCodec.plain_from_html("<br/>"), None);
    }

    #[test]
    fn test_rtf_to_plain() {
        let text = BasicCodec.plain_from_rtf(RTF.as_bytes()).unwrap();
        assert_eq!(text, "Hello world\nsecond");
    }

    #[test]
    fn test_rtf_escaped_braces() {
        let text = BasicCodec
            .plain_from_rtf(br"{\rtf1 a\{b\}c}")
            .unwrap();
        assert_eq!(text, "a{b}c");
    }

    #[test]
    fn test_attributed_round_trip_keeps_representations() {
        let attributed = AttributedText {
            string: "Hello".into(),
            rtf: Some(RTF.as_bytes().to_vec()),
            html: None,
        };
        let payload = BasicCodec.to_payload(&attributed);
        assert_eq!(payload.plain, "Hello");
        assert_eq!(BasicCodec.to_attributed(&payload), attributed);
    }

    #[test]
    fn test_to_payload_derives_plain_from_rtf() {
        let attributed = AttributedText {
            string: String::new(),
            rtf: Some(RTF.as_bytes().to_vec()),
            html: None,
        };
        assert_eq!(BasicCodec.to_payload(&attributed).plain, "Hello world\nsecond");
    }

    #[test]
    fn test_payload_from_plain_pasteboard() {
        let mut pasteboard = MemoryPasteboard::new();
        pasteboard.set_text("bar").unwrap();
        let payload = payload_from_pasteboard(&pasteboard, &BasicCodec).unwrap();
        assert_eq!(payload, RichTextPayload::plain("bar"));
    }

    #[test]
    fn test_payload_from_html_only_pasteboard() {
        let pasteboard = MemoryPasteboard::with_items(vec![PasteboardItem::new().with(
            HTML_TYPE,
            PasteboardValue::Data(b"<i>bar</i>".to_vec()),
        )]);
        let payload = payload_from_pasteboard(&pasteboard, &BasicCodec).unwrap();
        assert_eq!(payload.plain, "bar");
        assert_eq!(payload.html.as_deref(), Some("<i>bar</i>"));
        assert_eq!(payload.rtf, None);
    }

    #[test]
    fn test_payload_from_empty_pasteboard() {
        assert_eq!(payload_from_pasteboard(&MemoryPasteboard::new(), &BasicCodec), None);

        let image_only = MemoryPasteboard::with_items(vec![PasteboardItem::new()
            .with("public.png", PasteboardValue::Data(vec![1, 2, 3]))]);
        assert_eq!(payload_from_pasteboard(&image_only, &BasicCodec), None);
    }
}
