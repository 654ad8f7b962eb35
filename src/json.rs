// Copyright 2018 Google Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License.  You may obtain a copy
// of the License at:
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.  See the
// License for the specific language governing permissions and limitations
// under the License.

//! Order-preserving extended-JSON rendering and parsing of BSON documents.
//!
//! Documents cross the filesystem boundary as relaxed extended JSON.  Field
//! order must survive both directions so that a read-modify-write cycle of a
//! file does not shuffle the stored document: `bson::Document` keeps insertion
//! order and `serde_json` is built with `preserve_order`.
//!
//! Rendering is configurable (indentation, ASCII escaping, byte encoding) to
//! match the mount options.  Path components, in contrast, always use the
//! fixed compact form produced by `dumps_value`.

use bson::{Bson, Document};
use encoding_rs::Encoding;
use failure::Error;
use serde_json;
use serde_json::Value;
use std::convert::TryFrom;

/// Serialization settings for documents rendered as files.
#[derive(Clone)]
pub struct JsonFormat {
    /// Spaces of indentation per nesting level; negative means compact
    /// single-line output.
    indent: i32,

    /// Escape all non-ASCII characters as `\uXXXX` sequences.
    ensure_ascii: bool,

    /// Byte encoding of the emitted text.  Decoding uses the same encoding
    /// and replaces invalid sequences instead of failing.
    encoding: &'static Encoding,
}

impl JsonFormat {
    pub fn new(indent: i32, ensure_ascii: bool, encoding: &'static Encoding) -> JsonFormat {
        JsonFormat { indent, ensure_ascii, encoding }
    }

    /// Renders a document to the byte form handed out by `read`.
    ///
    /// A document with no fields renders as an empty file.  Anything else is
    /// extended JSON followed by a trailing newline, in the configured
    /// encoding.
    pub fn render_document(&self, doc: &Document) -> Vec<u8> {
        if doc.is_empty() {
            return Vec::new();
        }
        let json = Bson::Document(doc.clone()).into_relaxed_extjson();
        let mut text = String::new();
        write_value(&mut text, &json, self.indent, self.ensure_ascii, 0);
        text.push('\n');
        let (bytes, _, _) = self.encoding.encode(&text);
        bytes.into_owned()
    }

    /// Parses the byte form written by the user back into a document.
    ///
    /// Bytes are decoded with the configured encoding, replacing invalid
    /// sequences.  A buffer that is empty after trimming whitespace parses as
    /// the empty document.
    pub fn parse_document(&self, bytes: &[u8]) -> Result<Document, Error> {
        let (text, _, _) = self.encoding.decode(bytes);
        if text.trim().is_empty() {
            return Ok(Document::new());
        }
        let json: Value = serde_json::from_str(&text)?;
        match Bson::try_from(json)? {
            Bson::Document(doc) => Ok(doc),
            _ => Err(format_err!("document root must be a JSON object")),
        }
    }
}

/// Encodes a single value in the fixed form used for path components and
/// facet file names: compact, non-ASCII characters kept verbatim.
pub fn dumps_value(value: &Bson) -> String {
    let json = value.clone().into_relaxed_extjson();
    let mut out = String::new();
    write_value(&mut out, &json, -1, false, 0);
    out
}

/// Decodes a path component into the typed value used for filter equality.
pub fn loads_value(text: &str) -> Result<Bson, Error> {
    let json: Value = serde_json::from_str(text)?;
    Ok(Bson::try_from(json)?)
}

fn pad(out: &mut String, indent: i32, level: usize) {
    for _ in 0..(indent as usize * level) {
        out.push(' ');
    }
}

fn write_value(out: &mut String, value: &Value, indent: i32, ensure_ascii: bool, level: usize) {
    match *value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(ref n) => out.push_str(&n.to_string()),
        Value::String(ref s) => write_string(out, s, ensure_ascii),
        Value::Array(ref items) => {
            if items.is_empty() {
                out.push_str("[]");
                return;
            }
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                    if indent < 0 {
                        out.push(' ');
                    }
                }
                if indent >= 0 {
                    out.push('\n');
                    pad(out, indent, level + 1);
                }
                write_value(out, item, indent, ensure_ascii, level + 1);
            }
            if indent >= 0 {
                out.push('\n');
                pad(out, indent, level);
            }
            out.push(']');
        },
        Value::Object(ref fields) => {
            if fields.is_empty() {
                out.push_str("{}");
                return;
            }
            out.push('{');
            for (i, (key, item)) in fields.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                    if indent < 0 {
                        out.push(' ');
                    }
                }
                if indent >= 0 {
                    out.push('\n');
                    pad(out, indent, level + 1);
                }
                write_string(out, key, ensure_ascii);
                out.push_str(": ");
                write_value(out, item, indent, ensure_ascii, level + 1);
            }
            if indent >= 0 {
                out.push('\n');
                pad(out, indent, level);
            }
            out.push('}');
        },
    }
}

fn write_string(out: &mut String, s: &str, ensure_ascii: bool) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            ch if (ch as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", ch as u32));
            },
            ch if ensure_ascii && (ch as u32) > 0x7f => {
                let cp = ch as u32;
                if cp > 0xffff {
                    // Outside the BMP: escape as a UTF-16 surrogate pair.
                    let v = cp - 0x10000;
                    out.push_str(&format!("\\u{:04x}\\u{:04x}",
                        0xd800 + (v >> 10), 0xdc00 + (v & 0x3ff)));
                } else {
                    out.push_str(&format!("\\u{:04x}", cp));
                }
            },
            ch => out.push(ch),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::UTF_8;

    fn format(indent: i32) -> JsonFormat {
        JsonFormat::new(indent, false, UTF_8)
    }

    #[test]
    fn render_empty_document_is_empty_file() {
        assert!(format(4).render_document(&Document::new()).is_empty());
    }

    #[test]
    fn render_compact() {
        let doc = doc! {"k": 1, "s": "x"};
        let bytes = format(-1).render_document(&doc);
        assert_eq!("{\"k\": 1, \"s\": \"x\"}\n", String::from_utf8(bytes).unwrap());
    }

    #[test]
    fn render_pretty_two_spaces() {
        let doc = doc! {"k": 1};
        let bytes = format(2).render_document(&doc);
        assert_eq!("{\n  \"k\": 1\n}\n", String::from_utf8(bytes).unwrap());
    }

    #[test]
    fn render_pretty_nested() {
        let doc = doc! {"a": {"b": [1, 2]}};
        let bytes = format(4).render_document(&doc);
        let expected = "{\n    \"a\": {\n        \"b\": [\n            1,\n            2\n        ]\n    }\n}\n";
        assert_eq!(expected, String::from_utf8(bytes).unwrap());
    }

    #[test]
    fn render_preserves_field_order() {
        let doc = doc! {"zeta": 1, "alpha": 2, "mid": 3};
        let text = String::from_utf8(format(-1).render_document(&doc)).unwrap();
        let zeta = text.find("zeta").unwrap();
        let alpha = text.find("alpha").unwrap();
        let mid = text.find("mid").unwrap();
        assert!(zeta < alpha && alpha < mid);
    }

    #[test]
    fn render_ensure_ascii() {
        let codec = JsonFormat::new(-1, true, UTF_8);
        let bytes = codec.render_document(&doc! {"s": "caf\u{e9}"});
        assert_eq!("{\"s\": \"caf\\u00e9\"}\n", String::from_utf8(bytes).unwrap());

        let bytes = codec.render_document(&doc! {"s": "\u{1f600}"});
        assert_eq!("{\"s\": \"\\ud83d\\ude00\"}\n", String::from_utf8(bytes).unwrap());
    }

    #[test]
    fn render_raw_unicode_without_escaping() {
        let bytes = format(-1).render_document(&doc! {"s": "caf\u{e9}"});
        assert_eq!("{\"s\": \"caf\u{e9}\"}\n", String::from_utf8(bytes).unwrap());
    }

    #[test]
    fn parse_round_trips_order() {
        let codec = format(4);
        let doc = doc! {"b": 2, "a": 1, "z": {"y": 1, "x": 2}};
        let parsed = codec.parse_document(&codec.render_document(&doc)).unwrap();
        assert_eq!(doc, parsed);
        let keys: Vec<&str> = parsed.keys().map(|k| k.as_str()).collect();
        assert_eq!(vec!["b", "a", "z"], keys);
    }

    #[test]
    fn parse_empty_buffer() {
        assert_eq!(Document::new(), format(4).parse_document(b"").unwrap());
        assert_eq!(Document::new(), format(4).parse_document(b" \n\t ").unwrap());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(format(4).parse_document(b"{not json").is_err());
    }

    #[test]
    fn parse_rejects_non_object_root() {
        assert!(format(4).parse_document(b"[1, 2]").is_err());
        assert!(format(4).parse_document(b"42").is_err());
    }

    #[test]
    fn parse_replaces_invalid_sequences() {
        // 0xff is not valid UTF-8; decoding must substitute, not fail.
        let doc = format(4).parse_document(b"{\"k\": \"a\xffb\"}").unwrap();
        match doc.get("k") {
            Some(&Bson::String(ref s)) => assert!(s.starts_with('a') && s.ends_with('b')),
            other => panic!("unexpected value: {:?}", other),
        }
    }

    #[test]
    fn dumps_value_forms() {
        assert_eq!("\"x\"", dumps_value(&Bson::String("x".to_owned())));
        assert_eq!("1", dumps_value(&Bson::Int32(1)));
        assert_eq!("true", dumps_value(&Bson::Boolean(true)));
        assert_eq!("null", dumps_value(&Bson::Null));
        assert_eq!("caf\u{e9}", dumps_value(&Bson::String("caf\u{e9}".to_owned())).trim_matches('"'));
    }

    #[test]
    fn loads_value_round_trip() {
        for text in &["\"x\"", "1", "2.5", "true", "null", "\"a/b\""] {
            let value = loads_value(text).unwrap();
            assert_eq!(*text, dumps_value(&value));
        }
    }

    #[test]
    fn loads_value_rejects_garbage() {
        assert!(loads_value("").is_err());
        assert!(loads_value("x").is_err());
        assert!(loads_value("\"unterminated").is_err());
    }

    #[test]
    fn loads_value_decoded_equality() {
        // Distinct spellings of the same value decode equal.
        assert_eq!(loads_value("\"A\"").unwrap(), loads_value("\"\\u0041\"").unwrap());
    }
}
