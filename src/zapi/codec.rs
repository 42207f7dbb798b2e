//! XML encoding and decoding of element trees
//!
//! The controller speaks a small XML subset: elements, attributes, text
//! content and the standard entities. Leaf elements carry text, inner
//! elements carry children; whitespace between children is ignored.

use crate::error::{Error, Result};
use crate::zapi::element::Element;

// =============================================================================
// Encoding
// =============================================================================

/// Serialize an element tree without an XML declaration
pub fn to_xml(elem: &Element) -> String {
    let mut buf = String::new();
    write_element(&mut buf, elem);
    buf
}

fn write_element(buf: &mut String, elem: &Element) {
    buf.push('<');
    buf.push_str(elem.name());
    for (name, value) in elem.attrs() {
        buf.push(' ');
        buf.push_str(name);
        buf.push_str("=\"");
        escape_into(buf, value);
        buf.push('"');
    }

    if elem.children().is_empty() && elem.content().is_none() {
        buf.push_str("/>");
        return;
    }

    buf.push('>');
    if let Some(content) = elem.content() {
        escape_into(buf, content);
    }
    for child in elem.children() {
        write_element(buf, child);
    }
    buf.push_str("</");
    buf.push_str(elem.name());
    buf.push('>');
}

fn escape_into(buf: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '&' => buf.push_str("&amp;"),
            '<' => buf.push_str("&lt;"),
            '>' => buf.push_str("&gt;"),
            '"' => buf.push_str("&quot;"),
            '\'' => buf.push_str("&apos;"),
            _ => buf.push(c),
        }
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Parse a document into its root element
///
/// The XML declaration, doctype and comments are skipped.
pub fn from_xml(input: &str) -> Result<Element> {
    let mut parser = Parser { input, pos: 0 };
    parser.skip_misc()?;
    let root = parser.element()?;
    parser.skip_misc()?;
    if parser.pos < input.len() {
        return Err(parser.error("trailing content after root element"));
    }
    Ok(root)
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn error(&self, reason: &str) -> Error {
        Error::malformed("xml", format!("{} at byte {}", reason, self.pos))
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.input.len() - trimmed.len();
    }

    fn skip_past(&mut self, terminator: &str) -> Result<()> {
        match self.rest().find(terminator) {
            Some(idx) => {
                self.pos += idx + terminator.len();
                Ok(())
            }
            None => Err(self.error(&format!("unterminated construct, expected {}", terminator))),
        }
    }

    /// Skip whitespace, declarations, doctypes and comments
    fn skip_misc(&mut self) -> Result<()> {
        loop {
            self.skip_ws();
            let rest = self.rest();
            if rest.starts_with("<?") {
                self.skip_past("?>")?;
            } else if rest.starts_with("<!--") {
                self.skip_past("-->")?;
            } else if rest.starts_with("<!") {
                self.skip_past(">")?;
            } else {
                return Ok(());
            }
        }
    }

    fn expect(&mut self, token: &str) -> Result<()> {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            Ok(())
        } else {
            Err(self.error(&format!("expected `{}`", token)))
        }
    }

    fn name(&mut self) -> Result<&'a str> {
        let rest = self.rest();
        let len = rest
            .find(|c: char| c.is_whitespace() || matches!(c, '>' | '/' | '=' | '<'))
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(self.error("expected a name"));
        }
        self.pos += len;
        Ok(&rest[..len])
    }

    fn element(&mut self) -> Result<Element> {
        self.expect("<")?;
        let name = self.name()?;
        let mut elem = Element::new(name);

        // Attributes
        loop {
            self.skip_ws();
            let rest = self.rest();
            if rest.starts_with("/>") {
                self.pos += 2;
                return Ok(elem);
            }
            if rest.starts_with('>') {
                self.pos += 1;
                break;
            }
            let attr = self.name()?;
            self.skip_ws();
            self.expect("=")?;
            self.skip_ws();
            let quote = match self.rest().chars().next() {
                Some(q @ ('"' | '\'')) => q,
                _ => return Err(self.error("expected quoted attribute value")),
            };
            self.pos += 1;
            let end = self
                .rest()
                .find(quote)
                .ok_or_else(|| self.error("unterminated attribute value"))?;
            let raw = &self.rest()[..end];
            let value = self.unescape(raw)?;
            self.pos += end + 1;
            elem.set_attr(attr, value);
        }

        // Content
        let mut text = String::new();
        loop {
            let rest = self.rest();
            if rest.is_empty() {
                return Err(self.error(&format!("unterminated element <{}>", name)));
            }
            if rest.starts_with("</") {
                self.pos += 2;
                let closing = self.name()?;
                if closing != name {
                    return Err(self.error(&format!(
                        "mismatched closing tag </{}> for <{}>",
                        closing, name
                    )));
                }
                self.skip_ws();
                self.expect(">")?;
                break;
            }
            if rest.starts_with("<!--") {
                self.skip_past("-->")?;
            } else if rest.starts_with("<![CDATA[") {
                self.pos += "<![CDATA[".len();
                let end = self
                    .rest()
                    .find("]]>")
                    .ok_or_else(|| self.error("unterminated CDATA section"))?;
                text.push_str(&self.rest()[..end]);
                self.pos += end + 3;
            } else if rest.starts_with('<') {
                let child = self.element()?;
                elem.add_child(child);
            } else {
                let end = rest.find('<').unwrap_or(rest.len());
                let raw = &rest[..end];
                text.push_str(&self.unescape(raw)?);
                self.pos += end;
            }
        }

        if elem.children().is_empty() {
            if !text.is_empty() {
                elem.set_content(text);
            }
        } else if !text.trim().is_empty() {
            elem.set_content(text.trim());
        }
        Ok(elem)
    }

    fn unescape(&self, raw: &str) -> Result<String> {
        if !raw.contains('&') {
            return Ok(raw.to_string());
        }
        let mut out = String::with_capacity(raw.len());
        let mut rest = raw;
        while let Some(amp) = rest.find('&') {
            out.push_str(&rest[..amp]);
            let after = &rest[amp + 1..];
            let semi = after
                .find(';')
                .ok_or_else(|| self.error("unterminated entity reference"))?;
            let entity = &after[..semi];
            let decoded = match entity {
                "amp" => '&',
                "lt" => '<',
                "gt" => '>',
                "quot" => '"',
                "apos" => '\'',
                _ => {
                    let code = if let Some(hex) = entity.strip_prefix("#x") {
                        u32::from_str_radix(hex, 16).ok()
                    } else if let Some(dec) = entity.strip_prefix('#') {
                        dec.parse().ok()
                    } else {
                        None
                    };
                    code.and_then(char::from_u32)
                        .ok_or_else(|| self.error(&format!("unknown entity &{};", entity)))?
                }
            };
            out.push(decoded);
            rest = &after[semi + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }
}
