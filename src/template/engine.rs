use std::ops::Range;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::{TemplateData, TemplateError, TemplateItem};

/// An opening, closing or self-closing `<w:p>` tag
static RE_PARAGRAPH_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(/?)w:p(?:\s[^>]*?)?(/?)>").unwrap());

/// A `<w:t>` text element; group 1 is the (escaped) text
static RE_TEXT_RUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<w:t(?:\s[^>/]*)?/>|<w:t(?:\s[^>/]*)?>(.*?)</w:t>").unwrap()
});

/// `{#name}` or `{/name}` filling a whole paragraph
static RE_SECTION_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{\s*([#/])\s*([A-Za-z_][\w.-]*)\s*\}$").unwrap());

/// A compiled document part
#[derive(Debug, Clone)]
pub struct Template {
    nodes: Vec<Node>,
}

#[derive(Debug, Clone)]
enum Node {
    Raw(String),
    Paragraph(Paragraph),
    Section { name: String, body: Vec<Node> },
}

#[derive(Debug, Clone)]
struct Paragraph {
    xml: String,
    /// `None` when the paragraph has no tags and is copied verbatim
    tokens: Option<Vec<Token>>,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Text(String),
    Field(String),
}

enum Line {
    Open(String),
    Close(String),
    Body(Option<Vec<Token>>),
}

#[derive(Default)]
struct Builder {
    root: Vec<Node>,
    open: Option<(String, Vec<Node>)>,
}

impl Builder {
    fn current(&mut self) -> &mut Vec<Node> {
        match &mut self.open {
            Some((_, body)) => body,
            None => &mut self.root,
        }
    }

    fn push_raw(&mut self, raw: &str) {
        if !raw.is_empty() {
            self.current().push(Node::Raw(raw.to_string()));
        }
    }
}

impl Template {
    /// Parse a WordprocessingML part and check every tag in it
    pub fn compile(xml: &str) -> Result<Self, TemplateError> {
        let mut builder = Builder::default();
        let mut last = 0;

        for span in paragraph_spans(xml) {
            builder.push_raw(&xml[last..span.range.start]);
            last = span.range.end;
            let para = &xml[span.range];

            let text = paragraph_text(para);
            if span.nested {
                // Text boxes and shapes carry their own paragraphs; their
                // runs cannot be re-flowed with the outer paragraph's text.
                if text.contains('{') {
                    return Err(TemplateError::NestedParagraph { paragraph: text });
                }
                builder.current().push(Node::Paragraph(Paragraph {
                    xml: para.to_string(),
                    tokens: None,
                }));
                continue;
            }

            match classify(&text)? {
                Line::Open(name) => {
                    if let Some((outer, _)) = &builder.open {
                        return Err(TemplateError::NestedSection {
                            outer: outer.clone(),
                            inner: name,
                        });
                    }
                    builder.open = Some((name, Vec::new()));
                }
                Line::Close(name) => match builder.open.take() {
                    Some((open_name, body)) if open_name == name => {
                        builder.root.push(Node::Section { name, body });
                    }
                    _ => return Err(TemplateError::UnmatchedSectionEnd { name }),
                },
                Line::Body(tokens) => builder.current().push(Node::Paragraph(Paragraph {
                    xml: para.to_string(),
                    tokens,
                })),
            }
        }
        builder.push_raw(&xml[last..]);

        if let Some((name, _)) = builder.open {
            return Err(TemplateError::UnclosedSection { name });
        }

        Ok(Self {
            nodes: builder.root,
        })
    }

    /// Names of the repeating sections, in document order
    pub fn sections(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter_map(|n| match n {
                Node::Section { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn render(&self, data: &TemplateData) -> String {
        let mut out = String::new();
        render_nodes(&self.nodes, &Scope { item: None, data }, &mut out);
        out
    }
}

/// Field lookup: the current section item first, then top-level values
struct Scope<'a> {
    item: Option<&'a TemplateItem>,
    data: &'a TemplateData,
}

impl Scope<'_> {
    fn get(&self, key: &str) -> &str {
        self.item
            .and_then(|item| item.get(key).map(String::as_str))
            .or_else(|| self.data.scalar(key))
            .unwrap_or_default()
    }
}

fn render_nodes(nodes: &[Node], scope: &Scope<'_>, out: &mut String) {
    for node in nodes {
        match node {
            Node::Raw(raw) => out.push_str(raw),
            Node::Paragraph(Paragraph { xml, tokens: None }) => out.push_str(xml),
            Node::Paragraph(Paragraph {
                xml,
                tokens: Some(tokens),
            }) => {
                let text: String = tokens
                    .iter()
                    .map(|t| match t {
                        Token::Text(s) => s.as_str(),
                        Token::Field(name) => scope.get(name),
                    })
                    .collect();
                out.push_str(&reflow_paragraph(xml, &text));
            }
            Node::Section { name, body } => {
                for item in scope.data.section(name) {
                    let item_scope = Scope {
                        item: Some(item),
                        data: scope.data,
                    };
                    render_nodes(body, &item_scope, out);
                }
            }
        }
    }
}

fn classify(text: &str) -> Result<Line, TemplateError> {
    if !text.contains('{') {
        return Ok(Line::Body(None));
    }

    if let Some(caps) = RE_SECTION_TAG.captures(text.trim()) {
        let name = caps[2].to_string();
        return Ok(if &caps[1] == "#" {
            Line::Open(name)
        } else {
            Line::Close(name)
        });
    }

    let tokens = tokenize(text)?;
    let inline_section = tokens
        .iter()
        .any(|t| matches!(t, Token::Field(f) if f.starts_with('#') || f.starts_with('/')));
    if inline_section {
        return Err(TemplateError::InlineSectionTag {
            paragraph: text.to_string(),
        });
    }

    Ok(Line::Body(Some(tokens)))
}

fn tokenize(text: &str) -> Result<Vec<Token>, TemplateError> {
    let mut tokens = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find('{') {
        if start > 0 {
            tokens.push(Token::Text(rest[..start].to_string()));
        }
        let after = &rest[start + 1..];
        let end = after.find('}').ok_or_else(|| TemplateError::UnclosedTag {
            paragraph: text.to_string(),
        })?;

        let name = after[..end].trim();
        if name.contains('{') {
            return Err(TemplateError::UnclosedTag {
                paragraph: text.to_string(),
            });
        }
        if name.is_empty() {
            return Err(TemplateError::EmptyTag {
                paragraph: text.to_string(),
            });
        }
        tokens.push(Token::Field(name.to_string()));
        rest = &after[end + 1..];
    }

    if !rest.is_empty() {
        tokens.push(Token::Text(rest.to_string()));
    }
    Ok(tokens)
}

/// Put `text` into the paragraph's first text element and empty the rest,
/// so tags split across runs render as one value.
fn reflow_paragraph(xml: &str, text: &str) -> String {
    let mut first = true;
    RE_TEXT_RUN
        .replace_all(xml, |_: &Captures| {
            if first {
                first = false;
                text_element(text)
            } else {
                "<w:t/>".to_string()
            }
        })
        .into_owned()
}

/// Escaped `<w:t>` element; newlines and tabs become `<w:br/>` and `<w:tab/>`
fn text_element(text: &str) -> String {
    const OPEN: &str = r#"<w:t xml:space="preserve">"#;

    let mut xml = String::with_capacity(text.len() + OPEN.len() + 8);
    xml.push_str(OPEN);
    for ch in text.chars() {
        match ch {
            '\n' => {
                xml.push_str("</w:t><w:br/>");
                xml.push_str(OPEN);
            }
            '\t' => {
                xml.push_str("</w:t><w:tab/>");
                xml.push_str(OPEN);
            }
            '\r' => {}
            '&' => xml.push_str("&amp;"),
            '<' => xml.push_str("&lt;"),
            '>' => xml.push_str("&gt;"),
            '"' => xml.push_str("&quot;"),
            c => xml.push(c),
        }
    }
    xml.push_str("</w:t>");
    xml
}

/// Visible text of one paragraph element
fn paragraph_text(xml: &str) -> String {
    RE_TEXT_RUN
        .captures_iter(xml)
        .filter_map(|caps| caps.get(1))
        .map(|m| unescape_xml(m.as_str()))
        .collect()
}

/// Visible text of every paragraph in a part, in document order
pub fn paragraph_texts(xml: &str) -> Vec<String> {
    paragraph_spans(xml)
        .into_iter()
        .map(|span| paragraph_text(&xml[span.range]))
        .collect()
}

/// A top-level `<w:p>` element
struct ParagraphSpan {
    range: Range<usize>,
    /// Holds further paragraphs (text box or shape content)
    nested: bool,
}

/// Top-level paragraphs of a part, matched by depth so that paragraphs
/// inside text boxes stay within their enclosing paragraph. An unclosed
/// trailing paragraph is left out and copied as raw XML.
fn paragraph_spans(xml: &str) -> Vec<ParagraphSpan> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut nested = false;

    for caps in RE_PARAGRAPH_TAG.captures_iter(xml) {
        let Some(tag) = caps.get(0) else { continue };
        let closing = !caps[1].is_empty();
        let self_closing = !caps[2].is_empty();

        if closing {
            match depth {
                0 => {}
                1 => {
                    depth = 0;
                    spans.push(ParagraphSpan {
                        range: start..tag.end(),
                        nested,
                    });
                }
                _ => depth -= 1,
            }
        } else if depth == 0 {
            if self_closing {
                spans.push(ParagraphSpan {
                    range: tag.range(),
                    nested: false,
                });
            } else {
                depth = 1;
                start = tag.start();
                nested = false;
            }
        } else {
            nested = true;
            if !self_closing {
                depth += 1;
            }
        }
    }
    spans
}

fn unescape_xml(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];

        let decoded = rest
            .find(';')
            .and_then(|end| decode_entity(&rest[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                entity.strip_prefix('#')?.parse().ok()?
            };
            char::from_u32(code)
        }
    }
}
