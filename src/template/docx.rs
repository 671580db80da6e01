use std::io::{Cursor, Read, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::TemplateError;

/// Main document part of a WordprocessingML package
pub const DOCUMENT_PART: &str = "word/document.xml";

#[derive(Debug, Clone)]
struct Part {
    name: String,
    data: Vec<u8>,
    is_dir: bool,
}

/// The parts of a DOCX (zip) package, in archive order
#[derive(Debug, Clone)]
pub struct DocxPackage {
    parts: Vec<Part>,
}

impl DocxPackage {
    pub fn open(path: &Path) -> Result<Self, TemplateError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, TemplateError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut parts = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;
            parts.push(Part {
                name: entry.name().to_string(),
                data,
                is_dir: entry.is_dir(),
            });
        }

        let package = Self { parts };
        if package.part(DOCUMENT_PART).is_none() {
            return Err(TemplateError::MissingPart(DOCUMENT_PART.to_string()));
        }
        Ok(package)
    }

    fn part(&self, name: &str) -> Option<&Part> {
        self.parts.iter().find(|p| p.name == name && !p.is_dir)
    }

    /// Names of the parts that may carry template tags: the main document,
    /// headers and footers
    pub fn template_parts(&self) -> Vec<String> {
        self.parts
            .iter()
            .filter(|p| !p.is_dir && is_template_part(&p.name))
            .map(|p| p.name.clone())
            .collect()
    }

    pub fn part_text(&self, name: &str) -> Result<&str, TemplateError> {
        let part = self
            .part(name)
            .ok_or_else(|| TemplateError::MissingPart(name.to_string()))?;
        std::str::from_utf8(&part.data).map_err(|_| TemplateError::InvalidEncoding(name.to_string()))
    }

    /// Replace (or add) a part
    pub fn set_part(&mut self, name: &str, data: Vec<u8>) {
        match self.parts.iter_mut().find(|p| p.name == name) {
            Some(part) => part.data = data,
            None => self.parts.push(Part {
                name: name.to_string(),
                data,
                is_dir: false,
            }),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, TemplateError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for part in &self.parts {
            if part.is_dir {
                writer.add_directory(part.name.as_str(), options)?;
            } else {
                writer.start_file(part.name.as_str(), options)?;
                writer.write_all(&part.data)?;
            }
        }

        Ok(writer.finish()?.into_inner())
    }
}

fn is_template_part(name: &str) -> bool {
    let Some(file) = name.strip_prefix("word/") else {
        return false;
    };
    file == "document.xml"
        || (file.ends_with(".xml")
            && !file.contains('/')
            && (file.starts_with("header") || file.starts_with("footer")))
}

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const ROOT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"></Relationships>"#;

/// Build a minimal DOCX whose body is one plain paragraph per entry of
/// `paragraphs`
pub fn build_docx(paragraphs: &[&str]) -> Result<Vec<u8>, TemplateError> {
    let mut body = String::new();
    for text in paragraphs {
        body.push_str(r#"<w:p><w:r><w:t xml:space="preserve">"#);
        body.push_str(&escape_text(text));
        body.push_str("</w:t></w:r></w:p>");
    }

    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}<w:sectPr/></w:body></w:document>"#,
        body
    );

    let package = DocxPackage {
        parts: vec![
            file_part("[Content_Types].xml", CONTENT_TYPES_XML),
            file_part("_rels/.rels", ROOT_RELS_XML),
            file_part("word/_rels/document.xml.rels", DOCUMENT_RELS_XML),
            file_part(DOCUMENT_PART, &document),
        ],
    };
    package.to_bytes()
}

/// Paragraph layout of the starter template
pub const STARTER_TEMPLATE: &[&str] = &[
    "Product Catalogue",
    "Generated {generated_at} ({product_count} products)",
    "{#products}",
    "{index}. {name}",
    "Source: {url}",
    "{generated_content}",
    "{/products}",
    "Skipped products: {skipped_count}",
    "{#skipped}",
    "{index}. {name} ({url}): {reason}",
    "{/skipped}",
];

/// The starter template written by `init-template`
pub fn starter_template() -> Result<Vec<u8>, TemplateError> {
    build_docx(STARTER_TEMPLATE)
}

fn file_part(name: &str, xml: &str) -> Part {
    Part {
        name: name.to_string(),
        data: xml.as_bytes().to_vec(),
        is_dir: false,
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
