use std::path::PathBuf;

use chrono::NaiveDateTime;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::io::{output_path, write_document};
use crate::models::{ContentStatus, EnrichedProduct};
use crate::template::{DocxPackage, Template, TemplateData, TemplateItem};

/// Section holding the successfully generated products
pub const PRODUCTS_SECTION: &str = "products";
/// Section holding the products whose generation failed
pub const SKIPPED_SECTION: &str = "skipped";

const DISPLAY_TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Configuration for document rendering
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// DOCX template with a `products` section
    pub template_path: PathBuf,
    /// Directory receiving the rendered document
    pub output_dir: PathBuf,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            template_path: PathBuf::from("template.docx"),
            output_dir: PathBuf::from("output"),
        }
    }
}

/// Result of rendering
#[derive(Debug)]
pub struct RenderResult {
    pub output_path: PathBuf,
    /// Items bound to the `products` section
    pub rendered: usize,
    /// Items bound to the `skipped` section
    pub skipped: usize,
}

/// Bind products to template values.
///
/// Generated products go to `products`, failed ones to `skipped`; `index`
/// is the 1-based input position in both.
pub fn build_template_data(products: &[EnrichedProduct], at: &NaiveDateTime) -> TemplateData {
    let mut rendered = Vec::new();
    let mut skipped = Vec::new();

    for (i, product) in products.iter().enumerate() {
        let record = &product.record;
        let index = (i + 1).to_string();

        match &product.status {
            ContentStatus::Generated => {
                let mut item: TemplateItem = record.extra.clone();
                item.insert("index".into(), index);
                item.insert("name".into(), record.name.clone());
                item.insert("url".into(), record.source_url.clone());
                item.insert(
                    "description".into(),
                    record.existing_description.clone().unwrap_or_default(),
                );
                item.insert(
                    "fetched_description".into(),
                    product.fetched_description.clone(),
                );
                item.insert(
                    "generated_content".into(),
                    product.generated_content.clone(),
                );
                rendered.push(item);
            }
            ContentStatus::Failed { reason } => {
                let mut item = TemplateItem::new();
                item.insert("index".into(), index);
                item.insert("name".into(), record.name.clone());
                item.insert("url".into(), record.source_url.clone());
                item.insert("reason".into(), reason.clone());
                skipped.push(item);
            }
        }
    }

    let mut data = TemplateData::new();
    data.set("generated_at", at.format(DISPLAY_TIMESTAMP_FORMAT).to_string())
        .set("product_count", rendered.len().to_string())
        .set("skipped_count", skipped.len().to_string())
        .set_section(PRODUCTS_SECTION, rendered)
        .set_section(SKIPPED_SECTION, skipped);
    data
}

/// Render products into the template and write
/// `<output_dir>/all_products_<timestamp>.docx`.
///
/// `at` is the render start time; it names the file and fills
/// `generated_at`.
pub fn render_document(
    products: &[EnrichedProduct],
    config: &RenderConfig,
    at: NaiveDateTime,
) -> Result<RenderResult> {
    info!("Loading template from {:?}", config.template_path);
    let mut package =
        DocxPackage::open(&config.template_path).map_err(|e| PipelineError::TemplateMissing {
            path: config.template_path.clone(),
            detail: e.to_string(),
        })?;

    let data = build_template_data(products, &at);
    let render_failed = |e: crate::template::TemplateError| PipelineError::RenderFailed {
        detail: e.to_string(),
    };

    for part in package.template_parts() {
        let xml = package.part_text(&part).map_err(render_failed)?;
        let template = Template::compile(xml).map_err(|e| PipelineError::RenderFailed {
            detail: format!("{}: {}", part, e),
        })?;
        debug!("Rendering {} (sections: {:?})", part, template.sections());

        let rendered = template.render(&data);
        package.set_part(&part, rendered.into_bytes());
    }

    let bytes = package.to_bytes().map_err(render_failed)?;
    let path = output_path(&config.output_dir, &at);
    write_document(&path, &bytes)?;

    let rendered = data.section(PRODUCTS_SECTION).len();
    let skipped = data.section(SKIPPED_SECTION).len();
    info!("Generated {:?} ({} products, {} skipped)", path, rendered, skipped);

    Ok(RenderResult {
        output_path: path,
        rendered,
        skipped,
    })
}
