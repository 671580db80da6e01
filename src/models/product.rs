use std::collections::BTreeMap;

/// Placeholder text bound to a product whose content could not be generated.
pub const FAILED_CONTENT_PLACEHOLDER: &str = "[content generation failed]";

/// One row of the input table.
///
/// Identity is the row position; nothing prevents two rows from sharing a
/// name or URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRecord {
    /// Product name (`name` column)
    pub name: String,
    /// Product page URL (`url` column)
    pub source_url: String,
    /// Operator-provided description (`description` column, if non-empty)
    pub existing_description: Option<String>,
    /// Every other column of the row, keyed by header name
    pub extra: BTreeMap<String, String>,
}

impl ProductRecord {
    pub fn new(name: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_url: source_url.into(),
            existing_description: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.existing_description = Some(description.into());
        self
    }
}

/// Outcome of the per-item generation task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentStatus {
    Generated,
    Failed { reason: String },
}

/// A product record plus the content generated for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedProduct {
    pub record: ProductRecord,
    /// Description text returned by the description prompt
    pub fetched_description: String,
    /// Normalized marketing copy (placeholder when generation failed)
    pub generated_content: String,
    pub status: ContentStatus,
}

impl EnrichedProduct {
    pub fn generated(
        record: ProductRecord,
        fetched_description: String,
        generated_content: String,
    ) -> Self {
        Self {
            record,
            fetched_description,
            generated_content,
            status: ContentStatus::Generated,
        }
    }

    /// Placeholder for a product whose generation failed after all retries.
    pub fn failed(record: ProductRecord, reason: impl Into<String>) -> Self {
        Self {
            record,
            fetched_description: String::new(),
            generated_content: FAILED_CONTENT_PLACEHOLDER.to_string(),
            status: ContentStatus::Failed {
                reason: reason.into(),
            },
        }
    }

    pub fn is_generated(&self) -> bool {
        self.status == ContentStatus::Generated
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_product_carries_placeholder() {
        let record = ProductRecord::new("Widget", "http://example.com/w");
        let product = EnrichedProduct::failed(record.clone(), "HTTP 503");

        assert!(!product.is_generated());
        assert_eq!(product.generated_content, FAILED_CONTENT_PLACEHOLDER);
        assert_eq!(product.record, record);
        assert_eq!(
            product.status,
            ContentStatus::Failed {
                reason: "HTTP 503".to_string()
            }
        );
    }
}
