pub mod error;
pub mod io;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod stages;
pub mod template;

pub use error::PipelineError;
pub use io::{ProductTable, read_product_table, read_products};
pub use llm::{CompletionService, MockCompletionService, OpenAiClient, OpenAiConfig};
pub use models::{ContentStatus, EnrichedProduct, ProductRecord};
pub use pipeline::{
    FailurePolicy, Pipeline, PipelineConfig, PipelineState, RetryConfig, RunReport,
    SkippedProduct, enrich_product,
};
pub use stages::{
    ReadConfig, RenderConfig, execute_read, fetch_description, generate_content, normalize_text,
    render_document,
};
