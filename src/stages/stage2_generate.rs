use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::llm::CompletionService;
use crate::models::{GenerationRequest, ProductRecord};

/// Ask the completion service for the full marketing write-up of a product.
///
/// `description` is the text returned by the description prompt. The
/// style ruleset lives in the system prompt and is not checked against the
/// response here.
pub async fn generate_content(
    client: &dyn CompletionService,
    record: &ProductRecord,
    description: &str,
) -> Result<String> {
    let request = GenerationRequest::content(
        &record.name,
        &record.source_url,
        description,
        record.existing_description.as_deref(),
    );
    debug!("Requesting content for {}", record.name);

    let content = client
        .complete(request.system_prompt(), &request.user_message())
        .await
        .map_err(|e| PipelineError::GenerationFailed {
            product: record.name.clone(),
            stage: request.role,
            reason: e.to_string(),
        })?;

    info!("content generated for {}", record.name);
    Ok(content)
}
