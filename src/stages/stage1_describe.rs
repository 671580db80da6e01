use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::llm::CompletionService;
use crate::models::{GenerationRequest, ProductRecord};

/// Ask the completion service for a description of the product behind
/// `record.source_url`.
///
/// Returns the raw response text. A single call is made; retrying is left
/// to the caller.
pub async fn fetch_description(
    client: &dyn CompletionService,
    record: &ProductRecord,
) -> Result<String> {
    let request = GenerationRequest::description(&record.name, &record.source_url);
    debug!("Requesting description for {} from {}", record.name, record.source_url);

    let description = client
        .complete(request.system_prompt(), &request.user_message())
        .await
        .map_err(|e| PipelineError::GenerationFailed {
            product: record.name.clone(),
            stage: request.role,
            reason: e.to_string(),
        })?;

    info!("description generated for {}", record.name);
    Ok(description)
}
