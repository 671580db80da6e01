use std::fmt;

use crate::llm::{
    CONTENT_SYSTEM_PROMPT, DESCRIPTION_SYSTEM_PROMPT, build_content_prompt,
    build_description_prompt,
};

/// Which of the two per-product prompts a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRole {
    Description,
    Content,
}

impl fmt::Display for PromptRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptRole::Description => write!(f, "description"),
            PromptRole::Content => write!(f, "content"),
        }
    }
}

/// A single completion request, alive only for the duration of one call.
#[derive(Debug, Clone)]
pub struct GenerationRequest<'a> {
    pub product_name: &'a str,
    pub product_url: &'a str,
    pub role: PromptRole,
    /// Description text fed to the content prompt
    pub prior_description: Option<&'a str>,
    /// Operator-provided description from the input row
    pub existing_description: Option<&'a str>,
}

impl<'a> GenerationRequest<'a> {
    pub fn description(product_name: &'a str, product_url: &'a str) -> Self {
        Self {
            product_name,
            product_url,
            role: PromptRole::Description,
            prior_description: None,
            existing_description: None,
        }
    }

    pub fn content(
        product_name: &'a str,
        product_url: &'a str,
        prior_description: &'a str,
        existing_description: Option<&'a str>,
    ) -> Self {
        Self {
            product_name,
            product_url,
            role: PromptRole::Content,
            prior_description: Some(prior_description),
            existing_description,
        }
    }

    pub fn system_prompt(&self) -> &'static str {
        match self.role {
            PromptRole::Description => DESCRIPTION_SYSTEM_PROMPT,
            PromptRole::Content => CONTENT_SYSTEM_PROMPT.as_str(),
        }
    }

    pub fn user_message(&self) -> String {
        match self.role {
            PromptRole::Description => build_description_prompt(self.product_url),
            PromptRole::Content => build_content_prompt(
                self.product_name,
                self.prior_description.unwrap_or_default(),
                self.existing_description,
            ),
        }
    }
}
