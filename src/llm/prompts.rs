use once_cell::sync::Lazy;

/// System prompt for extracting a product description from its page URL
pub const DESCRIPTION_SYSTEM_PROMPT: &str = r#"Extract the product description (if any) from the given product URL.
- Don't add any reference links in your answer.
- Keep the language of the source; do not translate or reword it.
- Give the answer in a single paragraph."#;

/// Phrases the content writer must never use
pub const BANNED_PHRASES: &[&str] = &[
    "Guaranteed satisfaction",
    "Perfect choice",
    "Best in the market",
    "Once-in-a-lifetime",
    "Must-have",
    "Secret design",
    "100% effective",
    "Exclusive",
    "No downsides",
    "Universal appeal",
    "Limited only to you",
    "All-in-one solution",
    "Foolproof system",
    "Perfect results",
];

/// Style rules of the content prompt, ahead of the banned-phrase list
const CONTENT_RULES: &str = r#"You are a content and SEO writer producing product descriptions for an e-commerce website. Follow the rules below.

DO:
1. Provide accurate information: present correct details about the product's features, specifications and benefits.
2. Use clear language: make the product's features and advantages easy to understand for potential buyers.
3. Focus on practical applications: show how the product is used in everyday life.
4. Highlight key selling points: outline what sets the product apart from alternatives.
5. Be transparent about variability: state that performance or results may vary with individual usage or environment.

DON'T:
1. Overhype: no exaggerated claims or overpromised features, benefits or results.
2. Mislead: no ambiguous terms that could confuse the customer.
3. Make false claims: no unverifiable claims about endorsements, exclusivity or guaranteed success.
4. Use vague jargon: stay grounded; technical language only where essential.
5. Omit disclaimers: include necessary warnings, compatibility notes and limitations.
6. Stuff keywords: work SEO keywords in naturally."#;

/// Expected layout of the write-up, after the banned-phrase list
const CONTENT_LAYOUT: &str = r#"You will be given a product and, in some cases, its existing content on the website. Write a detailed product description in this format:
Heading of the page with the product name
Product Description (2-3 paragraphs with at least 70 words in each paragraph)
Frequently Asked Questions: five to six commonly asked questions with answers (10-20 words per answer)
Key Benefits: the key benefits in 4 pointers (30-50 words)
Directions for Use (30-50 words)
Safety Information
Other Information (30-50 words)
Meta Title including the complete product name and other keywords (50-70 characters)
Meta Description including the main SEO keywords (130-170 characters)"#;

/// System prompt for the marketing write-up: style rules, the
/// [`BANNED_PHRASES`] list and the layout
pub static CONTENT_SYSTEM_PROMPT: Lazy<String> = Lazy::new(|| {
    let banned: Vec<String> = BANNED_PHRASES.iter().map(|p| format!("- {}", p)).collect();
    format!(
        "{}\n\nNEVER USE THESE TERMS:\n{}\n\n{}",
        CONTENT_RULES,
        banned.join("\n"),
        CONTENT_LAYOUT
    )
});

/// Build the user message for the description prompt
pub fn build_description_prompt(product_url: &str) -> String {
    format!("Product url is {}", product_url)
}

/// Build the user message for the content prompt
pub fn build_content_prompt(
    product_name: &str,
    description: &str,
    existing_description: Option<&str>,
) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!("Product name is {}\n", product_name));
    prompt.push_str(&format!("Existing description is {}\n", description.trim()));

    if let Some(existing) = existing_description.filter(|s| !s.trim().is_empty()) {
        prompt.push_str(&format!(
            "Current website content is {}\n",
            existing.trim()
        ));
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_prompt_lists_every_banned_phrase() {
        for phrase in BANNED_PHRASES {
            assert!(
                CONTENT_SYSTEM_PROMPT.contains(phrase),
                "banned phrase missing from prompt: {phrase}"
            );
        }
    }

    #[test]
    fn test_banned_list_comes_from_the_constant() {
        let listed: Vec<&str> = CONTENT_SYSTEM_PROMPT
            .lines()
            .skip_while(|line| *line != "NEVER USE THESE TERMS:")
            .skip(1)
            .take_while(|line| !line.is_empty())
            .collect();
        let expected: Vec<String> = BANNED_PHRASES.iter().map(|p| format!("- {}", p)).collect();
        assert_eq!(listed, expected);
        assert!(CONTENT_SYSTEM_PROMPT.starts_with("You are a content and SEO writer"));
        assert!(CONTENT_SYSTEM_PROMPT.ends_with("(130-170 characters)"));
    }

    #[test]
    fn test_content_prompt_states_layout_limits() {
        assert!(CONTENT_SYSTEM_PROMPT.contains("at least 70 words"));
        assert!(CONTENT_SYSTEM_PROMPT.contains("50-70 characters"));
        assert!(CONTENT_SYSTEM_PROMPT.contains("130-170 characters"));
    }

    #[test]
    fn test_build_content_prompt_without_existing() {
        let prompt = build_content_prompt("Widget", "  A small widget.  ", None);
        assert_eq!(
            prompt,
            "Product name is Widget\nExisting description is A small widget.\n"
        );
    }

    #[test]
    fn test_build_content_prompt_with_existing() {
        let prompt = build_content_prompt("Widget", "Fetched.", Some("From the CSV."));
        assert!(prompt.ends_with("Current website content is From the CSV.\n"));

        let blank = build_content_prompt("Widget", "Fetched.", Some("   "));
        assert!(!blank.contains("Current website content"));
    }

    #[test]
    fn test_build_description_prompt() {
        assert_eq!(
            build_description_prompt("http://example.com/w"),
            "Product url is http://example.com/w"
        );
    }
}
