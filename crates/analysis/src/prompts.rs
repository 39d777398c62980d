//! Prompt builders for the three analysis stages.
//!
//! Each prompt pins the exact JSON shape the decoders in `harvest_core`
//! accept, so a well-behaved model answer always decodes.

pub const PRODUCTS_SYSTEM: &str =
    "You identify software products mentioned in social media posts. Reply with JSON only.";

pub const SENTIMENT_SYSTEM: &str =
    "You judge the sentiment of social media posts about developer tools. Reply with JSON only.";

pub const CATEGORIZE_SYSTEM: &str =
    "You sort product feedback into categories. Reply with JSON only.";

/// Description shown to the model for a known feedback category.
pub fn category_description(category: &str) -> &'static str {
    match category {
        "Bug Reports" => "a concrete malfunction or crash in the tool",
        "Feature Requests" => "a suggestion for new functionality or an improvement",
        "General Feedback" => "opinions that fit no narrower category",
        "Questions" => "the author asks for help or clarification",
        "Praise" => "positive feedback or a testimonial",
        "Issues" => "a problem that needs attention but is not a bug (pricing, account, policy)",
        _ => "",
    }
}

pub fn products_prompt(text: &str, supported_products: &[String]) -> String {
    format!(
        r#"Find mentions of these products in the post: {products}.
Ignore products outside that list.

Post:
"""
{text}
"""

Answer with exactly this JSON object:
{{
  "products": [
    {{
      "name": "product name from the list",
      "confidence": 0.0-1.0,
      "context": "short quote or summary of the mention",
      "sentiment": "positive|negative|neutral|mixed",
      "aspects": ["performance", "ui", "pricing"],
      "is_primary_mention": true,
      "version": "version string or null",
      "features": ["features discussed"],
      "comparisons": ["other products it is compared to"],
      "user_type": "developer|designer|student|other"
    }}
  ],
  "confidence": 0.0-1.0,
  "explanation": "one sentence"
}}
Return an empty "products" list when nothing matches."#,
        products = supported_products.join(", "),
        text = text,
    )
}

pub fn sentiment_prompt(text: &str, products: &[String]) -> String {
    let product_section = if products.is_empty() {
        "No specific products were identified; judge the post as a whole.".to_string()
    } else {
        format!(
            "Also judge the sentiment towards each of: {}.",
            products.join(", ")
        )
    };

    format!(
        r#"{product_section}

Post:
"""
{text}
"""

Answer with exactly this JSON object:
{{
  "sentiment": "positive|negative|neutral|mixed",
  "product_sentiments": {{
    "product name": {{
      "sentiment": "positive|negative|neutral|mixed",
      "aspects": {{"aspect": "positive|negative|neutral|mixed"}},
      "intensity": 0.0-1.0,
      "confidence": 0.0-1.0,
      "context": "short reason"
    }}
  }},
  "intensity": 0.0-1.0,
  "confidence": 0.0-1.0,
  "explanation": "one sentence"
}}
Use "neutral" when unclear and "mixed" when both positive and negative points appear."#,
    )
}

pub fn categorize_prompt(text: &str, categories: &[String], products: &[String]) -> String {
    let category_list = categories
        .iter()
        .map(|c| match category_description(c) {
            "" => format!("- {}", c),
            description => format!("- {}: {}", c, description),
        })
        .collect::<Vec<_>>()
        .join("\n");
    let products = if products.is_empty() {
        "none".to_string()
    } else {
        products.join(", ")
    };

    format!(
        r#"Pick the single best category for the post.

Categories:
{category_list}

Products mentioned: {products}

Post:
"""
{text}
"""

Answer with exactly this JSON object:
{{
  "category": "one category name from the list",
  "confidence": 0.0-1.0,
  "explanation": "one sentence",
  "secondary_categories": ["other fitting categories"],
  "keywords": ["salient words from the post"],
  "product_context": {{"product name": "category for this product"}}
}}"#,
    )
}
