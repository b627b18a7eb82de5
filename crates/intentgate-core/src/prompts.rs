//! Prompt templates for the validator and matcher.

/// System instructions for intention validation.
pub const VALIDATION_SYSTEM_PROMPT: &str = r#"You review short statements people write before opening a website they have chosen to limit.
Decide whether the statement names a concrete, specific purpose for the visit.

Valid examples:
- "Watch the Rust async tutorial my teammate sent"
- "Reply to Sam's message about Saturday"
- "Look up the return policy for my order"

Invalid examples:
- "just browsing"
- "bored"
- "asdf asdf"
- "I want to"

Answer with exactly one word first, "Valid" or "Invalid". If Invalid, follow it with a colon and one short sentence telling the person what is missing."#;

/// System instructions for content matching. Ties resolve toward a match.
pub const MATCHING_SYSTEM_PROMPT: &str = r#"You check whether the page a person is looking at plausibly serves the purpose they declared before opening the site.
Be tolerant. Related content, navigation pages, search results and anything that could reasonably be a step toward the purpose count as a match.
Only report low confidence when the page is clearly unrelated to the declared purpose.
When unsure, lean toward a match.

Respond with a JSON object only:
{"confidence": <number between 0 and 1>, "reasoning": "<one short sentence>"}"#;

/// User prompt for validating an intention.
pub fn validation_prompt(intention: &str) -> String {
    format!("Statement: \"{}\"", intention.trim())
}

/// User prompt for matching page content against an intention.
pub fn matching_prompt(intention: &str, url: &str, content: &str) -> String {
    format!(
        "Declared purpose: \"{}\"\nPage URL: {}\n\nPage content:\n{}",
        intention.trim(),
        url,
        content
    )
}
