//! Prompt templates for evolution generation.

/// System message sent with every generation request.
pub const SYSTEM_PROMPT: &str = "You are a historical linguist and etymologist specializing in \
semantic evolution. Respond ONLY with valid JSON.";

/// Build the user prompt asking for `num_examples` usages of `word` per era.
///
/// The output is a pure function of its arguments.
pub fn build_prompt(word: &str, eras: &[String], num_examples: usize) -> String {
    let era_list = eras.join(", ");
    let first = eras.first().map(String::as_str).unwrap_or("1900s");
    let second = eras.get(1).map(String::as_str).unwrap_or("2020s");

    format!(
        r#"Analyze how the word "{word}" evolved across different time periods.

For each era below, provide {num_examples} contextual examples that show how people understood and used this word during that period. Focus on:
- Semantic changes and shifts in meaning
- Cultural context and connotations
- Historical usage patterns
- Notable differences from other eras

Eras: {era_list}

Requirements:
- Exactly {num_examples} examples per era, one JSON key per era listed above
- Each example should be a complete phrase or short sentence (10-30 words)
- Show authentic period-appropriate usage
- Capture the essence of how meaning changed
- Be historically accurate and specific

Format as valid JSON only (no markdown, no preamble):
{{
  "{first}": [
    "example 1 showing meaning/context",
    "example 2 showing meaning/context",
    ...
  ],
  "{second}": [
    "example 1 showing meaning/context",
    ...
  ]
}}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_names_word_eras_and_count() {
        let eras = vec!["1900s".to_string(), "1960s".to_string(), "2020s".to_string()];
        let prompt = build_prompt("privacy", &eras, 5);

        assert!(prompt.contains(r#""privacy""#));
        assert!(prompt.contains("Eras: 1900s, 1960s, 2020s"));
        assert!(prompt.contains("provide 5 contextual examples"));
        assert!(prompt.contains("Exactly 5 examples per era"));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let eras = vec!["1800s".to_string()];
        assert_eq!(build_prompt("wire", &eras, 3), build_prompt("wire", &eras, 3));
    }
}
