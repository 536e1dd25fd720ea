//! Prompt builders for language detection, answer generation and translation.

use std::fmt::Write as _;

use crate::types::Procedure;

/// Instructions for the language-detection call.
const LANGUAGE_DETECTION_PROMPT: &str = "\
Identify the natural language of the text below. Reply with only the English \
name of the language, for example `English` or `Amharic`. Do not add any \
other words or punctuation.";

/// Instructions for answers grounded on retrieved procedures.
const GROUNDED_PROMPT: &str = "\
You are a citizen-services assistant. Answer the question using the official \
procedures below as your primary source. Quote fees, processing times and \
required documents exactly as listed. If the procedures do not cover part of \
the question, say so instead of inventing details.";

/// Instructions for answers with no matching procedure.
const UNGROUNDED_PROMPT: &str = "\
You are a citizen-services assistant. No official procedure matched this \
question. Answer from general knowledge, state clearly that the answer is \
not based on an official procedure, and suggest contacting the relevant \
office to confirm.";

/// Instructions for the batched translation call.
const TRANSLATION_PROMPT: &str = "\
Translate each segment below into the target language. Segments are separated \
by a line containing only the separator marker. Keep the segments in the same \
order, keep the separator lines exactly as they are, and return exactly as \
many segments as you received. Do not translate the separator, do not number \
the segments and do not add commentary.";

/// Longest reply accepted as a language name.
const MAX_LANGUAGE_NAME_LEN: usize = 40;

// ─────────────────────────────────────────────────────────────────────────────
// Languages
// ─────────────────────────────────────────────────────────────────────────────

/// Display name for a language code, falling back to the code itself.
pub fn language_name(code: &str) -> &str {
    match code.to_ascii_lowercase().as_str() {
        "en" => "English",
        "am" => "Amharic",
        "om" => "Afaan Oromo",
        "ti" => "Tigrinya",
        _ => code,
    }
}

/// Prompt asking the model which language `query` is written in.
pub fn language_detection_prompt(query: &str) -> String {
    format!("{}\n\nText:\n{}", LANGUAGE_DETECTION_PROMPT, query)
}

/// Reduce a detection reply to a bare language name.
///
/// Takes the first non-empty line and strips quotes and trailing
/// punctuation. Returns `None` when nothing plausible remains.
pub fn normalize_language(raw: &str) -> Option<String> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;
    let name = line
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '*')
        .trim_end_matches(['.', '!', ',', ';', ':'])
        .trim();

    if name.is_empty() || name.len() > MAX_LANGUAGE_NAME_LEN {
        return None;
    }
    Some(name.to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Answer Generation
// ─────────────────────────────────────────────────────────────────────────────

/// Render procedures as the grounding block of an official answer.
pub fn format_procedures(procedures: &[Procedure]) -> String {
    let mut out = String::new();
    for (i, procedure) in procedures.iter().enumerate() {
        let _ = writeln!(out, "Procedure {}: {}", i + 1, procedure.name);
        write_list(&mut out, "Prerequisites", &procedure.prerequisites, false);
        write_list(&mut out, "Steps", &procedure.steps, true);
        write_list(&mut out, "Results", &procedure.results, false);
        if let Some(fee) = &procedure.fee {
            let _ = writeln!(out, "Fee: {}", fee);
        }
        if let Some(time) = &procedure.processing_time {
            let _ = writeln!(out, "Processing time: {}", time);
        }
        out.push('\n');
    }
    out.trim_end().to_string()
}

fn write_list(out: &mut String, label: &str, items: &[String], numbered: bool) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "{}:", label);
    for (i, item) in items.iter().enumerate() {
        if numbered {
            let _ = writeln!(out, "  {}. {}", i + 1, item);
        } else {
            let _ = writeln!(out, "  - {}", item);
        }
    }
}

/// Prompt for an answer grounded on retrieved procedures.
pub fn grounded_prompt(query: &str, language: &str, procedures: &[Procedure]) -> String {
    format!(
        "{}\n\nRespond in {}.\n\n## Official procedures\n\n{}\n\n## Question\n\n{}",
        GROUNDED_PROMPT,
        language,
        format_procedures(procedures),
        query
    )
}

/// Prompt for an answer with no matching procedure.
pub fn ungrounded_prompt(query: &str, language: &str) -> String {
    format!(
        "{}\n\nRespond in {}.\n\n## Question\n\n{}",
        UNGROUNDED_PROMPT, language, query
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Translation
// ─────────────────────────────────────────────────────────────────────────────

/// Prompt carrying every segment of a document in one request.
pub fn translation_prompt(
    source_language: &str,
    target_language: &str,
    separator: &str,
    joined: &str,
) -> String {
    format!(
        "{}\n\nSource language: {}\nTarget language: {}\nSeparator: {}\n\n{}",
        TRANSLATION_PROMPT,
        language_name(source_language),
        language_name(target_language),
        separator,
        joined
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_language() {
        assert_eq!(normalize_language("Amharic"), Some("Amharic".to_string()));
        assert_eq!(normalize_language("  \"English\".\n"), Some("English".to_string()));
        assert_eq!(
            normalize_language("\nAfaan Oromo\nThe text is Oromo."),
            Some("Afaan Oromo".to_string())
        );
        assert_eq!(normalize_language("   \n  "), None);
        assert_eq!(normalize_language("\"\""), None);
        assert_eq!(normalize_language(&"x".repeat(80)), None);
    }

    #[test]
    fn test_language_name() {
        assert_eq!(language_name("am"), "Amharic");
        assert_eq!(language_name("EN"), "English");
        assert_eq!(language_name("fr"), "fr");
    }

    #[test]
    fn test_grounded_prompt_carries_procedure_fields() {
        let procedure = Procedure::new("p1", "Procedure1")
            .with_prerequisites(["A"])
            .with_steps(["Step1"])
            .with_results(["Result1"])
            .with_fee(100.0, "ETB")
            .with_processing_time(1, 3);

        let prompt = grounded_prompt("How do I get a license?", "English", &[procedure]);
        assert!(prompt.contains("Procedure 1: Procedure1"));
        assert!(prompt.contains("  - A"));
        assert!(prompt.contains("  1. Step1"));
        assert!(prompt.contains("  - Result1"));
        assert!(prompt.contains("Fee: 100 ETB"));
        assert!(prompt.contains("Processing time: 1-3 days"));
        assert!(prompt.contains("Respond in English."));
        assert!(prompt.ends_with("How do I get a license?"));
    }

    #[test]
    fn test_ungrounded_prompt_flags_no_match() {
        let prompt = ungrounded_prompt("What is the weather?", "Amharic");
        assert!(prompt.contains("No official procedure matched"));
        assert!(prompt.contains("Respond in Amharic."));
        assert!(!prompt.contains("## Official procedures"));
    }

    #[test]
    fn test_translation_prompt_names_languages() {
        let prompt = translation_prompt("en", "am", "[[[SEG]]]", "a\n[[[SEG]]]\nb");
        assert!(prompt.contains("Source language: English"));
        assert!(prompt.contains("Target language: Amharic"));
        assert!(prompt.contains("Separator: [[[SEG]]]"));
        assert!(prompt.ends_with("a\n[[[SEG]]]\nb"));
    }
}
