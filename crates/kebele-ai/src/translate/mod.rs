//! Structure-preserving translation of JSON documents.
//!
//! Every translatable leaf of a document is sent to the model in a single
//! completion call. Leaves are deduplicated and sorted, joined with a
//! separator line, and the reply is split on the same separator. The i-th
//! returned segment is the translation of the i-th sorted leaf, so a reply
//! with the wrong number of segments is rejected outright rather than
//! partially applied.

mod policy;
mod tree;

use std::collections::HashMap;
use std::sync::Arc;

use kebele_config::TranslationConfig;
use kebele_llm::{CallContext, LlmClient};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AiError, Result};
use crate::prompt::translation_prompt;

pub use policy::ExclusionPolicy;

/// Separator placed on its own line between segments.
pub const DEFAULT_SEPARATOR: &str = "[[[SEG]]]";

/// Translates JSON documents through one completion call per document.
pub struct StructuredTranslator {
    llm: Arc<LlmClient>,
    policy: ExclusionPolicy,
    source_language: String,
    supported: Vec<String>,
}

impl StructuredTranslator {
    /// Translator with English as the source and `en`/`am` supported.
    pub fn new(llm: Arc<LlmClient>) -> Self {
        Self::from_config(llm, &TranslationConfig::default())
    }

    /// Build from the `[translation]` config section.
    pub fn from_config(llm: Arc<LlmClient>, config: &TranslationConfig) -> Self {
        Self {
            llm,
            policy: ExclusionPolicy::new().with_extra_keys(&config.excluded_keys),
            source_language: config.source_language.clone(),
            supported: config.supported.clone(),
        }
    }

    /// Replace the exclusion policy.
    pub fn with_policy(mut self, policy: ExclusionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Language documents are authored in.
    pub fn source_language(&self) -> &str {
        &self.source_language
    }

    /// Target languages accepted by [`translate_document`](Self::translate_document).
    pub fn supported_languages(&self) -> &[String] {
        &self.supported
    }

    /// Whether `lang` is an accepted target (case-insensitive).
    pub fn is_supported(&self, lang: &str) -> bool {
        self.supported.iter().any(|s| s.eq_ignore_ascii_case(lang.trim()))
    }

    /// Whether `lang` is the source language, meaning nothing needs doing.
    pub fn is_identity(&self, lang: &str) -> bool {
        self.source_language.eq_ignore_ascii_case(lang.trim())
    }

    /// The strings that would be sent for `doc`, deduplicated and sorted.
    pub fn translatable_units(&self, doc: &Value) -> Vec<String> {
        tree::collect_units(doc, &self.policy).into_iter().collect()
    }

    /// Translate every translatable leaf of `doc` into `target_lang`.
    ///
    /// Returns a copy of `doc` without calling the model when the target is
    /// the source language or when the document holds nothing translatable.
    pub async fn translate_document(
        &self,
        ctx: &CallContext,
        doc: &Value,
        target_lang: &str,
    ) -> Result<Value> {
        let target = target_lang.trim();
        if !self.is_supported(target) {
            return Err(AiError::UnsupportedLanguage(target_lang.to_string()));
        }
        if self.is_identity(target) {
            return Ok(doc.clone());
        }

        let units = self.translatable_units(doc);
        if units.is_empty() {
            debug!(target = %target, "No translatable strings, skipping model call");
            return Ok(doc.clone());
        }

        let separator = choose_separator(&units);
        let joined = units.join(&format!("\n{}\n", separator));
        let prompt = translation_prompt(&self.source_language, target, &separator, &joined);

        let reply = self.llm.generate_completion(ctx, &prompt).await?;
        let segments = split_segments(&reply, &separator);

        if segments.len() != units.len() {
            warn!(
                target = %target,
                expected = units.len(),
                actual = segments.len(),
                "Translation reply has the wrong number of segments"
            );
            return Err(AiError::TranslationMismatch {
                expected: units.len(),
                actual: segments.len(),
            });
        }

        let translated: Vec<String> = units
            .iter()
            .zip(&segments)
            .map(|(original, segment)| restore_padding(original, segment))
            .collect();
        let map: HashMap<&str, &str> = units
            .iter()
            .map(String::as_str)
            .zip(translated.iter().map(String::as_str))
            .collect();

        info!(target = %target, segments = units.len(), "Document translated");
        Ok(tree::apply_translations(doc, &self.policy, &map))
    }
}

impl std::fmt::Debug for StructuredTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructuredTranslator")
            .field("source_language", &self.source_language)
            .field("supported", &self.supported)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Segment Protocol
// ─────────────────────────────────────────────────────────────────────────────

/// The default separator, or a one-off marker if some unit already contains it.
fn choose_separator(units: &[String]) -> String {
    if units.iter().any(|u| u.contains(DEFAULT_SEPARATOR)) {
        format!("[[[SEG-{}]]]", Uuid::new_v4().simple())
    } else {
        DEFAULT_SEPARATOR.to_string()
    }
}

/// Split a reply into trimmed segments.
///
/// A reply wrapped in a Markdown code fence is unwrapped first. A trailing
/// separator produces an empty final segment and therefore a count mismatch.
fn split_segments(reply: &str, separator: &str) -> Vec<String> {
    let body = strip_code_fence(reply.trim());
    body.split(separator).map(|s| s.trim().to_string()).collect()
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(rest) = rest.strip_suffix("```") else {
        return text;
    };
    // Drop the info string line, e.g. ```text
    match rest.split_once('\n') {
        Some((_, body)) => body.trim(),
        None => rest.trim(),
    }
}

/// Carry the original's leading and trailing whitespace onto the translation.
fn restore_padding(original: &str, translated: &str) -> String {
    let leading = &original[..original.len() - original.trim_start().len()];
    let trailing = &original[original.trim_end().len()..];
    format!("{}{}{}", leading, translated, trailing)
}
