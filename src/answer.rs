//! Single-turn answer orchestration.
//!
//! The language model is an external collaborator: callers pass the
//! generation step in as an async closure that owns its own system prompt
//! and retrieval context. This module wires the cache around that boundary
//! for single-turn questions. Multi-turn conversations must not come
//! through here — cache keys carry no conversation state.

use std::future::Future;

use anyhow::{bail, Result};

use crate::cache::ResponseCache;

/// Answer language, detected from the question text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Italian,
    English,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::Italian => "it",
            Language::English => "en",
        }
    }

    /// Instruction appended to the system prompt by the caller.
    pub fn instruction(&self) -> &'static str {
        match self {
            Language::Italian => "Rispondi in italiano.",
            Language::English => "Respond in English.",
        }
    }
}

/// Italian lexical signals. Any hit (or an accented vowel) classifies the
/// question as Italian; everything else defaults to English.
const ITALIAN_WORDS: &[&str] = &[
    "ciao",
    "buongiorno",
    "grazie",
    "come",
    "dove",
    "perche",
    "quale",
    "impostare",
    "configurare",
    "il",
    "lo",
    "la",
    "gli",
    "della",
    "delle",
    "degli",
    "nel",
    "nella",
    "dopo",
];

pub fn detect_language(input: &str) -> Language {
    let normalized = input.to_lowercase();
    if normalized
        .chars()
        .any(|c| matches!(c, 'à' | 'è' | 'é' | 'ì' | 'ò' | 'ù'))
    {
        return Language::Italian;
    }
    let has_signal = normalized.split_whitespace().any(|word| {
        let word = word.trim_matches(|c: char| !c.is_alphanumeric());
        ITALIAN_WORDS.contains(&word)
    });
    if has_signal {
        Language::Italian
    } else {
        Language::English
    }
}

#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub language: Language,
    pub from_cache: bool,
}

/// Answer a single-turn question, consulting the response cache before the
/// generation boundary and recording (best-effort, non-blocking) after it.
///
/// `generate` receives the detected language and produces the answer text;
/// its failure propagates. The cache never does: a cache-store failure
/// degrades to generating fresh.
pub async fn answer_single_turn<G, Fut>(
    question: &str,
    cache: &ResponseCache,
    max_question_chars: usize,
    generate: G,
) -> Result<Answer>
where
    G: FnOnce(Language) -> Fut,
    Fut: Future<Output = Result<String>>,
{
    let length = question.chars().count();
    if length > max_question_chars {
        bail!(
            "question too long: {} characters (maximum {})",
            length,
            max_question_chars
        );
    }

    let language = detect_language(question);

    if let Some(entry) = cache.lookup(question).await {
        return Ok(Answer {
            text: entry.answer,
            language,
            from_cache: true,
        });
    }

    let text = generate(language).await?;

    // Record without holding up the response.
    let cache = cache.clone();
    let question = question.to_string();
    let answer_text = text.clone();
    tokio::spawn(async move {
        cache.record(&question, &answer_text, language.code()).await;
    });

    Ok(Answer {
        text,
        language,
        from_cache: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_italian_by_word() {
        assert_eq!(detect_language("Come posso configurare?"), Language::Italian);
        assert_eq!(detect_language("dove trovo la tariffa"), Language::Italian);
    }

    #[test]
    fn detects_italian_by_accent() {
        assert_eq!(detect_language("disponibilità camere"), Language::Italian);
    }

    #[test]
    fn defaults_to_english() {
        assert_eq!(detect_language("How do I set up rates?"), Language::English);
        assert_eq!(detect_language(""), Language::English);
    }

    #[test]
    fn word_boundaries_respected() {
        // "il" inside "illustrate" is not an Italian signal.
        assert_eq!(detect_language("illustrate the flow"), Language::English);
    }
}
