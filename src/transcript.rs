//! Spoken-word transcript cleanup.
//!
//! Transcripts arrive noisy: bare greeting lines, stuttered word repeats,
//! and filler tokens that waste chunk budget and pollute retrieval. This
//! runs once, before chunking, and only for transcript sources — markdown
//! goes to the chunker untouched.

/// Lines consisting of one of these words plus trailing punctuation are
/// dropped. English and Italian, matched case-insensitively.
const GREETING_WORDS: &[&str] = &[
    "hello",
    "hi",
    "hey",
    "ciao",
    "buongiorno",
    "buonasera",
    "grazie",
    "thanks",
];

/// Filler tokens stripped wherever they stand alone as a word.
const FILLER_WORDS: &[&str] = &["uh", "um", "ehm", "mmm"];

/// Normalize a raw transcript: collapse per-line whitespace, drop empty and
/// bare-greeting lines, collapse a word repeated 3+ times in a row down to
/// one occurrence, strip filler tokens, and collapse whitespace runs.
pub fn clean_transcript(input: &str) -> String {
    let kept_lines: Vec<String> = input
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .filter(|line| !is_bare_greeting(line))
        .collect();

    let text = kept_lines.join("\n");
    let text = collapse_word_repeats(&text);
    let text = strip_fillers(&text);
    collapse_whitespace_runs(&text)
}

fn is_bare_greeting(line: &str) -> bool {
    let lower = line.to_lowercase();
    GREETING_WORDS.iter().any(|greeting| {
        lower.strip_prefix(greeting).is_some_and(|rest| {
            rest.chars()
                .all(|c| c.is_whitespace() || matches!(c, ',' | '!' | '.' | '-'))
        })
    })
}

/// Split `text` into `(token, trailing_whitespace)` pairs, preserving the
/// separators so single newlines survive the rebuild.
fn split_tokens(text: &str) -> Vec<(&str, &str)> {
    let mut parts = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let token_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let (token, after) = rest.split_at(token_end);
        let ws_end = after
            .find(|c: char| !c.is_whitespace())
            .unwrap_or(after.len());
        let (ws, tail) = after.split_at(ws_end);
        parts.push((token, ws));
        rest = tail;
    }
    parts
}

fn is_word_token(token: &str) -> bool {
    !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A word repeated three or more times consecutively collapses to one.
fn collapse_word_repeats(text: &str) -> String {
    let parts = split_tokens(text);
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < parts.len() {
        let (token, _) = parts[i];
        let mut j = i + 1;
        if is_word_token(token) {
            while j < parts.len() && parts[j].0.eq_ignore_ascii_case(token) {
                j += 1;
            }
        }
        if j - i >= 3 {
            out.push_str(token);
            out.push_str(parts[j - 1].1);
        } else {
            for &(t, ws) in &parts[i..j] {
                out.push_str(t);
                out.push_str(ws);
            }
        }
        i = j;
    }
    out
}

fn strip_fillers(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (token, ws) in split_tokens(text) {
        out.push_str(strip_filler_token(token));
        out.push_str(ws);
    }
    out
}

/// Remove a leading filler word from a token when the remainder is pure
/// punctuation (`"um,"` becomes `","`); anything else passes through.
fn strip_filler_token(token: &str) -> &str {
    let core_len = token
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .count();
    let (core, rest) = token.split_at(core_len);
    let rest_is_punct = rest
        .chars()
        .all(|c| !c.is_ascii_alphanumeric() && c != '_');
    if rest_is_punct && FILLER_WORDS.iter().any(|f| core.eq_ignore_ascii_case(f)) {
        rest
    } else {
        token
    }
}

/// Runs of two or more whitespace characters become a single space; a lone
/// whitespace character (including a newline) is kept as-is.
fn collapse_whitespace_runs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut iter = text.chars().peekable();
    while let Some(c) = iter.next() {
        if c.is_whitespace() && iter.peek().is_some_and(|n| n.is_whitespace()) {
            while iter.peek().is_some_and(|n| n.is_whitespace()) {
                iter.next();
            }
            out.push(' ');
        } else {
            out.push(c);
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_bare_greeting_lines() {
        let input = "Hello!\nBuongiorno,\nToday we cover the booking flow.\nGrazie.";
        let cleaned = clean_transcript(input);
        assert_eq!(cleaned, "Today we cover the booking flow.");
    }

    #[test]
    fn keeps_greeting_followed_by_content() {
        let input = "Hello everyone and welcome to the session.";
        let cleaned = clean_transcript(input);
        assert_eq!(cleaned, input);
    }

    #[test]
    fn collapses_triple_repeats_only() {
        assert_eq!(clean_transcript("the the the booking"), "the booking");
        // Two in a row is not a stutter.
        assert_eq!(clean_transcript("very very good"), "very very good");
    }

    #[test]
    fn repeat_collapse_is_case_insensitive() {
        assert_eq!(clean_transcript("The the THE booking"), "The booking");
    }

    #[test]
    fn strips_filler_words() {
        let input = "so um the rate is uh applied ehm immediately";
        assert_eq!(clean_transcript(input), "so the rate is applied immediately");
    }

    #[test]
    fn filler_inside_word_untouched() {
        assert_eq!(clean_transcript("summer umbrella"), "summer umbrella");
    }

    #[test]
    fn collapses_line_whitespace() {
        let input = "the   booking\tengine\nworks    fine";
        assert_eq!(clean_transcript(input), "the booking engine\nworks fine");
    }

    #[test]
    fn empty_lines_removed() {
        let input = "first line\n\n\nsecond line";
        assert_eq!(clean_transcript(input), "first line\nsecond line");
    }

    #[test]
    fn empty_input() {
        assert_eq!(clean_transcript(""), "");
        assert_eq!(clean_transcript("Hello!\nCiao\n"), "");
    }
}
