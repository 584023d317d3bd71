//! Token-budgeted text chunking.
//!
//! Two strategies share one budget model:
//!
//! - **Recursive** ([`recursive_chunk`]): accumulates paragraphs under a
//!   token budget, carrying the last `overlap_tokens` words of an emitted
//!   chunk into the next one for continuity. Paragraphs that alone exceed
//!   the budget are split on sentence boundaries and accumulated at that
//!   granularity instead.
//! - **Section-aware** ([`section_aware_chunk`]): splits markdown on
//!   level-2/3 headings so a heading and its body stay together. Sections
//!   over the hard ceiling are reduced through the recursive strategy;
//!   small adjacent sections are merged to avoid tiny chunks. Text without
//!   headings falls back to the recursive strategy entirely.
//!
//! Both are deterministic: identical input and budgets always produce
//! identical chunk boundaries. Chunks at or under the noise floor
//! ([`MIN_CHUNK_TOKENS`] estimated tokens) are dropped, not stored.
//!
//! Budgets are expressed in *estimated* tokens ([`estimate_tokens`]), a
//! word-count proxy for real tokenization. Ingestion and retrieval must
//! size against the same estimator so their budgets agree.

use crate::config::ChunkingConfig;

/// Word-to-token expansion factor for the estimator.
const TOKENS_PER_WORD: f64 = 1.33;

/// Chunks with at most this many estimated tokens are discarded as noise.
pub const MIN_CHUNK_TOKENS: usize = 10;

/// Approximate the token count of `text` from its whitespace word count.
pub fn estimate_tokens(text: &str) -> usize {
    let words = text.split_whitespace().count();
    (words as f64 * TOKENS_PER_WORD).ceil() as usize
}

/// Split text into chunks of at most `max_tokens` estimated tokens,
/// carrying `overlap_tokens` words across chunk boundaries.
pub fn recursive_chunk(text: &str, max_tokens: usize, overlap_tokens: usize) -> Vec<String> {
    let cleaned = text.replace('\r', "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Vec::new();
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_tokens = 0usize;

    for paragraph in cleaned.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        let paragraph_tokens = estimate_tokens(paragraph);

        if paragraph_tokens > max_tokens {
            // One paragraph over budget: accumulate at sentence granularity.
            for sentence in split_sentences(paragraph) {
                let sentence_tokens = estimate_tokens(sentence);
                if current_tokens + sentence_tokens > max_tokens && !current.is_empty() {
                    current_tokens =
                        flush_with_overlap(&mut chunks, &mut current, sentence, overlap_tokens);
                } else {
                    current.push(sentence.to_string());
                    current_tokens += sentence_tokens;
                }
            }
            continue;
        }

        if current_tokens + paragraph_tokens > max_tokens && !current.is_empty() {
            current_tokens =
                flush_with_overlap(&mut chunks, &mut current, paragraph, overlap_tokens);
        } else {
            current.push(paragraph.to_string());
            current_tokens += paragraph_tokens;
        }
    }

    if !current.is_empty() {
        chunks.push(current.join("\n\n"));
    }

    chunks.retain(|chunk| estimate_tokens(chunk) > MIN_CHUNK_TOKENS);
    chunks
}

/// Emit the buffer as a chunk and reseed it with the overlap tail plus the
/// piece that did not fit. Returns the new buffer's token count.
fn flush_with_overlap(
    chunks: &mut Vec<String>,
    current: &mut Vec<String>,
    next_piece: &str,
    overlap_tokens: usize,
) -> usize {
    chunks.push(current.join("\n\n"));
    let overlap = tail_words(current, overlap_tokens);
    current.clear();
    if !overlap.is_empty() {
        current.push(overlap);
    }
    current.push(next_piece.to_string());
    estimate_tokens(&current.join(" "))
}

/// The last `overlap_tokens` (at least one) whitespace words of the buffer.
fn tail_words(parts: &[String], overlap_tokens: usize) -> String {
    let joined = parts.join(" ");
    let words: Vec<&str> = joined.split_whitespace().collect();
    let keep = overlap_tokens.max(1).min(words.len());
    words[words.len() - keep..].join(" ")
}

/// Split on sentence-final `.`/`!`/`?` followed by whitespace.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let mut iter = text.char_indices().peekable();

    while let Some((i, c)) = iter.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        if !iter.peek().map_or(false, |&(_, next)| next.is_whitespace()) {
            continue;
        }
        let end = i + c.len_utf8();
        let sentence = text[start..end].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        while iter.peek().map_or(false, |&(_, next)| next.is_whitespace()) {
            iter.next();
        }
        start = iter.peek().map_or(text.len(), |&(j, _)| j);
    }

    if start < text.len() {
        let sentence = text[start..].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
    }

    sentences
}

/// Split markdown by `##`/`###` headings, keeping each heading with its body.
///
/// Sections exceeding `max_section_tokens` are never merged with their
/// neighbors: the running buffer is flushed first and the oversized section
/// is reduced via [`recursive_chunk`], so the heading survives in the first
/// sub-chunk rather than producing one giant chunk.
pub fn section_aware_chunk(text: &str, cfg: &ChunkingConfig) -> Vec<String> {
    let cleaned = text.replace('\r', "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Vec::new();
    }

    let headings = heading_offsets(cleaned);
    if headings.is_empty() {
        return recursive_chunk(cleaned, cfg.chunk_size_tokens, cfg.overlap_tokens);
    }

    let mut sections: Vec<&str> = Vec::new();
    let preamble = cleaned[..headings[0]].trim();
    if !preamble.is_empty() && estimate_tokens(preamble) > MIN_CHUNK_TOKENS {
        sections.push(preamble);
    }
    for (idx, &start) in headings.iter().enumerate() {
        let end = headings.get(idx + 1).copied().unwrap_or(cleaned.len());
        sections.push(cleaned[start..end].trim());
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut buffer = String::new();
    let mut buffer_tokens = 0usize;

    for section in sections {
        let section_tokens = estimate_tokens(section);

        if section_tokens > cfg.max_section_tokens {
            if !buffer.is_empty() {
                chunks.push(buffer.trim().to_string());
                buffer.clear();
                buffer_tokens = 0;
            }
            chunks.extend(recursive_chunk(
                section,
                cfg.chunk_size_tokens,
                cfg.overlap_tokens,
            ));
            continue;
        }

        if buffer_tokens + section_tokens > cfg.chunk_size_tokens && !buffer.is_empty() {
            chunks.push(buffer.trim().to_string());
            buffer.clear();
            buffer_tokens = 0;
        }

        if !buffer.is_empty() {
            buffer.push_str("\n\n");
        }
        buffer.push_str(section);
        buffer_tokens += section_tokens;
    }

    if !buffer.trim().is_empty() {
        chunks.push(buffer.trim().to_string());
    }

    chunks.retain(|chunk| estimate_tokens(chunk) > MIN_CHUNK_TOKENS);
    chunks
}

/// Byte offsets of lines that are level-2/3 markdown headings.
fn heading_offsets(text: &str) -> Vec<usize> {
    let mut offsets = Vec::new();
    let mut pos = 0usize;
    for line in text.split('\n') {
        if is_heading_line(line) {
            offsets.push(pos);
        }
        pos += line.len() + 1;
    }
    offsets
}

fn is_heading_line(line: &str) -> bool {
    let hashes = line.bytes().take_while(|&b| b == b'#').count();
    (2..=3).contains(&hashes)
        && line[hashes..].starts_with([' ', '\t'])
        && !line[hashes..].trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget() -> ChunkingConfig {
        ChunkingConfig::default()
    }

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("word{}", i)).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("   "), 0);
        // 3 words * 1.33 = 3.99 -> 4
        assert_eq!(estimate_tokens("one two three"), 4);
        // 100 words * 1.33 = 133
        assert_eq!(estimate_tokens(&words(100)), 133);
    }

    #[test]
    fn recursive_empty_input() {
        assert!(recursive_chunk("", 800, 50).is_empty());
        assert!(recursive_chunk("\n\n  \n\n", 800, 50).is_empty());
    }

    #[test]
    fn recursive_drops_noise_floor_chunks() {
        // 8 words ~= 11 tokens > floor; 5 words ~= 7 tokens <= floor
        let kept = recursive_chunk(&words(8), 800, 50);
        assert_eq!(kept.len(), 1);
        let dropped = recursive_chunk(&words(5), 800, 50);
        assert!(dropped.is_empty());
    }

    #[test]
    fn recursive_small_text_single_chunk() {
        let text = format!("{}\n\n{}", words(20), words(20));
        let chunks = recursive_chunk(&text, 800, 50);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("word0"));
        assert!(chunks[0].contains("word19"));
    }

    #[test]
    fn recursive_splits_on_budget() {
        // Three paragraphs of 100 words (~133 tokens each), budget 200:
        // first two merge is over budget after the second, so a flush happens.
        let text = format!("{}\n\n{}\n\n{}", words(100), words(100), words(100));
        let chunks = recursive_chunk(&text, 200, 10);
        assert!(chunks.len() >= 2, "expected a split, got {:?}", chunks.len());
    }

    #[test]
    fn recursive_overlap_carries_tail_words() {
        let first = words(100);
        let second = (0..100).map(|i| format!("tail{}", i)).collect::<Vec<_>>().join(" ");
        let text = format!("{}\n\n{}", first, second);
        let chunks = recursive_chunk(&text, 150, 10);
        assert_eq!(chunks.len(), 2);
        // The second chunk starts with the last 10 words of the first.
        assert!(chunks[1].starts_with("word90"));
        assert!(chunks[1].contains("word99"));
        assert!(chunks[1].contains("tail0"));
    }

    #[test]
    fn recursive_oversized_paragraph_splits_on_sentences() {
        // One paragraph, no blank lines, 40 sentences of 10 words each
        // (~533 tokens total) against a 200-token budget.
        let paragraph = (0..40)
            .map(|i| format!("Sentence {} has exactly these many words in it now.", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = recursive_chunk(&paragraph, 200, 10);
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(estimate_tokens(chunk) > MIN_CHUNK_TOKENS);
        }
    }

    #[test]
    fn recursive_preserves_content_order() {
        let paragraphs: Vec<String> = (0..12).map(|i| format!("marker{} {}", i, words(60))).collect();
        let text = paragraphs.join("\n\n");
        let chunks = recursive_chunk(&text, 200, 5);
        let all = chunks.join("\n\n");
        let mut last = 0;
        for i in 0..12 {
            let pos = all.find(&format!("marker{} ", i));
            let pos = pos.unwrap_or_else(|| panic!("marker{} missing", i));
            assert!(pos >= last || i == 0);
            last = pos;
        }
    }

    #[test]
    fn recursive_deterministic() {
        let text = format!("{}\n\n{}\n\n{}", words(300), words(300), words(300));
        let a = recursive_chunk(&text, 250, 25);
        let b = recursive_chunk(&text, 250, 25);
        assert_eq!(a, b);
    }

    #[test]
    fn sentence_split_lookahead() {
        let sentences = split_sentences("One. Two! Three? Four");
        assert_eq!(sentences, vec!["One.", "Two!", "Three?", "Four"]);
        // No split when punctuation is not followed by whitespace.
        let sentences = split_sentences("v1.2 is out. Done");
        assert_eq!(sentences, vec!["v1.2 is out.", "Done"]);
    }

    #[test]
    fn section_aware_no_headings_falls_back() {
        let text = format!("{}\n\n{}", words(40), words(40));
        let chunks = section_aware_chunk(&text, &budget());
        assert_eq!(chunks, recursive_chunk(&text, 800, 50));
    }

    #[test]
    fn section_aware_keeps_heading_with_body() {
        let text = format!(
            "## Setup\n\n{}\n\n## Billing\n\n{}",
            words(450),
            words(450)
        );
        let chunks = section_aware_chunk(&text, &budget());
        // Each section is ~600 tokens: together over the 800 target, so they
        // cannot merge; each chunk opens with its own heading.
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].starts_with("## Setup"));
        assert!(chunks[1].starts_with("## Billing"));
    }

    #[test]
    fn section_aware_merges_small_sections() {
        let text = format!(
            "## First\n\n{}\n\n## Second\n\n{}",
            words(60),
            words(60)
        );
        let chunks = section_aware_chunk(&text, &budget());
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("## First"));
        assert!(chunks[0].contains("## Second"));
    }

    #[test]
    fn section_aware_oversized_section_subchunked() {
        // 14 paragraphs of 100 words: ~1862 tokens, over the 1500 ceiling.
        let huge_body: Vec<String> = (0..14).map(|_| words(100)).collect();
        let text = format!(
            "## Small\n\n{}\n\n## Huge\n\n{}",
            words(60),
            huge_body.join("\n\n")
        );
        let chunks = section_aware_chunk(&text, &budget());
        assert!(chunks.len() >= 3);
        // Buffer flushed before the oversized section.
        assert!(chunks[0].starts_with("## Small"));
        // Heading survives in the first sub-chunk only.
        assert!(chunks[1].starts_with("## Huge"));
        for chunk in &chunks[2..] {
            assert!(!chunk.contains("## Huge"));
        }
    }

    #[test]
    fn section_aware_preamble_below_floor_dropped() {
        let text = format!("tiny intro\n\n## Topic\n\n{}", words(50));
        let chunks = section_aware_chunk(&text, &budget());
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].starts_with("## Topic"));
        assert!(!chunks[0].contains("tiny intro"));
    }

    #[test]
    fn section_aware_preamble_above_floor_kept() {
        let text = format!("{}\n\n## Topic\n\n{}", words(40), words(50));
        let chunks = section_aware_chunk(&text, &budget());
        assert!(chunks[0].starts_with("word0"));
    }

    #[test]
    fn heading_detection_levels() {
        assert!(is_heading_line("## Two"));
        assert!(is_heading_line("### Three"));
        assert!(!is_heading_line("# One"));
        assert!(!is_heading_line("#### Four"));
        assert!(!is_heading_line("##NoSpace"));
        assert!(!is_heading_line("text ## inline"));
    }

    #[test]
    fn section_aware_deterministic() {
        let text = format!("## A\n\n{}\n\n## B\n\n{}", words(500), words(500));
        let a = section_aware_chunk(&text, &budget());
        let b = section_aware_chunk(&text, &budget());
        assert_eq!(a, b);
    }
}
