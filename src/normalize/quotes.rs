//! Deterministic quote normalization.

/// Replace curly and localized quote characters with straight ASCII quotes.
///
/// The LLM is instructed to do this too, but a post-process guarantees
/// consistent output regardless of model behavior. German-style low quotes
/// („ ‚) and guillemets (« » ‹ ›) are common in the source articles.
pub fn normalize_quotes(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{00AB}' | '\u{00BB}'
            | '\u{FF02}' => '"',
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2039}' | '\u{203A}'
            | '\u{FF07}' => '\'',
            other => other,
        })
        .collect()
}
