/// Shortens `text` to at most `max_chars` characters.
///
/// Cuts after the last complete sentence that fits. Without one, cuts at the last
/// word boundary. A single word longer than the budget is the only case cut mid-word.
pub fn truncate_at_sentence(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let prefix_end = text
        .char_indices()
        .nth(max_chars)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len());
    let prefix = &text[..prefix_end];

    let sentence_end = prefix
        .char_indices()
        .filter(|(_, c)| matches!(c, '.' | '!' | '?'))
        .filter(|(idx, c)| {
            text[idx + c.len_utf8()..]
                .chars()
                .next()
                .map_or(true, char::is_whitespace)
        })
        .map(|(idx, c)| idx + c.len_utf8())
        .last();
    if let Some(end) = sentence_end {
        return text[..end].trim_end().to_string();
    }

    let ends_on_boundary = text[prefix_end..]
        .chars()
        .next()
        .map_or(true, char::is_whitespace);
    if ends_on_boundary {
        return prefix.trim_end().to_string();
    }

    match prefix.rfind(char::is_whitespace) {
        Some(ws) => prefix[..ws].trim_end().to_string(),
        None => prefix.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_untouched() {
        assert_eq!(truncate_at_sentence("  Hello there.  ", 100), "Hello there.");
    }

    #[test]
    fn test_cuts_at_sentence_boundary() {
        let text = "First sentence. Second sentence is long.";
        assert_eq!(truncate_at_sentence(text, 20), "First sentence.");
    }

    #[test]
    fn test_decimal_point_is_not_a_sentence_end() {
        let text = "I shipped version 2.5 of the service. Then I led the migration.";
        assert_eq!(
            truncate_at_sentence(text, 45),
            "I shipped version 2.5 of the service."
        );
    }

    #[test]
    fn test_falls_back_to_word_boundary() {
        assert_eq!(truncate_at_sentence("alpha beta gamma", 12), "alpha beta");
        assert_eq!(truncate_at_sentence("alpha beta gamma", 10), "alpha beta");
    }

    #[test]
    fn test_never_exceeds_budget() {
        let text = "word ".repeat(2000);
        let cut = truncate_at_sentence(&text, 4000);
        assert!(cut.chars().count() <= 4000);
        assert!(cut.ends_with("word"));
    }

    #[test]
    fn test_multibyte_characters() {
        let text = "Café résumé naïve. Über lange Sätze schreiben.";
        assert_eq!(truncate_at_sentence(text, 25), "Café résumé naïve.");
    }
}
