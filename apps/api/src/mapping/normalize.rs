/// Filler words ignored when comparing labels token by token.
const STOPWORDS: &[&str] = &[
    "a", "an", "the", "of", "to", "in", "for", "on", "and", "or", "your", "you", "do", "does",
    "are", "is", "what", "how", "many", "much", "please", "enter", "provide", "have", "i", "am",
    "me", "my", "with", "this", "role", "position", "if", "any",
];

/// Lowercases, replaces punctuation with spaces and collapses whitespace.
pub fn normalize_label(label: &str) -> String {
    let folded: String = label
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'á' | 'à' | 'â' | 'ä' => 'a',
            c if c.is_alphanumeric() => c,
            _ => ' ',
        })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Tokens of an already-normalized string with stopwords removed.
/// Falls back to all tokens when the label is made only of stopwords.
pub fn content_tokens(normalized: &str) -> Vec<&str> {
    let tokens: Vec<&str> = normalized
        .split(' ')
        .filter(|t| !t.is_empty() && !STOPWORDS.contains(t))
        .collect();
    if tokens.is_empty() {
        normalized.split(' ').filter(|t| !t.is_empty()).collect()
    } else {
        tokens
    }
}
