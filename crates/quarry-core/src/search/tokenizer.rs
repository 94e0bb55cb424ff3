//! Tokenizer shared by indexing and querying.
//!
//! Lowercases, then splits on runs of non-word characters. A word character
//! is any Unicode alphanumeric or `_`. No stemming, no stop words: the only
//! hard requirement is that documents and queries go through the same function.

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Splits `text` into lowercase word tokens. Empty tokens are never produced.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !is_word_char(c))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}
