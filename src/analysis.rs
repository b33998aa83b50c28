//! Text analysis collaborators.
//!
//! Tokenization and normalization are external to the index core: the index
//! only ever sees already-normalized terms. This module defines the
//! interface the ingestion pipeline consumes plus one deliberately minimal
//! implementation.

/// Turns raw text into an ordered sequence of normalized terms.
///
/// Implementations must be deterministic and pure: the same input always
/// produces the same token sequence, with no side effects.
pub trait Tokenizer: Send + Sync {
    /// Tokenize a slice of text.
    fn tokenize(&self, text: &str) -> Vec<String>;
}

/// Lowercases and splits on non-alphanumeric characters.
///
/// Runs of alphanumeric characters become tokens; everything else is a
/// separator. "La casa-roja 3" tokenizes to `["la", "casa", "roja", "3"]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleTokenizer;

impl SimpleTokenizer {
    /// Create a new simple tokenizer.
    pub fn new() -> Self {
        SimpleTokenizer
    }
}

impl Tokenizer for SimpleTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        let mut current = String::new();

        for ch in text.chars() {
            if ch.is_alphanumeric() {
                for lower in ch.to_lowercase() {
                    current.push(lower);
                }
            } else if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            tokens.push(current);
        }

        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercase_and_split() {
        let tokenizer = SimpleTokenizer::new();
        assert_eq!(
            tokenizer.tokenize("La Casa Roja"),
            vec!["la", "casa", "roja"]
        );
    }

    #[test]
    fn test_punctuation_is_separator() {
        let tokenizer = SimpleTokenizer::new();
        assert_eq!(
            tokenizer.tokenize("el perro, de-la casa."),
            vec!["el", "perro", "de", "la", "casa"]
        );
    }

    #[test]
    fn test_empty_and_whitespace() {
        let tokenizer = SimpleTokenizer::new();
        assert!(tokenizer.tokenize("").is_empty());
        assert!(tokenizer.tokenize("  \t\n ").is_empty());
    }

    #[test]
    fn test_unicode() {
        let tokenizer = SimpleTokenizer::new();
        assert_eq!(tokenizer.tokenize("Índice ÑANDÚ"), vec!["índice", "ñandú"]);
    }
}
