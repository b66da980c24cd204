//! The solution vocabulary.

use std::sync::Arc;

use rand::Rng;

/// Length every solution word has.
pub const SOLUTION_LENGTH: usize = 5;

/// Drawn when the list is empty.
pub const FALLBACK_WORD: &str = "APPLE";

/// An immutable, cheaply cloneable list of uppercase solution words.
#[derive(Debug, Clone)]
pub struct WordList {
    words: Arc<[String]>,
}

impl Default for WordList {
    fn default() -> Self {
        Self {
            words: Arc::from(Vec::new()),
        }
    }
}

impl WordList {
    /// Builds a list from raw words.
    ///
    /// Each word is trimmed and uppercased; blanks and words that are not
    /// [`SOLUTION_LENGTH`] letters long are dropped.
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words: Vec<String> = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_uppercase())
            .filter(|w| {
                w.chars().count() == SOLUTION_LENGTH
                    && w.chars().all(char::is_alphabetic)
            })
            .collect();
        Self {
            words: Arc::from(words),
        }
    }

    /// One word per line.
    pub fn parse(text: &str) -> Self {
        Self::new(text.lines())
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn contains(&self, word: &str) -> bool {
        let word = word.trim().to_uppercase();
        self.words.iter().any(|w| *w == word)
    }

    /// Draws a word uniformly at random, or [`FALLBACK_WORD`] when empty.
    pub fn draw(&self) -> String {
        self.draw_with(&mut rand::rng())
    }

    /// Like [`draw`](Self::draw) with a caller-supplied generator.
    pub fn draw_with<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        if self.words.is_empty() {
            return FALLBACK_WORD.to_string();
        }
        self.words[rng.random_range(0..self.words.len())].clone()
    }
}
