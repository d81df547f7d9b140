//! Lexical normalization for chunks and queries.
//!
//! The processed form is what gets embedded and what the lexical overlap score
//! compares, so documents and queries must go through the same pipeline:
//! hyphen expansion, lowercasing, tokenization, stopword removal and
//! lemmatization.

#[cfg(test)]
mod tests;

pub mod lemmatizer;
pub mod stopwords;

use fancy_regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

pub use lemmatizer::Lemmatizer;

static HYPHENATED_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+(?:-\w+)+").expect("valid regex"));

static WORD_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+(?:-\w+)*|'\w+|[^\w\s]").expect("valid regex"));

/// Text preprocessor holding the stopword set and lemmatizer for one language
#[derive(Debug, Clone)]
pub struct Preprocessor {
    stopwords: HashSet<&'static str>,
    lemmatizer: Lemmatizer,
}

impl Default for Preprocessor {
    #[inline]
    fn default() -> Self {
        Self::english()
    }
}

impl Preprocessor {
    #[inline]
    pub fn english() -> Self {
        Self {
            stopwords: stopwords::ENGLISH.iter().copied().collect(),
            lemmatizer: Lemmatizer::default(),
        }
    }

    /// Normalize text into a space-joined string of lemmatized content tokens
    #[inline]
    pub fn preprocess(&self, text: &str) -> String {
        self.content_tokens(text).join(" ")
    }

    /// Ordered content tokens of `text`, duplicates included
    #[inline]
    pub fn content_tokens(&self, text: &str) -> Vec<String> {
        let expanded = expand_hyphens(text);

        tokenize(&expanded.to_lowercase())
            .into_iter()
            .filter(|token| is_alphanumeric(token) && !self.is_stopword(token))
            .map(|token| self.lemmatizer.lemmatize(&token))
            // A lemma can collapse onto a stopword; dropping it keeps the output a fixed point
            .filter(|lemma| !self.is_stopword(lemma))
            .collect()
    }

    /// Distinct content tokens, as compared by the lexical overlap score
    #[inline]
    pub fn token_set(&self, text: &str) -> HashSet<String> {
        self.content_tokens(text).into_iter().collect()
    }

    #[inline]
    pub fn is_stopword(&self, token: &str) -> bool {
        self.stopwords.contains(token)
    }
}

/// Replace every hyphenated compound with all of its spelling variants.
///
/// `mid-size` becomes `mid-size midsize mid size mid size`. Each occurrence is
/// rewritten exactly once, so repeated compounds do not compound the expansion.
#[inline]
pub fn expand_hyphens(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for found in HYPHENATED_WORD.find_iter(text).flatten() {
        out.push_str(text.get(last..found.start()).unwrap_or_default());
        out.push_str(&hyphen_variants(found.as_str()).join(" "));
        last = found.end();
    }

    out.push_str(text.get(last..).unwrap_or_default());
    out
}

/// Spelling variants of one hyphenated word: hyphenated, joined, spaced, then each part
#[inline]
pub fn hyphen_variants(word: &str) -> Vec<String> {
    let parts: Vec<&str> = word.split('-').collect();

    let mut variants = Vec::with_capacity(parts.len() + 3);
    variants.push(word.to_string());
    variants.push(parts.concat());
    variants.push(parts.join(" "));
    variants.extend(parts.iter().map(|part| (*part).to_string()));
    variants
}

/// Split text into word and punctuation tokens.
///
/// Hyphenated compounds stay whole, clitics such as `'s` are split off the
/// word they attach to and every other punctuation character is its own token.
#[inline]
pub fn tokenize(text: &str) -> Vec<String> {
    WORD_TOKEN
        .find_iter(text)
        .flatten()
        .map(|token| token.as_str().to_string())
        .collect()
}

fn is_alphanumeric(token: &str) -> bool {
    !token.is_empty() && token.chars().all(char::is_alphanumeric)
}
