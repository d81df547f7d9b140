use std::collections::HashMap;

/// Irregular plurals that suffix rules cannot recover
const EXCEPTIONS: &[(&str, &str)] = &[
    ("children", "child"),
    ("people", "person"),
    ("men", "man"),
    ("women", "woman"),
    ("mice", "mouse"),
    ("geese", "goose"),
    ("feet", "foot"),
    ("teeth", "tooth"),
    ("wives", "wife"),
    ("knives", "knife"),
    ("lives", "life"),
    ("leaves", "leaf"),
    ("halves", "half"),
    ("shelves", "shelf"),
    ("wolves", "wolf"),
    ("criteria", "criterion"),
    ("phenomena", "phenomenon"),
    ("indices", "index"),
    ("matrices", "matrix"),
    ("series", "series"),
    ("species", "species"),
    ("news", "news"),
];

/// Suffix rewrites tried in order; the first match wins
const SUFFIX_RULES: &[(&str, &str)] = &[
    ("sses", "ss"),
    ("zzes", "zz"),
    ("ches", "ch"),
    ("shes", "sh"),
    ("xes", "x"),
    ("ies", "y"),
];

/// Endings that look plural but are part of the base form
const PROTECTED_ENDINGS: &[&str] = &["ss", "us", "is"];

const MIN_LEMMA_LEN: usize = 3;

/// Rule-based noun lemmatizer.
///
/// Reduces plural nouns to their singular dictionary form. The result is a
/// fixed point: lemmatizing a lemma returns it unchanged.
#[derive(Debug, Clone)]
pub struct Lemmatizer {
    exceptions: HashMap<&'static str, &'static str>,
}

impl Default for Lemmatizer {
    #[inline]
    fn default() -> Self {
        Self {
            exceptions: EXCEPTIONS.iter().copied().collect(),
        }
    }
}

impl Lemmatizer {
    #[inline]
    pub fn lemmatize(&self, token: &str) -> String {
        let mut current = token.to_string();
        loop {
            match self.step(&current) {
                Some(next) if next != current => current = next,
                _ => return current,
            }
        }
    }

    fn step(&self, word: &str) -> Option<String> {
        if let Some(lemma) = self.exceptions.get(word) {
            return Some((*lemma).to_string());
        }

        if word.chars().count() <= MIN_LEMMA_LEN {
            return None;
        }

        for (suffix, replacement) in SUFFIX_RULES {
            if let Some(stem) = word.strip_suffix(suffix) {
                if stem.chars().count() >= 2 {
                    return Some(format!("{stem}{replacement}"));
                }
            }
        }

        if PROTECTED_ENDINGS.iter().any(|ending| word.ends_with(ending)) {
            return None;
        }

        word.strip_suffix('s').map(str::to_string)
    }
}
