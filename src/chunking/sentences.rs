use unicode_segmentation::UnicodeSegmentation;

/// Abbreviations whose trailing period does not end a sentence
const ABBREVIATIONS: &[&str] = &[
    "mr.", "mrs.", "ms.", "dr.", "prof.", "sr.", "jr.", "st.", "vs.", "etc.", "e.g.", "i.e.",
    "u.s.", "u.k.", "inc.", "corp.", "co.", "ltd.", "no.", "fig.", "jan.", "feb.", "apr.", "jun.",
    "jul.", "aug.", "sept.", "oct.", "nov.",
];

/// Split text into trimmed sentences.
///
/// Boundaries follow the Unicode sentence segmentation rules, then a boundary
/// directly after a known abbreviation ("U.S.", "Mr.") is undone by joining the
/// two pieces with a single space.
#[inline]
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut pending = String::new();

    for raw in text.unicode_sentences() {
        let sentence = raw.trim();
        if sentence.is_empty() {
            continue;
        }

        if !pending.is_empty() {
            pending.push(' ');
        }
        pending.push_str(sentence);

        if !ends_with_abbreviation(&pending) {
            sentences.push(std::mem::take(&mut pending));
        }
    }

    if !pending.is_empty() {
        sentences.push(pending);
    }

    sentences
}

fn ends_with_abbreviation(sentence: &str) -> bool {
    sentence
        .split_whitespace()
        .last()
        .is_some_and(|word| ABBREVIATIONS.contains(&word.to_lowercase().as_str()))
}
