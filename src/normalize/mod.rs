//! Cleanup of raw extracted text before it is chunked or embedded.
//!
//! PDF and HTML extraction leaves behind tab runs, long whitespace gaps where
//! layout columns used to be, and bytes decoded with the wrong code page. The
//! normalizer maps the known artifacts back to ASCII and drops everything else
//! that is not printable.

#[cfg(test)]
mod tests;

use fancy_regex::Regex;
use std::sync::LazyLock;

/// Marker substituted for a run of five or more whitespace characters
pub const PARAGRAPH_BREAK: &str = " \n";

static TAB_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\t+").expect("valid regex"));

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{5,}").expect("valid regex"));

/// Mis-decoded sequences and typographic characters with their ASCII intent
const SUBSTITUTIONS: &[(&str, &str)] = &[
    ("ÆŸ", "t"),
    ("â€™", "'"),
    ("â€˜", "'"),
    ("â€œ", "\""),
    ("â€\u{9d}", "\""),
    ("â€“", "-"),
    ("â€”", "-"),
    ("â€¢", "-"),
    ("\u{fb01}", "fi"),
    ("\u{fb02}", "fl"),
    ("\u{2018}", "'"),
    ("\u{2019}", "'"),
    ("\u{201c}", "\""),
    ("\u{201d}", "\""),
    ("\u{2013}", "-"),
    ("\u{2014}", "-"),
    ("\u{a0}", " "),
];

/// Clean raw text for downstream chunking and embedding.
///
/// Trims the input, repairs known encoding artifacts, folds tab runs into a
/// single space, replaces whitespace runs of five or more characters with
/// [`PARAGRAPH_BREAK`] and finally keeps only printable ASCII (0x20 to 0x7E).
///
/// Line feeds are the one exception to the ASCII filter. [`PARAGRAPH_BREAK`]
/// ends in a line feed, and the sentence, section and recursive chunkers split
/// on line boundaries, so dropping them would merge paragraphs. Carriage
/// returns and every other control character are removed.
#[inline]
pub fn clean_text(text: &str) -> String {
    let mut cleaned = text.trim().to_string();

    for (artifact, replacement) in SUBSTITUTIONS {
        if cleaned.contains(artifact) {
            cleaned = cleaned.replace(artifact, replacement);
        }
    }

    let cleaned = replace_runs(&TAB_RUN, &cleaned, " ");
    let mut cleaned = replace_runs(&WHITESPACE_RUN, &cleaned, PARAGRAPH_BREAK);
    cleaned.retain(|c| c == '\n' || (' '..='~').contains(&c));
    cleaned
}

fn replace_runs(pattern: &Regex, text: &str, replacement: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for found in pattern.find_iter(text).flatten() {
        out.push_str(text.get(last..found.start()).unwrap_or_default());
        out.push_str(replacement);
        last = found.end();
    }

    out.push_str(text.get(last..).unwrap_or_default());
    out
}
