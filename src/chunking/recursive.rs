use std::collections::VecDeque;

/// Boundaries tried from coarsest to finest; the empty separator splits characters
const SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

/// Splits text into pieces of at most `chunk_size` characters.
///
/// The coarsest separator present in the text is used first; pieces that are
/// still too long are split again with the next separator. Adjacent small
/// pieces are merged back together and consecutive chunks share up to
/// `chunk_overlap` characters of trailing pieces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveSplitter {
    #[inline]
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    #[inline]
    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, SEPARATORS)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let (separator, finer) = pick_separator(text, separators);

        let pieces: Vec<&str> = if separator.is_empty() {
            text.split_inclusive(|_: char| true).collect()
        } else {
            text.split(separator).filter(|piece| !piece.is_empty()).collect()
        };

        let mut chunks = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();

        for piece in pieces {
            if char_len(piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }

            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting, separator));
                fitting.clear();
            }

            if finer.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_with(piece, finer));
            }
        }

        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting, separator));
        }

        chunks
    }

    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let separator_len = char_len(separator);
        let mut merged = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0;

        for &piece in pieces {
            let piece_len = char_len(piece);
            let joiner = if window.is_empty() { 0 } else { separator_len };

            if total + piece_len + joiner > self.chunk_size && !window.is_empty() {
                push_joined(&mut merged, &window, separator);

                // Drop pieces from the front until only the overlap remains and the next piece fits
                while total > self.chunk_overlap
                    || (total + piece_len + separator_len > self.chunk_size && total > 0)
                {
                    let Some(front) = window.pop_front() else {
                        break;
                    };
                    let removed_joiner = if window.is_empty() { 0 } else { separator_len };
                    total = total.saturating_sub(char_len(front) + removed_joiner);
                }
            }

            window.push_back(piece);
            total += piece_len + if window.len() > 1 { separator_len } else { 0 };
        }

        push_joined(&mut merged, &window, separator);
        merged
    }
}

fn pick_separator<'a>(text: &str, separators: &'a [&'a str]) -> (&'a str, &'a [&'a str]) {
    for (i, &separator) in separators.iter().enumerate() {
        if separator.is_empty() || text.contains(separator) {
            return (separator, separators.get(i + 1..).unwrap_or_default());
        }
    }
    ("", &[])
}

fn push_joined(merged: &mut Vec<String>, window: &VecDeque<&str>, separator: &str) {
    let joined = window.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        merged.push(trimmed.to_string());
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
