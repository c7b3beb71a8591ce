//! Raw-name tokenizers.
//!
//! A [`SyllableParser`] turns a raw member name into its syllable sequence.
//! Parsing is pure and deterministic, and output syllables are always
//! normalized (lower-cased). Empty or whitespace-only input parses to zero
//! syllables, i.e. the root path.

use crate::path::Path;
use crate::syllable::Syllable;

/// Strategy for splitting a raw member name into syllables.
pub trait SyllableParser: Send + Sync {
    /// Split `raw` into normalized syllables.
    fn parse(&self, raw: &str) -> Vec<Syllable>;

    /// Split `raw` and collect the result into a [`Path`].
    fn parse_path(&self, raw: &str) -> Path {
        self.parse(raw).into_iter().collect()
    }
}

/// Splits on uppercase-initiated segments: `DragDropped` → `drag`,
/// `dropped`.
///
/// Acronym runs stay together, with the final capital starting the next
/// segment when it is followed by lowercase: `HTTPServer` → `http`,
/// `server`. Non-alphanumeric characters act as plain separators.
#[derive(Clone, Copy, Debug, Default)]
pub struct CamelCaseParser;

impl SyllableParser for CamelCaseParser {
    fn parse(&self, raw: &str) -> Vec<Syllable> {
        let chars: Vec<char> = raw.chars().collect();
        let mut syllables = Vec::new();
        let mut current = String::new();
        for (ix, &c) in chars.iter().enumerate() {
            if !c.is_alphanumeric() {
                flush(&mut current, &mut syllables);
                continue;
            }
            // `current` is non-empty only when the previous char was part
            // of the same run, so indexing ix - 1 is in bounds here.
            if !current.is_empty() && c.is_uppercase() {
                let prev = chars[ix - 1];
                let acronym_ends = prev.is_uppercase()
                    && chars.get(ix + 1).is_some_and(|n| n.is_lowercase());
                if prev.is_lowercase() || prev.is_numeric() || acronym_ends {
                    flush(&mut current, &mut syllables);
                }
            }
            current.push(c);
        }
        flush(&mut current, &mut syllables);
        syllables
    }
}

/// Splits on runs of underscores: `drag_dropped` → `drag`, `dropped`.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnderscoreParser;

impl SyllableParser for UnderscoreParser {
    fn parse(&self, raw: &str) -> Vec<Syllable> {
        raw.split('_')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(Syllable::new)
            .collect()
    }
}

fn flush(current: &mut String, syllables: &mut Vec<Syllable>) {
    if !current.is_empty() {
        syllables.push(Syllable::new(current));
        current.clear();
    }
}
