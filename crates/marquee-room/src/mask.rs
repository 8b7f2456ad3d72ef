//! Title masking: turns a secret title into what guessers get to see.
//!
//! Vowels and spaces are always visible, every other character becomes
//! [`PLACEHOLDER`] until its lowercase form has been revealed. Output
//! characters are joined with a single space, so `"ET"` masks to `"E _"`
//! and a space in the title shows up as a wider gap.

use std::collections::BTreeSet;

/// Stands in for a hidden character.
pub const PLACEHOLDER: char = '_';

const SEPARATOR: &str = " ";
const VOWELS: &str = "AEIOUaeiou";

/// Lowercases a single character, keeping it a single `char`.
///
/// Characters whose lowercase form expands to several code points are
/// left untouched.
pub fn fold(c: char) -> char {
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(l), None) => l,
        _ => c,
    }
}

fn always_visible(c: char) -> bool {
    c == ' ' || VOWELS.contains(c)
}

fn is_visible(c: char, revealed: &BTreeSet<char>) -> bool {
    always_visible(c) || revealed.contains(&fold(c))
}

/// Masks `title` with nothing revealed beyond vowels and spaces.
pub fn mask(title: &str) -> String {
    mask_with_reveals(title, &BTreeSet::new())
}

/// Masks `title`, additionally showing characters in `revealed`.
///
/// `revealed` holds lowercase letters; matching is case-insensitive and
/// the title's original case is preserved in the output.
pub fn mask_with_reveals(title: &str, revealed: &BTreeSet<char>) -> String {
    title
        .chars()
        .map(|c| if is_visible(c, revealed) { c } else { PLACEHOLDER })
        .map(String::from)
        .collect::<Vec<_>>()
        .join(SEPARATOR)
}

/// Whether every character of `title` is visible given `revealed`.
///
/// Checked per character rather than by scanning the masked string, so
/// a title that itself contains `_` can still be completed.
pub fn is_fully_revealed(title: &str, revealed: &BTreeSet<char>) -> bool {
    title.chars().all(|c| is_visible(c, revealed))
}
