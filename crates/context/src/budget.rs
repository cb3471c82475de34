//! Length budget enforcement over ordered blocks.

use outreach_core::context::LengthBudget;
use outreach_core::note::NoteClass;

#[derive(Debug, Clone)]
pub struct Block {
    pub class: NoteClass,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    Kept,
    /// Removed whole to fit the budget.
    Dropped,
    /// Cut at a sentence boundary.
    Truncated,
}

#[derive(Debug, Clone)]
pub struct Fitted {
    pub text: String,
    /// One outcome per input block, same order.
    pub outcomes: Vec<BlockOutcome>,
    pub truncated: bool,
}

/// Join `blocks` (already in priority order) and bring the result within `budget`.
///
/// Secondary blocks are dropped from the end (lowest priority first). Primary
/// blocks are never dropped; if they alone exceed the budget the text is cut
/// at the last sentence boundary that fits.
pub fn fit(blocks: &[Block], separator: &str, budget: LengthBudget) -> Fitted {
    let mut outcomes = vec![BlockOutcome::Kept; blocks.len()];
    let join = |outcomes: &[BlockOutcome]| -> String {
        blocks
            .iter()
            .zip(outcomes)
            .filter(|(_, o)| **o == BlockOutcome::Kept)
            .map(|(b, _)| b.text.as_str())
            .collect::<Vec<_>>()
            .join(separator)
    };

    let mut text = join(&outcomes);
    if budget.fits(&text) {
        return Fitted {
            text,
            outcomes,
            truncated: false,
        };
    }

    for i in (0..blocks.len()).rev() {
        if blocks[i].class != NoteClass::Secondary {
            continue;
        }
        outcomes[i] = BlockOutcome::Dropped;
        text = join(&outcomes);
        if budget.fits(&text) {
            return Fitted {
                text,
                outcomes,
                truncated: false,
            };
        }
    }

    // Only primary blocks remain and they are still too long.
    let cut = cut_point(&text, budget);
    let mut start = 0;
    for (block, outcome) in blocks.iter().zip(outcomes.iter_mut()) {
        if *outcome != BlockOutcome::Kept {
            continue;
        }
        let end = start + block.text.len();
        if end > cut {
            *outcome = if start < cut {
                BlockOutcome::Truncated
            } else {
                BlockOutcome::Dropped
            };
        }
        start = end + separator.len();
    }

    Fitted {
        text: text[..cut].trim_end().to_string(),
        outcomes,
        truncated: true,
    }
}

/// Largest byte offset at a sentence boundary whose prefix fits. Falls back
/// to a word boundary, then to a hard cut, when no sentence fits.
fn cut_point(text: &str, budget: LengthBudget) -> usize {
    let fits = |end: usize| budget.fits(text[..end].trim_end());

    if let Some(end) = sentence_ends(text).into_iter().rev().find(|&e| fits(e)) {
        return end;
    }
    if let Some(end) = word_ends(text).into_iter().rev().find(|&e| fits(e)) {
        return end;
    }
    match budget {
        LengthBudget::Chars(n) => text.char_indices().nth(n).map(|(i, _)| i).unwrap_or(text.len()),
        LengthBudget::Words(_) => 0,
    }
}

/// Offsets just past each `.`, `!` or `?` run that is followed by
/// whitespace or the end of the text.
fn sentence_ends(text: &str) -> Vec<usize> {
    let mut ends = Vec::new();
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let mut end = i + c.len_utf8();
        while let Some(&(j, n)) = chars.peek() {
            if matches!(n, '.' | '!' | '?') {
                end = j + n.len_utf8();
                chars.next();
            } else {
                break;
            }
        }
        match chars.peek() {
            None => ends.push(end),
            Some(&(_, n)) if n.is_whitespace() => ends.push(end),
            _ => {}
        }
    }
    ends
}

fn word_ends(text: &str) -> Vec<usize> {
    let mut ends = Vec::new();
    let mut in_word = false;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            if in_word {
                ends.push(i);
            }
            in_word = false;
        } else {
            in_word = true;
        }
    }
    if in_word {
        ends.push(text.len());
    }
    ends
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(class: NoteClass, text: &str) -> Block {
        Block {
            class,
            text: text.into(),
        }
    }

    #[test]
    fn fits_untouched() {
        let blocks = [block(NoteClass::Primary, "One."), block(NoteClass::Secondary, "Two.")];
        let f = fit(&blocks, "\n\n", LengthBudget::Chars(100));
        assert_eq!(f.text, "One.\n\nTwo.");
        assert!(!f.truncated);
        assert_eq!(f.outcomes, vec![BlockOutcome::Kept, BlockOutcome::Kept]);
    }

    #[test]
    fn drops_lowest_secondary_first() {
        let blocks = [
            block(NoteClass::Primary, "Primary fact."),
            block(NoteClass::Secondary, "High secondary."),
            block(NoteClass::Secondary, "Low secondary with many more words."),
        ];
        let f = fit(&blocks, " ", LengthBudget::Words(4));
        assert_eq!(f.text, "Primary fact. High secondary.");
        assert_eq!(
            f.outcomes,
            vec![BlockOutcome::Kept, BlockOutcome::Kept, BlockOutcome::Dropped]
        );
        assert!(!f.truncated);
    }

    #[test]
    fn primary_never_dropped_but_truncated_at_sentence() {
        let blocks = [
            block(NoteClass::Primary, "First sentence here. Second sentence is long."),
            block(NoteClass::Secondary, "Extra."),
        ];
        let f = fit(&blocks, " ", LengthBudget::Words(5));
        assert_eq!(f.text, "First sentence here.");
        assert!(f.truncated);
        assert_eq!(f.outcomes, vec![BlockOutcome::Truncated, BlockOutcome::Dropped]);
    }

    #[test]
    fn later_primary_dropped_by_truncation() {
        let blocks = [
            block(NoteClass::Primary, "Alpha beta."),
            block(NoteClass::Primary, "Gamma delta epsilon."),
        ];
        let f = fit(&blocks, " ", LengthBudget::Words(3));
        assert_eq!(f.text, "Alpha beta.");
        assert!(f.truncated);
        assert_eq!(f.outcomes, vec![BlockOutcome::Kept, BlockOutcome::Dropped]);
    }

    #[test]
    fn no_sentence_fits_cuts_at_word() {
        let blocks = [block(NoteClass::Primary, "one two three four five.")];
        let f = fit(&blocks, " ", LengthBudget::Words(2));
        assert_eq!(f.text, "one two");
        assert!(f.truncated);
    }

    #[test]
    fn sentence_ends_skip_decimals() {
        assert_eq!(sentence_ends("Fee 92.5 now. Done!"), vec![13, 19]);
    }
}
