//! Text similarity measures shared by header mapping and block de-duplication.
//!
//! All scores are in `[0.0, 1.0]`, higher meaning more alike.

use std::collections::BTreeSet;

/// Split text into lowercase alphanumeric tokens.
///
/// Breaks on any non-alphanumeric character and on lower→upper camel-case
/// transitions, so `studentName`, `student_name` and `Student Name` all
/// yield `["student", "name"]`.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in text.chars() {
        if c.is_alphanumeric() {
            if c.is_uppercase() && prev_lower && !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
            current.extend(c.to_lowercase());
        } else {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            prev_lower = false;
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Tokens joined without separators: `"Student Name"` → `"studentname"`.
pub fn squash(text: &str) -> String {
    tokenize(text).concat()
}

/// Lowercase, punctuation-free, single-spaced form of `text`.
pub fn normalize_sentence(text: &str) -> String {
    tokenize(text).join(" ")
}

/// Classic edit distance over chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// `1 - distance / max_len`.
pub fn levenshtein_ratio(a: &str, b: &str) -> f32 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f32 / max_len as f32
}

/// Jaccard index of two token sets.
pub fn jaccard<'a>(a: impl IntoIterator<Item = &'a str>, b: impl IntoIterator<Item = &'a str>) -> f32 {
    let a: BTreeSet<&str> = a.into_iter().collect();
    let b: BTreeSet<&str> = b.into_iter().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let inter = a.intersection(&b).count();
    let union = a.union(&b).count();
    inter as f32 / union as f32
}

/// Sørensen–Dice coefficient over word bigrams (falls back to unigrams
/// for single-word inputs).
pub fn word_dice(a: &str, b: &str) -> f32 {
    let ta = tokenize(a);
    let tb = tokenize(b);
    let grams = |t: &[String]| -> Vec<String> {
        if t.len() < 2 {
            t.to_vec()
        } else {
            t.windows(2).map(|w| format!("{} {}", w[0], w[1])).collect()
        }
    };
    let ga = grams(&ta);
    let gb = grams(&tb);
    if ga.is_empty() && gb.is_empty() {
        return 1.0;
    }
    if ga.is_empty() || gb.is_empty() {
        return 0.0;
    }

    let mut remaining = gb.clone();
    let mut shared = 0usize;
    for g in &ga {
        if let Some(pos) = remaining.iter().position(|x| x == g) {
            remaining.swap_remove(pos);
            shared += 1;
        }
    }
    (2 * shared) as f32 / (ga.len() + gb.len()) as f32
}

/// Similarity of two prose blocks: exact-after-normalization is 1.0,
/// otherwise the larger of bigram Dice and token Jaccard.
pub fn block_similarity(a: &str, b: &str) -> f32 {
    let na = normalize_sentence(a);
    let nb = normalize_sentence(b);
    if na == nb {
        return 1.0;
    }
    let j = jaccard(na.split(' '), nb.split(' '));
    word_dice(&na, &nb).max(j)
}
