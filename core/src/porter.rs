//! The original Porter stemmer, in the Snowball `porter` formulation that
//! Sphinx uses for English search indexes.
//!
//! `y` is a vowel except at the start of a word or after a vowel, where it is
//! marked `Y` for the duration of the algorithm. `p1`/`p2` are the starts of
//! the R1/R2 regions and are computed once, on the input word.

fn is_v(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y')
}

/// Start of the region after the first non-vowel that follows a vowel, scanning from `from`.
fn region_start(b: &[char], from: usize) -> usize {
    let mut i = from;
    while i < b.len() && !is_v(b[i]) { i += 1; }
    if i >= b.len() { return b.len(); }
    i += 1;
    while i < b.len() && is_v(b[i]) { i += 1; }
    if i >= b.len() { return b.len(); }
    i + 1
}

fn ends_with(b: &[char], suffix: &str) -> bool {
    let n = suffix.chars().count();
    n <= b.len() && b[b.len() - n..].iter().copied().eq(suffix.chars())
}

/// Longest entry of `suffixes` that `b` ends with.
fn longest<'a>(b: &[char], suffixes: &[&'a str]) -> Option<&'a str> {
    suffixes
        .iter()
        .copied()
        .filter(|s| ends_with(b, s))
        .max_by_key(|s| s.len())
}

fn replace_suffix(b: &mut Vec<char>, old: &str, new: &str) {
    b.truncate(b.len() - old.chars().count());
    b.extend(new.chars());
}

/// Consonant-vowel-consonant ending just before `end`, the last consonant not `w`, `x` or `Y`.
fn short_v(b: &[char], end: usize) -> bool {
    end >= 3
        && !is_v(b[end - 1])
        && !matches!(b[end - 1], 'w' | 'x' | 'Y')
        && is_v(b[end - 2])
        && !is_v(b[end - 3])
}

const STEP2: &[(&str, &str)] = &[
    ("tional", "tion"), ("enci", "ence"), ("anci", "ance"), ("abli", "able"), ("entli", "ent"),
    ("izer", "ize"), ("ization", "ize"), ("ational", "ate"), ("ation", "ate"), ("ator", "ate"),
    ("alli", "al"), ("alism", "al"), ("aliti", "al"), ("ousli", "ous"), ("ousness", "ous"),
    ("iveness", "ive"), ("iviti", "ive"), ("biliti", "ble"), ("eli", "e"), ("fulness", "ful"),
];

const STEP3: &[(&str, &str)] = &[
    ("alize", "al"), ("icate", "ic"), ("iciti", "ic"), ("ical", "ic"), ("ative", ""), ("ful", ""), ("ness", ""),
];

const STEP4: &[&str] = &[
    "al", "ance", "ence", "er", "ic", "able", "ible", "ant", "ement", "ment", "ent", "ou", "ism",
    "ate", "iti", "ous", "ive", "ize", "ion",
];

/// Replace the longest matching suffix from `table` if it starts at or after `region`.
fn map_suffix(b: &mut Vec<char>, table: &[(&str, &str)], region: usize) {
    let found = table
        .iter()
        .filter(|(suffix, _)| ends_with(b, suffix))
        .max_by_key(|(suffix, _)| suffix.len());
    if let Some(&(suffix, repl)) = found {
        if b.len() - suffix.len() >= region {
            replace_suffix(b, suffix, repl);
        }
    }
}

/// Stem one lowercase word.
pub fn stem(word: &str) -> String {
    let mut b: Vec<char> = word.chars().collect();
    let mut y_found = false;
    for i in 0..b.len() {
        if b[i] == 'y' && (i == 0 || is_v(b[i - 1])) {
            b[i] = 'Y';
            y_found = true;
        }
    }
    let p1 = region_start(&b, 0);
    let p2 = region_start(&b, p1);

    // Step 1a
    match longest(&b, &["sses", "ies", "ss", "s"]) {
        Some("sses") => replace_suffix(&mut b, "sses", "ss"),
        Some("ies") => replace_suffix(&mut b, "ies", "i"),
        Some("s") => { b.pop(); }
        _ => {}
    }

    // Step 1b
    match longest(&b, &["eed", "ed", "ing"]) {
        Some("eed") => {
            if b.len() - 3 >= p1 { b.pop(); }
        }
        Some(suffix) => {
            let start = b.len() - suffix.len();
            if b[..start].iter().any(|&c| is_v(c)) {
                b.truncate(start);
                let doubles = ["bb", "dd", "ff", "gg", "mm", "nn", "pp", "rr", "tt"];
                match longest(&b, &["at", "bl", "iz"]) {
                    Some(_) => b.push('e'),
                    None if doubles.iter().any(|d| ends_with(&b, d)) => { b.pop(); }
                    None => {
                        if b.len() == p1 && short_v(&b, b.len()) { b.push('e'); }
                    }
                }
            }
        }
        None => {}
    }

    // Step 1c
    if matches!(b.last().copied(), Some('y' | 'Y')) && b[..b.len() - 1].iter().any(|&c| is_v(c)) {
        let last = b.len() - 1;
        b[last] = 'i';
    }

    map_suffix(&mut b, STEP2, p1);
    map_suffix(&mut b, STEP3, p1);

    // Step 4
    if let Some(suffix) = longest(&b, STEP4) {
        let start = b.len() - suffix.len();
        if start >= p2 && (suffix != "ion" || matches!(start.checked_sub(1).map(|i| b[i]), Some('s' | 't'))) {
            b.truncate(start);
        }
    }

    // Step 5a
    if b.last() == Some(&'e') {
        let pos = b.len() - 1;
        if pos >= p2 || (pos >= p1 && !short_v(&b, pos)) { b.pop(); }
    }

    // Step 5b
    if b.len() >= 2 && b[b.len() - 1] == 'l' && b.len() - 1 >= p2 && b[b.len() - 2] == 'l' {
        b.pop();
    }

    if y_found {
        for c in b.iter_mut() {
            if *c == 'Y' { *c = 'y'; }
        }
    }
    b.into_iter().collect()
}
