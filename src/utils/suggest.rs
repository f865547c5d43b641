//! "Did you mean" suggestions for unknown names.

/// Up to three candidates resembling `target`, best first.
///
/// Prefix matches rank ahead of suffix matches, which rank ahead of
/// candidates within edit distance 3.
pub fn similar<S: AsRef<str>>(target: &str, candidates: &[S]) -> Vec<String> {
    let target_lower = target.to_lowercase();
    let mut matches: Vec<(String, usize)> = Vec::new();

    for candidate in candidates {
        let candidate = candidate.as_ref();
        let lower = candidate.to_lowercase();

        if lower.starts_with(&target_lower) && lower != target_lower {
            matches.push((candidate.to_string(), 0));
            continue;
        }

        if lower.ends_with(&target_lower) && lower != target_lower {
            matches.push((candidate.to_string(), 1));
            continue;
        }

        let dist = levenshtein(&target_lower, &lower);
        if dist <= 3 && dist > 0 {
            matches.push((candidate.to_string(), dist + 10));
        }
    }

    matches.sort_by_key(|(_, priority)| *priority);
    matches.into_iter().take(3).map(|(name, _)| name).collect()
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    let mut prev_row: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr_row: Vec<usize> = vec![0; b_chars.len() + 1];

    for (i, a_char) in a_chars.iter().enumerate() {
        curr_row[0] = i + 1;
        for (j, b_char) in b_chars.iter().enumerate() {
            let cost = if a_char == b_char { 0 } else { 1 };
            curr_row[j + 1] = (prev_row[j + 1] + 1)
                .min(curr_row[j] + 1)
                .min(prev_row[j] + cost);
        }
        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    prev_row[b_chars.len()]
}
