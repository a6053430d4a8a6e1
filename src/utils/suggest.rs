/// Edit distance over lowercase alphanumerics, so `read-block`,
/// `readBlock` and `read_block` all compare equal.
fn normalize(value: &str) -> Vec<char> {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn edit_distance(a: &[char], b: &[char]) -> usize {
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut curr = Vec::with_capacity(b.len() + 1);
        curr.push(i + 1);
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr.push(substitution.min(prev[j + 1] + 1).min(curr[j] + 1));
        }
        prev = curr;
    }
    prev[b.len()]
}

fn tolerance(len: usize) -> usize {
    match len {
        0 => 0,
        1..=4 => 1,
        5..=8 => 2,
        _ => 3,
    }
}

/// Closest `candidates` to `input`, best first, at most `limit` of them.
pub fn suggest(input: &str, candidates: &[&str], limit: usize) -> Vec<String> {
    let wanted = normalize(input);
    if wanted.is_empty() {
        return Vec::new();
    }
    let allowed = tolerance(wanted.len());
    let mut scored: Vec<(usize, &str)> = candidates
        .iter()
        .filter_map(|candidate| {
            let norm = normalize(candidate);
            let contains = norm.len() >= 3
                && wanted.len() >= 3
                && (norm.windows(wanted.len()).any(|w| w == wanted.as_slice())
                    || wanted.windows(norm.len()).any(|w| w == norm.as_slice()));
            let score = if norm == wanted {
                0
            } else if contains {
                1
            } else {
                edit_distance(&wanted, &norm)
            };
            (score <= allowed).then_some((score, *candidate))
        })
        .collect();
    scored.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then_with(|| a.1.len().cmp(&b.1.len()))
            .then_with(|| a.1.cmp(b.1))
    });
    scored.dedup_by(|a, b| a.1 == b.1);
    scored
        .into_iter()
        .take(limit.max(1))
        .map(|(_, name)| name.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const METHODS: &[&str] = &["read", "read_block", "write", "wait_eof", "send_eof", "exec"];

    #[test]
    fn finds_typos() {
        assert_eq!(suggest("exc", METHODS, 3), vec!["exec"]);
        assert_eq!(suggest("readBlock", METHODS, 3)[0], "read_block");
    }

    #[test]
    fn substring_matches_rank_high() {
        let out = suggest("eof", METHODS, 5);
        assert!(out.contains(&"wait_eof".to_string()));
        assert!(out.contains(&"send_eof".to_string()));
    }

    #[test]
    fn nothing_for_garbage() {
        assert!(suggest("zzzzzzzzzz", METHODS, 3).is_empty());
        assert!(suggest("", METHODS, 3).is_empty());
    }
}
