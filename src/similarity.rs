//! Ratcliff/Obershelp string similarity, as used for fuzzy codebook lookups.

/// `2 * M / T`, where `M` counts characters in matching blocks and `T` is the
/// combined length. Two empty strings are identical.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a = a.chars().collect::<Vec<_>>();
    let b = b.chars().collect::<Vec<_>>();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    let matched = matching_characters(&a, &b, 0, a.len(), 0, b.len());
    2.0 * matched as f64 / total as f64
}

/// Best match for `word` among `candidates` scoring at least `cutoff`.
///
/// Equal scores prefer the greater candidate string.
pub fn closest_match<'a, I>(word: &str, candidates: I, cutoff: f64) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(f64, &'a str)> = None;
    for candidate in candidates {
        // The ratio is not symmetric; candidates are scored as the first sequence.
        let score = similarity_ratio(candidate, word);
        if score < cutoff {
            continue;
        }
        let better = match best {
            None => true,
            Some((best_score, best_candidate)) => {
                score > best_score || (score == best_score && candidate > best_candidate)
            }
        };
        if better {
            best = Some((score, candidate));
        }
    }
    best.map(|(_, candidate)| candidate)
}

fn matching_characters(
    a: &[char],
    b: &[char],
    a_lo: usize,
    a_hi: usize,
    b_lo: usize,
    b_hi: usize,
) -> usize {
    let (i, j, size) = longest_match(a, b, a_lo, a_hi, b_lo, b_hi);
    if size == 0 {
        return 0;
    }

    size + matching_characters(a, b, a_lo, i, b_lo, j)
        + matching_characters(a, b, i + size, a_hi, j + size, b_hi)
}

/// Longest common block in `a[a_lo..a_hi]` and `b[b_lo..b_hi]`; the earliest
/// block in `a`, then in `b`, wins ties.
fn longest_match(
    a: &[char],
    b: &[char],
    a_lo: usize,
    a_hi: usize,
    b_lo: usize,
    b_hi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_size) = (a_lo, b_lo, 0);
    let width = b_hi - b_lo;
    let mut previous = vec![0_usize; width + 1];

    for i in a_lo..a_hi {
        let mut current = vec![0_usize; width + 1];
        for j in b_lo..b_hi {
            if a[i] != b[j] {
                continue;
            }
            let offset = j - b_lo;
            let size = previous[offset] + 1;
            current[offset + 1] = size;
            if size > best_size {
                best_i = i + 1 - size;
                best_j = j + 1 - size;
                best_size = size;
            }
        }
        previous = current;
    }

    (best_i, best_j, best_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_matches_known_values() {
        assert_eq!(similarity_ratio("abcd", "abcd"), 1.0);
        assert_eq!(similarity_ratio("", ""), 1.0);
        assert_eq!(similarity_ratio("abc", "xyz"), 0.0);
        // "per50" vs "per501": five shared characters out of eleven.
        assert!((similarity_ratio("per50", "per501") - 10.0 / 11.0).abs() < 1e-12);
        // Only the block "bcd" is shared.
        assert!((similarity_ratio("abcd", "bcde") - 0.75).abs() < 1e-12);
    }

    #[test]
    fn closest_match_respects_cutoff() {
        let codes = ["per101", "per501", "per502"];
        assert_eq!(closest_match("per5", codes, 0.6), Some("per502"));
        assert_eq!(closest_match("per", codes, 0.6), Some("per502"));
        assert_eq!(closest_match("xyz", codes, 0.6), None);
        assert_eq!(closest_match("per101", codes, 0.6), Some("per101"));
    }

    #[test]
    fn ratio_depends_on_argument_order_with_repeated_characters() {
        assert!((similarity_ratio("per414", "per124") - 4.0 / 6.0).abs() < 1e-12);
        assert!((similarity_ratio("per124", "per414") - 5.0 / 6.0).abs() < 1e-12);
        assert_eq!(
            closest_match("per124", ["per412", "per414"], 0.6),
            Some("per412")
        );
    }
}
