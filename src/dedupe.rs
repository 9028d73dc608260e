//! Near-duplicate story removal across sources.
//!
//! Titles are compared with a token-set ratio: both titles are reduced to
//! lower-cased word sets so that word order and repetition do not matter,
//! then the shared and the distinct words are compared with the indel ratio
//! `2 * LCS / (len_a + len_b)` on a 0-100 scale. An item is dropped when its best
//! score against *any* previously kept title reaches the threshold.

use crate::models::{CandidateItem, DedupedItem};
use std::collections::BTreeSet;
use tracing::{debug, info, instrument};

/// Default similarity at or above which two titles are the same story.
pub const DEFAULT_THRESHOLD: u8 = 90;

fn tokens(s: &str) -> BTreeSet<String> {
    s.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Length of the longest common subsequence, in characters.
fn lcs_len(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let m = b_chars.len();

    let mut prev: Vec<usize> = vec![0; m + 1];
    let mut curr: Vec<usize> = vec![0; m + 1];

    for ca in &a_chars {
        for (j, cb) in b_chars.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[m]
}

/// Indel similarity, 0-100: one minus the insert/delete distance over the combined length.
fn ratio(a: &str, b: &str) -> f64 {
    let total = a.chars().count() + b.chars().count();
    if total == 0 {
        return 0.0;
    }
    200.0 * lcs_len(a, b) as f64 / total as f64
}

fn joined<'a>(head: &str, tail: impl Iterator<Item = &'a String>) -> String {
    let tail = tail.map(String::as_str).collect::<Vec<_>>().join(" ");
    match (head.is_empty(), tail.is_empty()) {
        (true, _) => tail,
        (_, true) => head.to_string(),
        _ => format!("{head} {tail}"),
    }
}

/// Order-insensitive word-set similarity between two strings, 0-100.
///
/// If one title's word set contains the other's (and they share at least one
/// word) the score is 100. Titles without words only match themselves.
pub fn token_set_ratio(a: &str, b: &str) -> u8 {
    let ta = tokens(a);
    let tb = tokens(b);
    if ta.is_empty() || tb.is_empty() {
        return if ta.is_empty() && tb.is_empty() && a == b { 100 } else { 0 };
    }

    let intersection = ta.intersection(&tb).map(String::as_str).collect::<Vec<_>>().join(" ");
    let only_a: Vec<&String> = ta.difference(&tb).collect();
    let only_b: Vec<&String> = tb.difference(&ta).collect();

    if !intersection.is_empty() && (only_a.is_empty() || only_b.is_empty()) {
        return 100;
    }

    let with_a = joined(&intersection, only_a.into_iter());
    let with_b = joined(&intersection, only_b.into_iter());

    let best = ratio(&intersection, &with_a)
        .max(ratio(&intersection, &with_b))
        .max(ratio(&with_a, &with_b));
    best.round().clamp(0.0, 100.0) as u8
}

/// Greedy single-pass fuzzy deduplication that keeps first appearances.
///
/// Each item is compared against every title kept so far, not just the
/// previous one. The first item is always kept.
#[instrument(level = "info", skip_all, fields(items = items.len(), threshold = threshold))]
pub fn dedupe(items: Vec<CandidateItem>, threshold: u8) -> Vec<DedupedItem> {
    let total = items.len();
    let mut seen: Vec<String> = Vec::new();
    let mut kept = Vec::with_capacity(total);

    for item in items {
        let best = seen
            .iter()
            .map(|title| token_set_ratio(&item.title, title))
            .max();
        if let Some(score) = best.filter(|s| *s >= threshold) {
            debug!(title = %item.title, source = %item.source, score, "Dropping near-duplicate");
            continue;
        }
        seen.push(item.title.clone());
        kept.push(item);
    }

    info!(total, kept = kept.len(), "Deduplicated candidates");
    kept
}

/// Stable reorder by a source priority list; unlisted sources keep their
/// relative order after all listed ones. No-op for an empty list.
pub fn prioritize(mut items: Vec<DedupedItem>, order: &[String]) -> Vec<DedupedItem> {
    if order.is_empty() {
        return items;
    }
    items.sort_by_key(|item| {
        order
            .iter()
            .position(|name| name.eq_ignore_ascii_case(&item.source))
            .unwrap_or(order.len())
    });
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;

    fn item(source: &str, title: &str) -> CandidateItem {
        CandidateItem {
            source: source.to_string(),
            title: title.to_string(),
            link: format!("https://example.com/{}", title.len()),
            summary: None,
        }
    }

    fn titles(items: &[DedupedItem]) -> Vec<&str> {
        items.iter().map(|i| i.title.as_str()).collect()
    }

    #[test]
    fn test_token_set_ratio_ignores_order_and_case() {
        assert_eq!(
            token_set_ratio("Celtics beat Knicks in overtime", "knicks BEAT celtics in Overtime"),
            100
        );
    }

    #[test]
    fn test_indel_ratio() {
        assert_eq!(lcs_len("report", "photos"), 3);
        assert_eq!(ratio("abc", "abc"), 100.0);
        assert_eq!(ratio("abcd", "abce"), 75.0);
        assert_eq!(ratio("", ""), 0.0);
    }

    #[test]
    fn test_one_differing_word_reaches_default_threshold() {
        let a = "Red Line shutdown begins report";
        let b = "Red Line shutdown begins photos";
        assert_eq!(token_set_ratio(a, b), 90);

        let kept = dedupe(vec![item("WBUR", a), item("Globe", b)], DEFAULT_THRESHOLD);
        assert_eq!(titles(&kept), vec![a]);
    }

    #[test]
    fn test_token_set_ratio_partial_overlap() {
        assert_eq!(
            token_set_ratio("Governor signs transit funding bill", "Governor signs transit safety bill"),
            89
        );
        assert_eq!(token_set_ratio("Celtics beat Knicks in overtime", "Bruins beat Rangers in overtime"), 71);
    }

    #[test]
    fn test_token_set_ratio_subset_scores_full() {
        assert_eq!(
            token_set_ratio("City council passes budget", "City council passes budget, mayor says"),
            100
        );
    }

    #[test]
    fn test_token_set_ratio_unrelated_titles_score_low() {
        let score = token_set_ratio("Snowstorm closes schools", "Red Line shuttle buses this weekend");
        assert!(score < 50, "score was {score}");
        assert_eq!(token_set_ratio("", "Anything"), 0);
        assert_eq!(token_set_ratio("!!!", "!!!"), 100);
        assert_eq!(token_set_ratio("!!!", "???"), 0);
    }

    #[test]
    fn test_dedupe_empty_input() {
        assert!(dedupe(Vec::new(), DEFAULT_THRESHOLD).is_empty());
    }

    #[test]
    fn test_dedupe_all_identical_titles_keep_one() {
        let items = vec![
            item("A", "Storm knocks out power"),
            item("B", "Storm knocks out power"),
            item("C", "Storm knocks out power"),
        ];
        let kept = dedupe(items, DEFAULT_THRESHOLD);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].source, "A");
    }

    #[test]
    fn test_dedupe_compares_against_all_kept_titles() {
        let items = vec![
            item("A", "Mayor unveils housing plan"),
            item("B", "Red Line delays expected"),
            item("C", "Mayor unveils new housing plan"),
        ];
        let kept = dedupe(items, DEFAULT_THRESHOLD);
        assert_eq!(titles(&kept), vec!["Mayor unveils housing plan", "Red Line delays expected"]);
    }

    #[test]
    fn test_dedupe_one_representative_per_cluster_under_shuffle() {
        let clusters = [
            "Snowstorm closes schools across the region",
            "Red Line shuttle buses replace trains this weekend",
            "State house approves new climate bill",
        ];
        let mut items: Vec<CandidateItem> = clusters
            .iter()
            .flat_map(|t| (0..3).map(move |i| item(&format!("S{i}"), t)))
            .collect();

        for _ in 0..20 {
            items.shuffle(&mut rand::rng());
            let kept = dedupe(items.clone(), DEFAULT_THRESHOLD);
            assert_eq!(kept.len(), clusters.len());
            for cluster in clusters {
                assert_eq!(kept.iter().filter(|k| k.title == cluster).count(), 1);
            }
        }
    }

    #[test]
    fn test_lower_threshold_merges_more() {
        let items = vec![
            item("A", "Governor signs transit funding bill"),
            item("B", "Governor signs transit safety bill"),
        ];
        assert_eq!(dedupe(items.clone(), 100).len(), 2);
        assert_eq!(dedupe(items, 50).len(), 1);
    }

    #[test]
    fn test_prioritize_is_stable() {
        let items = vec![
            item("Hub", "one"),
            item("WBUR", "two"),
            item("Globe", "three"),
            item("WBUR", "four"),
        ];
        let ordered = prioritize(items.clone(), &["wbur".to_string(), "Globe".to_string()]);
        assert_eq!(titles(&ordered), vec!["two", "four", "three", "one"]);
        assert_eq!(titles(&prioritize(items, &[])), vec!["one", "two", "three", "four"]);
    }
}
