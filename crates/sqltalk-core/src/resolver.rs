//! Fuzzy correction of table names against the live catalog
//!
//! The language model reads table names out of free text, so they arrive
//! misspelled, truncated, pluralised differently, or with words swapped. Each
//! candidate is scored against every real table name and replaced by the best
//! one when the score clears the threshold.
//!
//! Scoring is a weighted ratio over insert/delete edit similarity: whole
//! strings are compared directly, and when one name is much longer than the
//! other the best-aligned substring counts too (scaled down), so `order`
//! still finds `order_items`.

use std::collections::BTreeSet;

/// Minimum score (exclusive) on the 0-100 scale for a correction to apply
pub const DEFAULT_MATCH_THRESHOLD: f64 = 70.0;

/// Outcome of resolving one extracted name
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Name as extracted from the prompt
    pub raw: String,
    /// Real table name, or `raw` when nothing scored above the threshold
    pub corrected: String,
    /// Best similarity seen, 0-100
    pub confidence: f64,
}

impl Resolution {
    pub fn was_corrected(&self) -> bool {
        self.raw != self.corrected
    }
}

/// Maps candidate names onto the closest catalog entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableResolver {
    threshold: f64,
}

impl Default for TableResolver {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }
}

impl TableResolver {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Closest real table name for `candidate`, or `candidate` itself
    pub fn resolve(&self, candidate: &str, universe: &[String]) -> String {
        self.resolve_detailed(candidate, universe).corrected
    }

    /// Like [`resolve`](Self::resolve) but keeps the score
    pub fn resolve_detailed(&self, candidate: &str, universe: &[String]) -> Resolution {
        let unchanged = |confidence| Resolution {
            raw: candidate.to_string(),
            corrected: candidate.to_string(),
            confidence,
        };

        if candidate.trim().is_empty() {
            return unchanged(0.0);
        }

        match best_match(candidate, universe) {
            Some((name, score)) if score > self.threshold => Resolution {
                raw: candidate.to_string(),
                corrected: name.to_string(),
                confidence: score,
            },
            Some((_, score)) => unchanged(score),
            None => unchanged(0.0),
        }
    }
}

/// Highest-scoring entry of `universe`. Ties go to the earliest entry.
pub fn best_match<'a>(candidate: &str, universe: &'a [String]) -> Option<(&'a str, f64)> {
    let mut best: Option<(&'a str, f64)> = None;

    for name in universe {
        let score = similarity(candidate, name);
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((name.as_str(), score)),
        }
    }

    best
}

/// Weight applied to token-based scores
const UNBASE_SCALE: f64 = 0.95;

/// Case-insensitive, token-order-insensitive similarity on a 0-100 scale
///
/// Names are lowercased and punctuation becomes a word break, so
/// `order_items` and `Order Items` are the same name. Comparable lengths
/// take the best of the plain ratio and the token ratios (x0.95). Once one
/// name is 1.5 times longer, substring alignment is scored as well (x0.9,
/// or x0.6 past 8 times longer).
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let (short, long) = (a.len().min(b.len()) as f64, a.len().max(b.len()) as f64);
    let len_ratio = long / short;
    let plain = ratio(&a, &b);

    if len_ratio < 1.5 {
        let token = token_sort_ratio(&a, &b).max(token_set_ratio(&a, &b));
        return plain.max(token * UNBASE_SCALE);
    }

    let partial_scale = if len_ratio < 8.0 { 0.9 } else { 0.6 };
    let partial = partial_ratio(&a, &b) * partial_scale;
    let partial_token = partial_token_ratio(&a, &b) * UNBASE_SCALE * partial_scale;

    plain.max(partial).max(partial_token)
}

/// Lowercase, non-alphanumerics to spaces, trimmed
fn normalize(s: &str) -> Vec<char> {
    let mapped: String = s
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    mapped.to_lowercase().trim().chars().collect()
}

fn tokens(s: &[char]) -> BTreeSet<String> {
    s.split(|c| *c == ' ')
        .filter(|t| !t.is_empty())
        .map(|t| t.iter().collect())
        .collect()
}

fn join<'a>(parts: impl IntoIterator<Item = &'a String>) -> Vec<char> {
    parts
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .collect()
}

fn token_sort(s: &[char]) -> Vec<char> {
    let mut words: Vec<String> = s
        .split(|c| *c == ' ')
        .filter(|t| !t.is_empty())
        .map(|t| t.iter().collect())
        .collect();
    words.sort_unstable();
    join(&words)
}

/// Longest common subsequence length
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut row = vec![0usize; b.len() + 1];
    for ca in a {
        let mut diagonal = 0;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == cb {
                diagonal + 1
            } else {
                above.max(row[j])
            };
            diagonal = above;
        }
    }
    row[b.len()]
}

/// Insert/delete similarity: `2 * common / (len_a + len_b)`, 0-100
fn ratio(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }
    200.0 * lcs_len(a, b) as f64 / total as f64
}

/// Best ratio of the shorter string against any same-length window of the
/// longer one, including windows cut off at either edge
fn partial_ratio(a: &[char], b: &[char]) -> f64 {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if short.is_empty() {
        return 0.0;
    }

    let n = short.len();
    let mut best = 0.0_f64;

    for start in 0..=long.len() - n {
        best = best.max(ratio(short, &long[start..start + n]));
        if best >= 100.0 {
            return 100.0;
        }
    }
    for end in 1..n {
        best = best.max(ratio(short, &long[..end]));
    }
    for start in long.len() - n + 1..long.len() {
        best = best.max(ratio(short, &long[start..]));
    }
    best
}

fn token_sort_ratio(a: &[char], b: &[char]) -> f64 {
    ratio(&token_sort(a), &token_sort(b))
}

/// Compares shared words against each side's leftovers
fn token_set_ratio(a: &[char], b: &[char]) -> f64 {
    let ta = tokens(a);
    let tb = tokens(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }

    let common: Vec<&String> = ta.intersection(&tb).collect();
    let only_a: Vec<&String> = ta.difference(&tb).collect();
    let only_b: Vec<&String> = tb.difference(&ta).collect();
    if !common.is_empty() && (only_a.is_empty() || only_b.is_empty()) {
        return 100.0;
    }

    let sect = join(common.iter().copied());
    let with = |rest: &[&String]| -> Vec<char> {
        let rest = join(rest.iter().copied());
        if sect.is_empty() {
            rest
        } else {
            let mut combined = sect.clone();
            combined.push(' ');
            combined.extend(rest);
            combined
        }
    };
    let sect_a = with(&only_a);
    let sect_b = with(&only_b);

    let mut best = ratio(&sect_a, &sect_b);
    if !sect.is_empty() {
        best = best.max(ratio(&sect, &sect_a)).max(ratio(&sect, &sect_b));
    }
    best
}

/// 100 when any word is shared, else partial ratio of the sorted words
fn partial_token_ratio(a: &[char], b: &[char]) -> f64 {
    let ta = tokens(a);
    let tb = tokens(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    if !ta.is_disjoint(&tb) {
        return 100.0;
    }
    partial_ratio(&token_sort(a), &token_sort(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_misspelling_resolves() {
        let resolver = TableResolver::default();
        let tables = catalog(&["orders", "customers"]);
        assert_eq!(resolver.resolve("custmers", &tables), "customers");
    }

    #[test]
    fn test_case_and_token_order_ignored() {
        assert_eq!(similarity("Customers", "customers"), 100.0);
        assert_eq!(similarity("order items", "Order_Items"), 100.0);
        // word order only costs the token weighting
        assert!((similarity("items order", "order_items") - 95.0).abs() < 1e-9);
    }

    #[test]
    fn test_truncated_and_prefixed_names_resolve() {
        let resolver = TableResolver::default();
        let tables = catalog(&["app_users", "customers", "order_items", "products"]);

        let res = resolver.resolve_detailed("order", &tables);
        assert_eq!(res.corrected, "order_items");
        assert!((res.confidence - 90.0).abs() < 1e-9, "{}", res.confidence);

        let res = resolver.resolve_detailed("users", &tables);
        assert_eq!(res.corrected, "app_users");
        assert!((res.confidence - 90.0).abs() < 1e-9, "{}", res.confidence);

        let res = resolver.resolve_detailed("cstmrs", &tables);
        assert_eq!(res.corrected, "customers");
        assert!((res.confidence - 80.0).abs() < 1e-9, "{}", res.confidence);
    }

    #[test]
    fn test_whole_name_beats_substring_alignment() {
        let resolver = TableResolver::default();
        let tables = catalog(&["order_items", "orders"]);
        // "orders" scores 10/11 on the plain ratio, above the scaled substring score
        assert_eq!(resolver.resolve("order", &tables), "orders");
    }

    #[test]
    fn test_partial_weight_drops_for_very_long_names() {
        // 16 times longer: substring match is worth only 60
        let score = similarity("ab", "ab_cdefghijklmnop");
        assert!((score - 60.0).abs() < 1e-9, "{}", score);
    }

    #[test]
    fn test_indel_ratio() {
        let a: Vec<char> = "cstmrs".chars().collect();
        let b: Vec<char> = "customers".chars().collect();
        assert_eq!(lcs_len(&a, &b), 6);
        assert!((ratio(&a, &b) - 80.0).abs() < 1e-9);
        assert_eq!(ratio(&[], &[]), 100.0);
    }

    #[test]
    fn test_no_good_match_leaves_candidate() {
        let resolver = TableResolver::default();
        let tables = catalog(&["orders", "customers"]);
        let res = resolver.resolve_detailed("zebra", &tables);
        assert_eq!(res.corrected, "zebra");
        assert!(!res.was_corrected());
        assert!(res.confidence <= DEFAULT_MATCH_THRESHOLD);
    }

    #[test]
    fn test_empty_universe_returns_candidate() {
        let resolver = TableResolver::default();
        assert_eq!(resolver.resolve("customers", &[]), "customers");
        assert_eq!(resolver.resolve_detailed("customers", &[]).confidence, 0.0);
    }

    #[test]
    fn test_empty_candidate_does_not_panic() {
        let resolver = TableResolver::default();
        let tables = catalog(&["orders"]);
        assert_eq!(resolver.resolve("", &tables), "");
        assert_eq!(resolver.resolve("   ", &tables), "   ");
    }

    #[test]
    fn test_ties_pick_first_in_catalog_order() {
        let resolver = TableResolver::new(50.0);
        let forward = catalog(&["abd", "abe"]);
        let backward = catalog(&["abe", "abd"]);
        assert_eq!(resolver.resolve("abc", &forward), "abd");
        assert_eq!(resolver.resolve("abc", &backward), "abe");
        // same input, same answer
        assert_eq!(resolver.resolve("abc", &forward), resolver.resolve("abc", &forward));
    }

    #[test]
    fn test_threshold_is_exclusive() {
        // "abc" vs "abd" scores exactly 2/3
        let score = similarity("abc", "abd");
        let resolver = TableResolver::new(score);
        assert_eq!(resolver.resolve("abc", &catalog(&["abd"])), "abc");
        let resolver = TableResolver::new(score - 0.01);
        assert_eq!(resolver.resolve("abc", &catalog(&["abd"])), "abd");
    }

    #[test]
    fn test_above_threshold_always_resolves_to_best() {
        let resolver = TableResolver::default();
        let tables = catalog(&["order_items", "orders", "customers", "products"]);
        for (candidate, expected) in [
            ("order items", "order_items"),
            ("Orders", "orders"),
            ("customer", "customers"),
            ("prodcts", "products"),
        ] {
            let res = resolver.resolve_detailed(candidate, &tables);
            assert!(res.confidence > DEFAULT_MATCH_THRESHOLD, "{}", candidate);
            assert_eq!(res.corrected, expected);
        }
    }
}
