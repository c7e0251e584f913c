use super::EmptyReason;
use crate::storage::store::TestOutcomeCounts;
use serde::Serialize;
use std::cmp::Ordering;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FlakySummary {
    pub test_id: String,
    pub fails: u32,
    pub passes: u32,
    /// Appearances in the window, skipped ones included.
    pub total: u32,
    pub fail_rate: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FlakyReport {
    pub window: usize,
    pub min_fails: u32,
    pub runs_considered: usize,
    /// Ordered by fail rate desc, fail count desc, test_id asc.
    pub tests: Vec<FlakySummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_reason: Option<EmptyReason>,
}

/// Keep tests with at least one pass and at least `max(min_fails, 1)` fails.
/// A test that failed every time it ran is broken, not flaky.
pub fn classify(counts: &[TestOutcomeCounts], min_fails: u32) -> Vec<FlakySummary> {
    let threshold = min_fails.max(1);
    let mut out: Vec<FlakySummary> = counts
        .iter()
        .filter(|c| c.fails >= threshold && c.passes >= 1)
        .map(|c| FlakySummary {
            test_id: c.test_id.clone(),
            fails: c.fails,
            passes: c.passes,
            total: c.total,
            fail_rate: c.fails as f64 / c.total as f64,
        })
        .collect();
    out.sort_by(rank);
    out
}

// Fail rates are compared as exact fractions so equal rates tie regardless
// of float rounding.
fn rank(a: &FlakySummary, b: &FlakySummary) -> Ordering {
    let lhs = b.fails as u64 * a.total as u64;
    let rhs = a.fails as u64 * b.total as u64;
    lhs.cmp(&rhs)
        .then_with(|| b.fails.cmp(&a.fails))
        .then_with(|| a.test_id.cmp(&b.test_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn counts(test_id: &str, passes: u32, fails: u32, skips: u32) -> TestOutcomeCounts {
        TestOutcomeCounts {
            test_id: test_id.into(),
            passes,
            fails,
            total: passes + fails + skips,
        }
    }

    #[test]
    fn broken_and_stable_tests_are_excluded() {
        let input = vec![
            counts("always_fails", 0, 5, 0),
            counts("always_passes", 5, 0, 0),
            counts("fails_and_skips", 0, 2, 3),
            counts("flaky", 3, 2, 0),
        ];
        let out = classify(&input, 1);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].test_id, "flaky");
        assert_eq!(out[0].fail_rate, 0.4);
    }

    #[test]
    fn min_fails_threshold_applies() {
        let input = vec![counts("once", 4, 1, 0), counts("twice", 3, 2, 0)];
        let out = classify(&input, 2);
        assert_eq!(
            out.iter().map(|f| f.test_id.as_str()).collect::<Vec<_>>(),
            vec!["twice"]
        );
    }

    #[test]
    fn ordering_is_rate_then_fails_then_id() {
        let input = vec![
            counts("b", 1, 1, 0), // 1/2
            counts("a", 1, 1, 0), // 1/2
            counts("c", 2, 2, 0), // 2/4, more fails
            counts("d", 1, 3, 0), // 3/4
        ];
        let out = classify(&input, 1);
        let ids: Vec<_> = out.iter().map(|f| f.test_id.as_str()).collect();
        assert_eq!(ids, vec!["d", "c", "a", "b"]);
    }

    proptest! {
        #[test]
        fn never_reports_all_fail_or_zero_fail(
            raw in proptest::collection::vec((0u32..6, 0u32..6, 0u32..3), 0..20),
            min_fails in 0u32..4,
        ) {
            let input: Vec<_> = raw
                .iter()
                .enumerate()
                .filter(|(_, (p, f, s))| p + f + s > 0)
                .map(|(i, (p, f, s))| counts(&format!("t{:02}", i), *p, *f, *s))
                .collect();
            let out = classify(&input, min_fails);
            for f in &out {
                prop_assert!(f.fails > 0);
                prop_assert!(f.fails < f.total);
                prop_assert!(f.fails >= min_fails);
                prop_assert!(f.fail_rate > 0.0 && f.fail_rate < 1.0);
            }
            prop_assert_eq!(classify(&input, min_fails), out);
        }
    }
}
