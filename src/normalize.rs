//! Identifier normalization and arrival list clean-up.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};

use crate::models::{Arrival, Direction};

/// Arrivals kept per direction after each merge.
pub const MAX_ARRIVALS: usize = 10;

/// Arrivals further in the past than this are dropped.
pub const STALE_AFTER: Duration = Duration::seconds(60);

/// Strips the date/version suffix from a raw feed route id.
///
/// `"A20241201"` → `"A"`, `"123_20241201"` → `"123_"`, `"SIR"` → `"SIR"`.
/// A trailing run of eight digits is removed; failing that, the id is cut
/// at the first run of four or more digits that does not start the id.
pub fn route_code(raw: &str) -> &str {
    let bytes = raw.as_bytes();

    if bytes.len() >= 8 && bytes[bytes.len() - 8..].iter().all(u8::is_ascii_digit) {
        return &raw[..raw.len() - 8];
    }

    for i in 1..bytes.len() {
        let run = bytes[i..].iter().take_while(|b| b.is_ascii_digit()).count();
        if run >= 4 {
            return &raw[..i];
        }
    }

    raw
}

/// Splits a platform id such as `"127N"` into its parent id and direction.
///
/// Returns `None` when the id carries no direction suffix.
pub fn split_platform(stop_id: &str) -> Option<(&str, Direction)> {
    let last = stop_id.chars().last()?;
    let direction = Direction::from_suffix(last)?;
    Some((&stop_id[..stop_id.len() - 1], direction))
}

/// Parent station id for a platform id, or the id itself if it has no suffix.
pub fn parent_stop_id(stop_id: &str) -> &str {
    split_platform(stop_id).map_or(stop_id, |(parent, _)| parent)
}

/// True when `time` is more than [`STALE_AFTER`] before `now`.
pub fn is_stale(time: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now - time > STALE_AFTER
}

/// Deduplicates by `(route, time)`, sorts ascending by time and caps the
/// list at [`MAX_ARRIVALS`].
pub fn finalize_arrivals(arrivals: Vec<Arrival>) -> Vec<Arrival> {
    let mut seen = HashSet::with_capacity(arrivals.len());
    let mut unique: Vec<Arrival> = arrivals
        .into_iter()
        .filter(|a| seen.insert((a.route.clone(), a.time)))
        .collect();

    unique.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.route.cmp(&b.route)));
    unique.truncate(MAX_ARRIVALS);
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn route_code_examples() {
        assert_eq!(route_code("A20241201"), "A");
        assert_eq!(route_code("N20241201"), "N");
        assert_eq!(route_code("123_20241201"), "123_");
        assert_eq!(route_code("1"), "1");
        assert_eq!(route_code(""), "");
        assert_eq!(route_code("SIR"), "SIR");
        assert_eq!(route_code("GS"), "GS");
    }

    #[test]
    fn route_code_falls_back_to_digit_run() {
        assert_eq!(route_code("FX2024v2"), "FX");
        assert_eq!(route_code("A1B2345X"), "A1B");
        // Three digits is not a version suffix.
        assert_eq!(route_code("Q123X"), "Q123X");
    }

    #[test]
    fn split_platform_suffixes() {
        assert_eq!(split_platform("127N"), Some(("127", Direction::North)));
        assert_eq!(split_platform("635S"), Some(("635", Direction::South)));
        assert_eq!(split_platform("127"), None);
        assert_eq!(split_platform(""), None);
    }

    #[test]
    fn parent_stop_id_strips_direction() {
        assert_eq!(parent_stop_id("R16N"), "R16");
        assert_eq!(parent_stop_id("R16"), "R16");
        assert_eq!(parent_stop_id("S"), "");
    }

    #[test]
    fn staleness_threshold() {
        let now = Utc::now();
        assert!(is_stale(now - Duration::seconds(90), now));
        assert!(!is_stale(now - Duration::seconds(30), now));
        assert!(!is_stale(now + Duration::minutes(5), now));
    }

    #[test]
    fn finalize_dedupes_sorts_and_caps() {
        let now = Utc::now();
        let mut arrivals = Vec::new();
        for i in (0..15).rev() {
            arrivals.push(Arrival {
                route: "N".into(),
                time: now + Duration::minutes(i),
            });
        }
        arrivals.push(Arrival {
            route: "N".into(),
            time: now,
        });
        arrivals.push(Arrival {
            route: "Q".into(),
            time: now,
        });

        let result = finalize_arrivals(arrivals);
        assert_eq!(result.len(), MAX_ARRIVALS);
        assert_eq!(result[0].time, now);
        assert_eq!(result[1].time, now);
        assert_ne!(result[0].route, result[1].route);
        assert!(result.windows(2).all(|w| w[0].time <= w[1].time));
    }

    fn arb_arrivals() -> impl Strategy<Value = Vec<Arrival>> {
        let base = Utc::now();
        prop::collection::vec(
            (prop::sample::select(vec!["1", "6", "N", "Q", "L"]), 0i64..40),
            0..60,
        )
        .prop_map(move |items| {
            items
                .into_iter()
                .map(|(route, mins)| Arrival {
                    route: route.to_string(),
                    time: base + Duration::minutes(mins),
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn finalized_lists_hold_invariants(arrivals in arb_arrivals()) {
            let result = finalize_arrivals(arrivals.clone());

            prop_assert!(result.len() <= MAX_ARRIVALS);
            prop_assert!(result.windows(2).all(|w| w[0].time <= w[1].time));

            let distinct: HashSet<_> = result.iter().map(|a| (&a.route, a.time)).collect();
            prop_assert_eq!(distinct.len(), result.len());

            let all_distinct: HashSet<_> = arrivals.iter().map(|a| (&a.route, a.time)).collect();
            prop_assert_eq!(result.len(), all_distinct.len().min(MAX_ARRIVALS));
        }

        #[test]
        fn route_code_is_a_prefix(raw in "[A-Z0-9_]{0,14}") {
            prop_assert!(raw.starts_with(route_code(&raw)));
        }
    }
}
