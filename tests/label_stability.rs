//! Property tests for signature label stability
//!
//! A petition must map to the same gauge series on every fetch, so labels
//! may only depend on data that does not change between fetches.

use chrono::{DateTime, FixedOffset};
use petitions_exporter::metrics::{Metrics, SignatureLabels};
use petitions_exporter::petitions::Petition;
use proptest::prelude::*;

fn opened_at(secs: i64, nanos: u32) -> DateTime<FixedOffset> {
    DateTime::from_timestamp(secs, nanos)
        .expect("timestamp in range")
        .fixed_offset()
}

proptest! {
    #[test]
    fn sub_second_jitter_does_not_change_labels(
        id in 1i64..1_000_000,
        secs in 1_400_000_000i64..2_000_000_000,
        nanos_a in 0u32..1_000_000_000,
        nanos_b in 0u32..1_000_000_000,
    ) {
        let base = "http://petitions.test";
        let url = format!("{}/petitions/{}", base, id);
        let a = Petition::new(id, "a thing", 1, opened_at(secs, nanos_a), url.clone());
        let b = Petition::new(id, "a thing", 2, opened_at(secs, nanos_b), url);

        prop_assert_eq!(a.opened_at_label(), b.opened_at_label());
        prop_assert_eq!(SignatureLabels::new(base, &a), SignatureLabels::new(base, &b));
    }

    #[test]
    fn signature_count_changes_overwrite_a_single_series(
        counts in proptest::collection::vec(0u64..10_000_000, 1..20),
    ) {
        let metrics = Metrics::new().unwrap();
        let base = "http://petitions.test";
        let mut labels = None;

        for count in &counts {
            let petition = Petition::new(
                5,
                "count a thing",
                *count,
                opened_at(1_600_000_000, 0),
                format!("{}/petitions/5", base),
            );
            labels = Some(metrics.set_signatures(base, &petition));
        }

        let labels = labels.unwrap();
        prop_assert_eq!(metrics.signatures(&labels), *counts.last().unwrap() as f64);

        let exposition = metrics.gather().unwrap();
        let series = exposition
            .lines()
            .filter(|line| line.starts_with("petitions_signatures{"))
            .count();
        prop_assert_eq!(series, 1);
    }
}
