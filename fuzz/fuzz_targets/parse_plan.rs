#![no_main]

use libfuzzer_sys::fuzz_target;
use plancheck_types::Predicate;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    let facts = plancheck_domain::parse_plan(&raw);

    let lower = raw.to_lowercase();
    let spilled = lower.contains("external merge") || lower.contains("external sort");
    assert_eq!(facts.external_sort_detected, spilled);

    // Judging arbitrary facts must not panic either.
    let expect = Predicate::all(vec![
        Predicate::contains("Sort"),
        Predicate::RowEstimateWithinFactor { max_ratio: 2.0 },
        Predicate::BufferHitRatioAtLeast { min_ratio: 0.9 },
    ]);
    let _ = plancheck_domain::judge(&facts, &raw, &expect);
});
