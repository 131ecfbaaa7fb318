// crates/correlator-core/tests/proptest_comparator.rs
// Property tests for the field predicate evaluator's numeric and size-literal
// parsing: arbitrary magnitudes and suffixes should always round-trip into
// the comparison the string describes.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    missing_docs,
    clippy::missing_docs_in_private_items,
    reason = "integration test crate, not production code"
)]

use correlator_core::EventTime;
use correlator_core::event::Event;
use correlator_core::predicate::Comparator;
use correlator_core::predicate::FieldPredicate;
use correlator_core::predicate::evaluate;
use proptest::prelude::*;
use serde_json::json;

fn event_with_bytes(bytes: f64) -> Event {
    Event::from_json(
        &json!({"type": "file_access", "timestamp": 0, "bytes_written": bytes}),
        EventTime::from_unix_seconds(0),
    )
    .expect("fixture event must parse")
}

fn comparator_token(comparator: Comparator) -> &'static str {
    match comparator {
        Comparator::GreaterOrEqual => ">=",
        Comparator::GreaterThan => ">",
        Comparator::Equal => "=",
        Comparator::LessOrEqual => "<=",
        Comparator::LessThan => "<",
    }
}

fn any_comparator() -> impl Strategy<Value = Comparator> {
    prop_oneof![
        Just(Comparator::GreaterOrEqual),
        Just(Comparator::GreaterThan),
        Just(Comparator::Equal),
        Just(Comparator::LessOrEqual),
        Just(Comparator::LessThan),
    ]
}

proptest! {
    // A bare-number comparison string parses to a predicate whose outcome
    // always matches applying the comparator directly to the two numbers.
    #[test]
    fn bare_number_comparison_matches_direct_application(
        comparator in any_comparator(),
        threshold in -1_000_000.0_f64..1_000_000.0,
        actual in -1_000_000.0_f64..1_000_000.0,
    ) {
        let token = format!("{} {threshold}", comparator_token(comparator));
        let predicate = FieldPredicate::parse("bytes_written", &json!(token), false).unwrap();
        let event = event_with_bytes(actual);

        prop_assert_eq!(evaluate(&predicate, &event), comparator.apply(actual, threshold));
    }

    // KB/MB/GB size literals parse to the same magnitude as their expanded
    // byte count, regardless of the comparator chosen.
    #[test]
    fn size_literal_suffixes_expand_to_the_documented_byte_multiplier(
        comparator in any_comparator(),
        magnitude in 0.0_f64..10_000.0,
        actual in 0.0_f64..(10_000.0 * 1024.0 * 1024.0 * 1024.0),
    ) {
        for (suffix, multiplier) in [("KB", 1024.0), ("MB", 1024.0 * 1024.0), ("GB", 1024.0 * 1024.0 * 1024.0)] {
            let token = format!("{} {magnitude}{suffix}", comparator_token(comparator));
            let predicate = FieldPredicate::parse("bytes_written", &json!(token), false).unwrap();
            let event = event_with_bytes(actual);

            prop_assert_eq!(evaluate(&predicate, &event), comparator.apply(actual, magnitude * multiplier));
        }
    }

    // Whitespace around the comparator and operand never changes the parsed
    // outcome.
    #[test]
    fn surrounding_whitespace_is_insignificant(
        comparator in any_comparator(),
        threshold in -1_000.0_f64..1_000.0,
        actual in -1_000.0_f64..1_000.0,
    ) {
        let token = format!("  {}   {threshold}  ", comparator_token(comparator));
        let predicate = FieldPredicate::parse("bytes_written", &json!(token), false).unwrap();
        let event = event_with_bytes(actual);

        prop_assert_eq!(evaluate(&predicate, &event), comparator.apply(actual, threshold));
    }
}
