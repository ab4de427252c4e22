//! Decode-and-route pipeline tests
//!
//! Example-based checks for the reference line format plus property tests for
//! the decoder and router guarantees.

mod test_helpers;

use lora_sink::bridge::{line_requests, BridgeSettings, LineOutcome};
use lora_sink::telemetry::{decode, publish_requests, route, DecodedField, TopicMapping};
use proptest::prelude::*;
use test_helpers::REFERENCE_LINE;

#[test]
fn test_reference_line_end_to_end() {
    let requests = publish_requests(REFERENCE_LINE, &TopicMapping::default());

    let actual: Vec<(String, String, bool)> = requests
        .into_iter()
        .map(|r| (r.topic, r.payload, r.retain))
        .collect();
    assert_eq!(
        actual,
        vec![
            ("sensor/Temp".to_string(), "21.20".to_string(), true),
            ("sensor/Hum".to_string(), "37.10".to_string(), true),
            ("sensor/Soil".to_string(), "0.00".to_string(), true),
            ("sensor/Rain".to_string(), "0.00".to_string(), true),
        ]
    );
}

#[test]
fn test_malformed_segment_is_dropped() {
    let reading = decode("Temp=21.2 | garbage | Soil=0.0");

    assert_eq!(
        reading.fields(),
        &[DecodedField::new("Temp", "21.2"), DecodedField::new("Soil", "0.0")]
    );
}

#[test]
fn test_fourth_segment_absorbs_remainder() {
    let reading = decode("Temp=1 | Hum=2 | Soil=3 | Rain=4 | Wind=5");

    assert_eq!(reading.len(), 4);
    assert_eq!(reading.fields()[3], DecodedField::new("Rain", "4 | Wind=5"));
}

#[test]
fn test_value_keeps_later_equals_signs() {
    let reading = decode("Temp=a=b");
    assert_eq!(reading.fields(), &[DecodedField::new("Temp", "a=b")]);
}

#[test]
fn test_empty_line_decodes_to_nothing() {
    assert!(decode("").is_empty());
    assert!(decode("no delimiters or pairs").is_empty());
}

#[test]
fn test_unknown_field_routes_to_nothing() {
    let mapping = TopicMapping::default();
    assert_eq!(route(&DecodedField::new("Wind", "3.0"), &mapping), None);
}

#[test]
fn test_prefix_gate_blocks_reordered_lines() {
    let settings = BridgeSettings::default();
    let mapping = TopicMapping::default();

    let (outcome, requests) =
        line_requests("Hum=37.10 | Temp=21.20 | Soil=0.00 | Rain=0.00", &settings, &mapping);

    assert_eq!(outcome, LineOutcome::Ignored);
    assert!(requests.is_empty());
}

fn field_name() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9_]{0,7}"
}

fn field_value() -> impl Strategy<Value = String> {
    "[A-Za-z0-9.\\-]{0,8}"
}

fn padding() -> impl Strategy<Value = String> {
    " {0,2}"
}

fn padded_segment() -> impl Strategy<Value = (String, String, String)> {
    (field_name(), field_value(), padding(), padding()).prop_map(|(name, value, before, after)| {
        let segment = format!("{before}{name}{after}={before}{value}{after}");
        (segment, name, value)
    })
}

proptest! {
    #[test]
    fn prop_four_well_formed_segments_decode_in_order(
        segments in prop::collection::vec(padded_segment(), 4)
    ) {
        let line = segments
            .iter()
            .map(|(segment, _, _)| segment.as_str())
            .collect::<Vec<_>>()
            .join(" | ");

        let reading = decode(&line);

        prop_assert_eq!(reading.len(), 4);
        for (field, (_, name, value)) in reading.iter().zip(&segments) {
            prop_assert_eq!(&field.name, name);
            prop_assert_eq!(&field.value, value);
        }
    }

    #[test]
    fn prop_decode_is_deterministic(line in ".{0,80}") {
        prop_assert_eq!(decode(&line), decode(&line));
    }

    #[test]
    fn prop_decode_never_exceeds_segment_cap(line in "[A-Za-z=| 0-9]{0,120}") {
        prop_assert!(decode(&line).len() <= 4);
    }

    #[test]
    fn prop_decoded_names_and_values_are_trimmed(line in "[A-Za-z=| 0-9.]{0,80}") {
        for field in decode(&line).iter() {
            prop_assert_eq!(field.name.trim(), field.name.as_str());
            prop_assert_eq!(field.value.trim(), field.value.as_str());
        }
    }

    #[test]
    fn prop_field_names_route_case_insensitively(
        flips in prop::collection::vec(any::<bool>(), 4),
        value in field_value()
    ) {
        let name: String = "temp"
            .chars()
            .zip(flips)
            .map(|(c, upper)| if upper { c.to_ascii_uppercase() } else { c })
            .collect();

        let request = route(&DecodedField::new(name, value.clone()), &TopicMapping::default());

        prop_assert_eq!(request.as_ref().map(|r| r.topic.as_str()), Some("sensor/Temp"));
        prop_assert_eq!(request.map(|r| r.payload), Some(value));
    }

    #[test]
    fn prop_every_request_is_retained(line in "[A-Za-z=| 0-9.]{0,80}") {
        let requests = publish_requests(&line, &TopicMapping::default());
        prop_assert!(requests.iter().all(|r| r.retain));
    }

    #[test]
    fn prop_lines_without_prefix_produce_no_requests(line in "[A-Za-z=| 0-9.]{0,80}") {
        prop_assume!(!line.trim().starts_with("Temp="));

        let (_, requests) =
            line_requests(&line, &BridgeSettings::default(), &TopicMapping::default());

        prop_assert!(requests.is_empty());
    }
}
