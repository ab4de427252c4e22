//! Telemetry decoding and topic routing
//!
//! Both halves are pure: [`decoder::decode`] turns a radio line into fields and
//! [`router::route`] turns a field into a retained publish request.

pub mod decoder;
pub mod router;

pub use decoder::{decode, DecodedField, DecodedReading, FIELD_DELIMITER, MAX_SEGMENTS};
pub use router::{route, MappingError, PublishRequest, TopicMapping, DEFAULT_TOPICS};

/// Decode a line and route every field, keeping only mapped ones
pub fn publish_requests(line: &str, mapping: &TopicMapping) -> Vec<PublishRequest> {
    decode(line)
        .iter()
        .filter_map(|field| route(field, mapping))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_line_yields_four_retained_requests() {
        let requests = publish_requests(
            "Temp=21.20 | Hum=37.10 | Soil=0.00 | Rain=0.00",
            &TopicMapping::default(),
        );

        let expected: Vec<(&str, &str)> = vec![
            ("sensor/Temp", "21.20"),
            ("sensor/Hum", "37.10"),
            ("sensor/Soil", "0.00"),
            ("sensor/Rain", "0.00"),
        ];
        let actual: Vec<(&str, &str)> = requests
            .iter()
            .map(|r| (r.topic.as_str(), r.payload.as_str()))
            .collect();
        assert_eq!(actual, expected);
        assert!(requests.iter().all(|r| r.retain));
    }

    #[test]
    fn test_unknown_fields_are_skipped() {
        let requests = publish_requests("Temp=1 | Wind=3.0", &TopicMapping::default());
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].topic, "sensor/Temp");
    }
}
