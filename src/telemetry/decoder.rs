//! Pure decoding of radio telemetry lines
//!
//! A telemetry line looks like `Temp=21.20 | Hum=37.10 | Soil=0.00 | Rain=0.00`.
//! Decoding never fails: segments that do not carry a `name=value` pair are
//! skipped so that the sender can evolve its format without breaking the sink.

/// Separator placed between fields by the sensor node
pub const FIELD_DELIMITER: &str = " | ";

/// Maximum number of segments a line is split into; the last segment keeps
/// any further delimiters unsplit
pub const MAX_SEGMENTS: usize = 4;

/// One `name=value` pair extracted from a telemetry line
///
/// The value keeps its original text so republishing does not reformat it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedField {
    pub name: String,
    pub value: String,
}

impl DecodedField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Ordered fields decoded from a single telemetry line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedReading {
    fields: Vec<DecodedField>,
}

impl DecodedReading {
    pub fn fields(&self) -> &[DecodedField] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DecodedField> {
        self.fields.iter()
    }
}

impl<'a> IntoIterator for &'a DecodedReading {
    type Item = &'a DecodedField;
    type IntoIter = std::slice::Iter<'a, DecodedField>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl IntoIterator for DecodedReading {
    type Item = DecodedField;
    type IntoIter = std::vec::IntoIter<DecodedField>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

/// Decode a telemetry line into its fields (pure function)
pub fn decode(line: &str) -> DecodedReading {
    if line.is_empty() {
        return DecodedReading::default();
    }

    let fields = line
        .splitn(MAX_SEGMENTS, FIELD_DELIMITER)
        .filter_map(parse_segment)
        .collect();

    DecodedReading { fields }
}

/// Split one segment on its first `=`; segments without one are dropped
fn parse_segment(segment: &str) -> Option<DecodedField> {
    let (name, value) = segment.trim().split_once('=')?;
    Some(DecodedField::new(name.trim(), value.trim()))
}
