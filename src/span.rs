use std::collections::HashMap;
use std::fmt;
use std::time::SystemTime;

/// A 16 byte trace identifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TraceId(pub [u8; 16]);

/// An 8 byte span identifier. The all-zero value means "no span".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SpanId(pub [u8; 8]);

impl SpanId {
    pub fn is_zero(&self) -> bool {
        self.0 == [0; 8]
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|b| write!(f, "{b:02x}"))
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|b| write!(f, "{b:02x}"))
    }
}

/// Trace option flags carried in the span context.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TraceOptions(pub u8);

impl TraceOptions {
    pub const SAMPLED: TraceOptions = TraceOptions(1);

    pub fn is_sampled(&self) -> bool {
        self.0 & 1 == 1
    }
}

/// Status of a finished span. A code of zero is OK; everything else is an error.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Status {
    pub code: i32,
    pub message: String,
}

impl Status {
    pub const OK: i32 = 0;

    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == Self::OK
    }
}

/// Numeric span kind, rendered as a decimal in the transaction type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SpanKind(pub i32);

impl SpanKind {
    pub const UNSPECIFIED: SpanKind = SpanKind(0);
    pub const SERVER: SpanKind = SpanKind(1);
    pub const CLIENT: SpanKind = SpanKind(2);
}

/// A dynamically typed attribute value.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeValue {
    String(String),
    Float64(f64),
    Bool(bool),
    Int32(i32),
    Int64(i64),
    /// A value of a type the exporter does not know how to render.
    Unsupported,
}

impl AttributeValue {
    /// Renders the value the way it appears in transaction tags.
    pub fn to_tag_value(&self) -> String {
        match self {
            AttributeValue::String(s) => s.clone(),
            AttributeValue::Float64(f) if *f == f64::INFINITY => "+Inf".to_string(),
            AttributeValue::Float64(f) if *f == f64::NEG_INFINITY => "-Inf".to_string(),
            AttributeValue::Float64(f) => format!("{f:.6}"),
            AttributeValue::Bool(b) => b.to_string(),
            AttributeValue::Int32(i) => i.to_string(),
            AttributeValue::Int64(i) => i.to_string(),
            AttributeValue::Unsupported => String::new(),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float64(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Int32(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int64(value)
    }
}

/// A completed span, ready to be mapped into a transaction.
#[derive(Clone, Debug, PartialEq)]
pub struct SpanData {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub trace_options: TraceOptions,
    pub parent_span_id: SpanId,
    pub name: String,
    pub start_time: SystemTime,
    pub end_time: SystemTime,
    pub status: Status,
    pub span_kind: SpanKind,
    pub child_span_count: u32,
    pub attributes: HashMap<String, AttributeValue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_values() {
        assert_eq!(AttributeValue::from(123.456).to_tag_value(), "123.456000");
        assert_eq!(AttributeValue::from(0.5).to_tag_value(), "0.500000");
        assert_eq!(AttributeValue::from(f64::INFINITY).to_tag_value(), "+Inf");
        assert_eq!(AttributeValue::from(f64::NEG_INFINITY).to_tag_value(), "-Inf");
        assert_eq!(AttributeValue::from(f64::NAN).to_tag_value(), "NaN");
        assert_eq!(AttributeValue::from(true).to_tag_value(), "true");
        assert_eq!(AttributeValue::from(false).to_tag_value(), "false");
        assert_eq!(AttributeValue::from(-42i32).to_tag_value(), "-42");
        assert_eq!(
            AttributeValue::from(9_007_199_254_740_993i64).to_tag_value(),
            "9007199254740993"
        );
        assert_eq!(AttributeValue::from("value").to_tag_value(), "value");
        assert_eq!(AttributeValue::Unsupported.to_tag_value(), "");
    }

    #[test]
    fn sampling_bit() {
        assert!(TraceOptions(1).is_sampled());
        assert!(TraceOptions(3).is_sampled());
        assert!(!TraceOptions(0).is_sampled());
        assert!(!TraceOptions(2).is_sampled());
    }

    #[test]
    fn id_display() {
        assert_eq!(SpanId([1, 2, 3, 4, 5, 6, 7, 8]).to_string(), "0102030405060708");
        assert_eq!(
            TraceId([0xab; 16]).to_string(),
            "abababababababababababababababab"
        );
        assert!(SpanId::default().is_zero());
    }
}
