use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fastrace::collector::{Reporter, SpanRecord};

pub mod error;
pub mod mapper;
pub mod model;
pub mod opentelemetry;
pub mod sender;
pub mod span;

pub use error::ApmError;
pub use mapper::span_to_transaction;
pub use model::{ServiceMetadata, Transaction};
pub use opentelemetry::opentelemetry_semantic_mapping;
pub use sender::ApmSender;
pub use span::{AttributeValue, SpanData, SpanId, SpanKind, Status, TraceId, TraceOptions};

use mapper::{STATUS_CODE_TAG, STATUS_MESSAGE_TAG};

fn default_tokio_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .enable_time()
        .build()
        .expect("failed to build tokio runtime for the APM reporter")
}

fn default_status_converter(
    _span_record: &SpanRecord,
    attribute_map: &mut HashMap<String, AttributeValue>,
) -> Status {
    let code = attribute_map
        .remove(STATUS_CODE_TAG)
        .map(|value| value.to_tag_value().parse().unwrap_or(0))
        .unwrap_or(Status::OK);
    let message = attribute_map
        .remove(STATUS_MESSAGE_TAG)
        .map(|value| value.to_tag_value())
        .unwrap_or_default();

    Status { code, message }
}

fn default_span_kind_converter(
    _span_record: &SpanRecord,
    attribute_map: &mut HashMap<String, AttributeValue>,
) -> SpanKind {
    let span_kind = attribute_map.remove("span.kind");

    match span_kind.map(|value| value.to_tag_value()).as_deref() {
        Some("server") => SpanKind::SERVER,
        Some("client") => SpanKind::CLIENT,
        _ => SpanKind::UNSPECIFIED,
    }
}

fn default_error_handler(err: &ApmError) {
    log::error!("report to APM failed: {err}");
}

pub struct ApmReporter {
    tokio_runtime: LazyLock<tokio::runtime::Runtime>,
    sender: ApmSender,
    attribute_name_mappings: Option<HashMap<&'static str, &'static str>>,
    status_converter: fn(&SpanRecord, &mut HashMap<String, AttributeValue>) -> Status,
    span_kind_converter: fn(&SpanRecord, &mut HashMap<String, AttributeValue>) -> SpanKind,
    error_handler: fn(&ApmError),
}

#[bon::bon]
impl ApmReporter {
    #[builder]
    pub fn new(
        tokio_runtime: Option<fn() -> tokio::runtime::Runtime>,
        #[builder(into)] endpoint: String,
        client: Option<reqwest::Client>,
        service: Option<ServiceMetadata>,
        attribute_name_mappings: Option<HashMap<&'static str, &'static str>>,
        status_converter: Option<fn(&SpanRecord, &mut HashMap<String, AttributeValue>) -> Status>,
        span_kind_converter: Option<
            fn(&SpanRecord, &mut HashMap<String, AttributeValue>) -> SpanKind,
        >,
        error_handler: Option<fn(&ApmError)>,
    ) -> Self {
        Self {
            tokio_runtime: LazyLock::new(tokio_runtime.unwrap_or(default_tokio_runtime)),
            sender: ApmSender::builder()
                .endpoint(endpoint)
                .maybe_client(client)
                .maybe_service(service)
                .build(),
            attribute_name_mappings,
            status_converter: status_converter.unwrap_or(default_status_converter),
            span_kind_converter: span_kind_converter.unwrap_or(default_span_kind_converter),
            error_handler: error_handler.unwrap_or(default_error_handler),
        }
    }
}

impl ApmReporter {
    /// Maps and sends one span, returning any delivery failure.
    ///
    /// This blocks on the reporter's own runtime, so it panics when called
    /// from inside a tokio runtime. Call it from a plain thread (or
    /// `spawn_blocking`), as `fastrace`'s collector thread does.
    pub fn try_export_span(&self, span: &SpanData) -> Result<(), ApmError> {
        let transaction = span_to_transaction(span);
        self.tokio_runtime.block_on(self.sender.send(&transaction))
    }

    /// Maps and sends one span. Failures go to the error handler.
    ///
    /// Same threading rule as [`ApmReporter::try_export_span`].
    pub fn export_span(&self, span: &SpanData) {
        if let Err(err) = self.try_export_span(span) {
            (self.error_handler)(&err);
        }
    }

    /// Every span is sent as soon as it is exported, so there is nothing to drain.
    pub fn flush(&self) {}

    fn convert_span(&self, span: SpanRecord, child_span_count: u32) -> SpanData {
        let mut attributes = self.convert_properties(&span.properties);
        let status = (self.status_converter)(&span, &mut attributes);
        let span_kind = (self.span_kind_converter)(&span, &mut attributes);

        let start_time = convert_unix_ns(span.begin_time_unix_ns);

        SpanData {
            trace_id: TraceId(span.trace_id.0.to_be_bytes()),
            span_id: SpanId(span.span_id.0.to_be_bytes()),
            // Only sampled spans ever reach a reporter.
            trace_options: TraceOptions::SAMPLED,
            parent_span_id: SpanId(span.parent_id.0.to_be_bytes()),
            name: span.name.into_owned(),
            start_time,
            end_time: start_time + Duration::from_nanos(span.duration_ns),
            status,
            span_kind,
            child_span_count,
            attributes,
        }
    }

    fn convert_properties(
        &self,
        properties: &[(std::borrow::Cow<'static, str>, std::borrow::Cow<'static, str>)],
    ) -> HashMap<String, AttributeValue> {
        properties
            .iter()
            .map(|(k, v)| {
                let key = self
                    .attribute_name_mappings
                    .as_ref()
                    .and_then(|m| m.get(k.as_ref()).copied())
                    .unwrap_or(k.as_ref());
                (key.to_string(), AttributeValue::String(v.to_string()))
            })
            .collect()
    }
}

impl Reporter for ApmReporter {
    fn report(&mut self, spans: Vec<SpanRecord>) {
        if spans.is_empty() {
            return;
        }

        let child_counts = count_children(&spans);

        for span in spans {
            let child_span_count = child_counts.get(&span.span_id.0).copied().unwrap_or(0);
            let span = self.convert_span(span, child_span_count);
            self.export_span(&span);
        }
    }
}

/// Counts, per span id, the spans of the batch that name it as their parent.
fn count_children(spans: &[SpanRecord]) -> HashMap<u64, u32> {
    let mut counts = HashMap::new();
    for span in spans.iter().filter(|s| s.parent_id.0 != 0) {
        *counts.entry(span.parent_id.0).or_insert(0) += 1;
    }
    counts
}

fn convert_unix_ns(unix_time: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_nanos(unix_time)
}
