//! Mapping of a finished span onto an intake transaction.

use std::collections::HashMap;
use std::fmt::Write;

use crate::model::{Context, Header, Headers, Request, Response, SpanCount, Tags, Transaction, Url};
use crate::span::{AttributeValue, SpanData};

pub const HTTP_HOST: &str = "http.host";
pub const HTTP_METHOD: &str = "http.method";
pub const HTTP_PATH: &str = "http.path";
pub const HTTP_USER_AGENT: &str = "http.user_agent";
pub const HTTP_STATUS_CODE: &str = "http.status_code";

pub const STATUS_CODE_TAG: &str = "status.code";
pub const STATUS_MESSAGE_TAG: &str = "status.message";
pub const ERROR_TAG: &str = "error";

const URL_SCHEME: &str = "http";

/// Converts a span into a transaction. Never fails: unknown attribute types
/// render as empty strings and malformed numbers as zero.
pub fn span_to_transaction(span: &SpanData) -> Transaction {
    let sampled = span.trace_options.is_sampled();

    let attributes = attributes_to_map(&span.attributes);

    let mut tags = Tags::default();
    tags.push(STATUS_CODE_TAG, span.status.code.to_string());
    tags.push(STATUS_MESSAGE_TAG, span.status.message.as_str());

    if !span.status.is_ok() {
        tags.push(ERROR_TAG, "true");
    }

    for (key, value) in &attributes {
        tags.push(key.as_str(), value.as_str());
    }

    let request = non_empty(&attributes, HTTP_HOST).map(|_| {
        let headers = non_empty(&attributes, HTTP_USER_AGENT)
            .map(|user_agent| {
                vec![Header {
                    key: "User-Agent".to_string(),
                    values: vec![user_agent.to_string()],
                }]
            })
            .unwrap_or_default();

        Request {
            url: tags_to_url(&attributes),
            method: attributes.get(HTTP_METHOD).cloned().unwrap_or_default(),
            headers: Headers(headers),
        }
    });

    let response = non_empty(&attributes, HTTP_STATUS_CODE).map(|code| Response {
        status_code: code.parse().unwrap_or(0),
    });

    // Milliseconds, as the intake expects. A clock going backwards yields zero.
    let duration = span
        .end_time
        .duration_since(span.start_time)
        .unwrap_or_default();

    Transaction {
        id: span.span_id,
        trace_id: span.trace_id,
        parent_id: span.parent_span_id,
        name: span.name.clone(),
        timestamp: span.start_time,
        duration: duration.as_secs_f64() * 1000.0,
        kind: span.span_kind.0.to_string(),
        result: span.status.message.clone(),
        span_count: SpanCount {
            dropped: 0,
            started: span.child_span_count,
        },
        context: Context {
            tags,
            request,
            response,
        },
        sampled,
    }
}

/// Renders every attribute as a string, keeping keys whose type is unsupported.
pub fn attributes_to_map(attributes: &HashMap<String, AttributeValue>) -> HashMap<String, String> {
    attributes
        .iter()
        .map(|(k, v)| (k.clone(), v.to_tag_value()))
        .collect()
}

/// Builds the request URL from the `http.host` and `http.path` tags.
///
/// Host and path are taken as given: nothing is lowercased or resolved, a
/// default port is kept, and `?` or `#` in the path stay part of the path.
pub fn tags_to_url(tags: &HashMap<String, String>) -> Url {
    let host = tags.get(HTTP_HOST).map(String::as_str).unwrap_or_default();
    let path = tags.get(HTTP_PATH).map(String::as_str).unwrap_or_default();

    let mut full = format!("{URL_SCHEME}:");
    if !host.is_empty() || !path.is_empty() {
        full.push_str("//");
        full.push_str(&escape(host, keep_in_host));
    }
    if !host.is_empty() && !path.is_empty() && !path.starts_with('/') {
        full.push('/');
    }
    full.push_str(&escape(path, keep_in_path));

    let (hostname, port) = split_host_port(host);

    Url {
        full,
        protocol: URL_SCHEME.to_string(),
        hostname: hostname.to_string(),
        port: port.to_string(),
        path: path.to_string(),
        ..Default::default()
    }
}

fn non_empty<'a>(tags: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    tags.get(key).map(String::as_str).filter(|v| !v.is_empty())
}

/// Splits `host[:port]`. The port must be all digits; brackets around an
/// IPv6 literal are dropped.
fn split_host_port(host: &str) -> (&str, &str) {
    let (name, port) = match host.rsplit_once(':') {
        Some((name, port)) if port.bytes().all(|b| b.is_ascii_digit()) => (name, port),
        _ => (host, ""),
    };
    let name = name
        .strip_prefix('[')
        .and_then(|n| n.strip_suffix(']'))
        .unwrap_or(name);
    (name, port)
}

fn keep_in_host(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"-_.~!$&'()*+,;=:[]<>\"".contains(&b)
}

fn keep_in_path(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"-_.~$&+,/:;=@".contains(&b)
}

fn escape(input: &str, keep: fn(u8) -> bool) -> String {
    let mut escaped = String::with_capacity(input.len());
    for b in input.bytes() {
        if keep(b) {
            escaped.push(b as char);
        } else {
            let _ = write!(escaped, "%{b:02X}");
        }
    }
    escaped
}
