//! Intake representation of a transaction and the service metadata that
//! accompanies it.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::span::{SpanId, TraceId};

pub const DEFAULT_SERVICE_NAME: &str = "apm-gateway";
pub const DEFAULT_AGENT_NAME: &str = "apm-gateway";
pub const DEFAULT_AGENT_VERSION: &str = "0.0.1";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Transaction {
    pub id: SpanId,
    pub trace_id: TraceId,
    #[serde(skip_serializing_if = "SpanId::is_zero")]
    pub parent_id: SpanId,
    pub name: String,
    #[serde(serialize_with = "serialize_epoch_micros")]
    pub timestamp: SystemTime,
    /// Elapsed time in milliseconds.
    pub duration: f64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub result: String,
    pub span_count: SpanCount,
    pub context: Context,
    pub sampled: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SpanCount {
    pub dropped: u32,
    pub started: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Context {
    pub tags: Tags,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<Request>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Response>,
}

/// Ordered string tags. Serialized as a JSON object.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tags(pub Vec<(String, String)>);

impl Tags {
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Sorts by key. Attribute order is not stable, so compare tags after sorting.
    pub fn sort(&mut self) {
        self.0.sort_by(|a, b| a.0.cmp(&b.0));
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Tags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Tags(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl Serialize for Tags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Request {
    pub url: Url,
    pub method: String,
    #[serde(skip_serializing_if = "Headers::is_empty")]
    pub headers: Headers,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Response {
    pub status_code: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Header {
    pub key: String,
    pub values: Vec<String>,
}

/// Request headers. A header with a single value is written as a string,
/// otherwise as an array.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Headers(pub Vec<Header>);

impl Headers {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Headers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for header in &self.0 {
            match header.values.as_slice() {
                [single] => map.serialize_entry(&header.key, single)?,
                values => map.serialize_entry(&header.key, values)?,
            }
        }
        map.end()
    }
}

/// A URL broken into its components.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Url {
    pub full: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub protocol: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub hostname: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub port: String,
    #[serde(rename = "pathname", skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub search: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub hash: String,
}

impl Url {
    pub fn from_parsed(parsed: &url::Url) -> Self {
        let hostname = match parsed.host() {
            Some(url::Host::Ipv6(addr)) => addr.to_string(),
            Some(host) => host.to_string(),
            None => String::new(),
        };

        Self {
            full: parsed.to_string(),
            protocol: parsed.scheme().to_string(),
            hostname,
            port: parsed.port().map(|p| p.to_string()).unwrap_or_default(),
            path: parsed.path().to_string(),
            search: parsed.query().unwrap_or_default().to_string(),
            hash: parsed.fragment().unwrap_or_default().to_string(),
        }
    }
}

/// Describes the service that produced the transactions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ServiceMetadata {
    pub name: String,
    pub agent: Agent,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Agent {
    pub name: String,
    pub version: String,
}

impl Default for ServiceMetadata {
    fn default() -> Self {
        Self {
            name: DEFAULT_SERVICE_NAME.to_string(),
            agent: Agent {
                name: DEFAULT_AGENT_NAME.to_string(),
                version: DEFAULT_AGENT_VERSION.to_string(),
            },
        }
    }
}

impl Serialize for SpanId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl Serialize for TraceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn serialize_epoch_micros<S: Serializer>(
    time: &SystemTime,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let micros = time
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0);
    serializer.serialize_u64(micros)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    #[test]
    fn transaction_json() {
        let transaction = Transaction {
            id: SpanId([1, 2, 3, 4, 5, 6, 7, 8]),
            trace_id: TraceId([0xff; 16]),
            parent_id: SpanId::default(),
            name: "/foo".to_string(),
            timestamp: UNIX_EPOCH + Duration::from_micros(1_500_000),
            duration: 2.5,
            kind: "1".to_string(),
            result: "OK".to_string(),
            span_count: SpanCount {
                dropped: 0,
                started: 3,
            },
            context: Context {
                tags: [("status.code", "0"), ("status.message", "OK")]
                    .into_iter()
                    .collect(),
                request: None,
                response: Some(Response { status_code: 204 }),
            },
            sampled: true,
        };

        let value = serde_json::to_value(&transaction).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "0102030405060708",
                "trace_id": "ffffffffffffffffffffffffffffffff",
                "name": "/foo",
                "timestamp": 1_500_000,
                "duration": 2.5,
                "type": "1",
                "result": "OK",
                "span_count": {"dropped": 0, "started": 3},
                "context": {
                    "tags": {"status.code": "0", "status.message": "OK"},
                    "response": {"status_code": 204}
                },
                "sampled": true
            })
        );
    }

    #[test]
    fn span_count_and_id_json() {
        let value = serde_json::to_value(SpanCount::default()).unwrap();
        assert_eq!(value, json!({"dropped": 0, "started": 0}));

        let parent = serde_json::to_value(SpanId([0, 0, 0, 0, 0, 0, 0, 9])).unwrap();
        assert_eq!(parent, json!("0000000000000009"));
    }

    #[test]
    fn request_json() {
        let request = Request {
            url: Url {
                full: "http://google.com:8080/".to_string(),
                protocol: "http".to_string(),
                hostname: "google.com".to_string(),
                port: "8080".to_string(),
                path: "/".to_string(),
                ..Default::default()
            },
            method: "GET".to_string(),
            headers: Headers(vec![
                Header {
                    key: "User-Agent".to_string(),
                    values: vec!["curl/1.4".to_string()],
                },
                Header {
                    key: "Accept".to_string(),
                    values: vec!["text/html".to_string(), "*/*".to_string()],
                },
            ]),
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "url": {
                    "full": "http://google.com:8080/",
                    "protocol": "http",
                    "hostname": "google.com",
                    "port": "8080",
                    "pathname": "/"
                },
                "method": "GET",
                "headers": {
                    "User-Agent": "curl/1.4",
                    "Accept": ["text/html", "*/*"]
                }
            })
        );
    }

    #[test]
    fn url_from_parsed() {
        let parsed = url::Url::parse("http://[::1]:9200/a/b?x=1#frag").unwrap();
        let url = Url::from_parsed(&parsed);
        assert_eq!(url.hostname, "::1");
        assert_eq!(url.port, "9200");
        assert_eq!(url.path, "/a/b");
        assert_eq!(url.search, "x=1");
        assert_eq!(url.hash, "frag");
        assert_eq!(url.protocol, "http");
    }

    #[test]
    fn default_service() {
        assert_eq!(
            serde_json::to_value(ServiceMetadata::default()).unwrap(),
            json!({"name": "apm-gateway", "agent": {"name": "apm-gateway", "version": "0.0.1"}})
        );
    }

    #[test]
    fn tags_lookup_and_sort() {
        let mut tags: Tags = [("b", "2"), ("a", "1")].into_iter().collect();
        assert_eq!(tags.get("a"), Some("1"));
        assert!(!tags.contains_key("c"));
        tags.sort();
        assert_eq!(tags.iter().collect::<Vec<_>>(), vec![("a", "1"), ("b", "2")]);
    }
}
