use serde::{Deserialize, Serialize};
use url::Url;

/// Protocols that never touch the network and therefore never hold a connection.
pub const NON_NETWORK_PROTOCOLS: [&str; 6] = [
    "blob",
    "data",
    "intent",
    "file",
    "filesystem",
    "chrome-extension",
];

pub fn is_non_network_protocol(protocol: &str) -> bool {
    let protocol = protocol.strip_suffix(':').unwrap_or(protocol);
    NON_NETWORK_PROTOCOLS.contains(&protocol)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Document,
    Stylesheet,
    Image,
    Media,
    Font,
    Script,
    TextTrack,
    #[serde(rename = "XHR")]
    Xhr,
    Fetch,
    Prefetch,
    EventSource,
    WebSocket,
    Manifest,
    SignedExchange,
    Ping,
    #[serde(rename = "CSPViolationReport")]
    CspViolationReport,
    Preflight,
    Other,
}

impl ResourceType {
    /// Dynamic responses spend most of their TTFB in the server.
    pub fn is_dynamic(&self) -> bool {
        matches!(
            self,
            ResourceType::Document | ResourceType::Xhr | ResourceType::Fetch
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum Priority {
    VeryLow,
    #[default]
    Low,
    Medium,
    High,
    VeryHigh,
}

impl Priority {
    /// Seconds a queued request is pushed back relative to its observed start.
    pub fn start_time_penalty_secs(&self) -> f64 {
        match self {
            Priority::VeryHigh => 0.0,
            Priority::High => 0.25,
            Priority::Medium => 0.5,
            Priority::Low => 1.0,
            Priority::VeryLow => 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ParsedUrl {
    pub scheme: String,
    pub host: String,
    pub security_origin: String,
}

impl ParsedUrl {
    /// Unparseable URLs yield an empty record rather than an error; they simply
    /// group under the empty origin.
    pub fn parse(raw: &str) -> Self {
        match Url::parse(raw) {
            Ok(url) => {
                let origin = url.origin();
                let security_origin = if origin.is_tuple() {
                    origin.ascii_serialization()
                } else {
                    format!("{}://", url.scheme())
                };
                Self {
                    scheme: url.scheme().to_string(),
                    host: url.host_str().unwrap_or_default().to_string(),
                    security_origin,
                }
            }
            Err(_) => Self::default(),
        }
    }
}

/// Resource timing offsets in milliseconds relative to the request start.
/// Negative values mean the phase did not happen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceTiming {
    pub dns_start: f64,
    pub dns_end: f64,
    pub connect_start: f64,
    pub connect_end: f64,
    pub ssl_start: f64,
    pub ssl_end: f64,
    pub send_start: f64,
    pub send_end: f64,
    pub receive_headers_end: f64,
}

impl Default for ResourceTiming {
    fn default() -> Self {
        Self {
            dns_start: -1.0,
            dns_end: -1.0,
            connect_start: -1.0,
            connect_end: -1.0,
            ssl_start: -1.0,
            ssl_end: -1.0,
            send_start: -1.0,
            send_end: -1.0,
            receive_headers_end: -1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CallFrame {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub function_name: String,
    #[serde(default)]
    pub line_number: i64,
    #[serde(default)]
    pub column_number: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CallStack {
    #[serde(default)]
    pub call_frames: Vec<CallFrame>,
    #[serde(default)]
    pub parent: Option<Box<CallStack>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum InitiatorType {
    Parser,
    Script,
    Preload,
    SignedExchange,
    Preflight,
    #[default]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Initiator {
    #[serde(rename = "type", default)]
    pub kind: InitiatorType,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub stack: Option<CallStack>,
}

impl Initiator {
    /// URLs that plausibly caused the request: the explicit URL, or every frame of
    /// the async script stack.
    pub fn urls(&self) -> Vec<String> {
        if let Some(url) = &self.url {
            return vec![url.clone()];
        }
        if self.kind != InitiatorType::Script {
            return Vec::new();
        }
        let mut urls: Vec<String> = Vec::new();
        let mut stack = self.stack.as_ref();
        while let Some(current) = stack {
            for frame in &current.call_frames {
                if !frame.url.is_empty() && !urls.contains(&frame.url) {
                    urls.push(frame.url.clone());
                }
            }
            stack = current.parent.as_deref();
        }
        urls
    }
}

/// A single resource fetch as recorded by the network log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRequest {
    pub request_id: String,
    pub url: String,
    #[serde(default, rename = "parsedURL")]
    pub parsed_url: ParsedUrl,
    #[serde(default, rename = "documentURL")]
    pub document_url: String,
    #[serde(default)]
    pub frame_id: Option<String>,
    #[serde(default)]
    pub resource_type: Option<ResourceType>,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub request_method: String,
    #[serde(default)]
    pub transfer_size: f64,
    #[serde(default)]
    pub resource_size: f64,
    #[serde(default)]
    pub timing: Option<ResourceTiming>,
    #[serde(default)]
    pub renderer_start_time: f64,
    #[serde(default)]
    pub network_request_time: f64,
    #[serde(default)]
    pub response_headers_end_time: f64,
    #[serde(default)]
    pub network_end_time: f64,
    #[serde(default)]
    pub status_code: u16,
    #[serde(default)]
    pub finished: bool,
    #[serde(default)]
    pub failed: bool,
    #[serde(default)]
    pub from_disk_cache: bool,
    #[serde(default)]
    pub from_worker: bool,
    #[serde(default)]
    pub connection_id: u64,
    #[serde(default)]
    pub connection_reused: bool,
    #[serde(default)]
    pub server_response_time: Option<f64>,
    #[serde(default)]
    pub redirect_destination: Option<String>,
    #[serde(default)]
    pub initiator: Option<Initiator>,
    #[serde(default)]
    pub initiator_request: Option<String>,
}

impl NetworkRequest {
    /// A finished, successful GET with the parsed URL filled in. Timing fields are left
    /// at zero for the caller to set.
    pub fn new(request_id: impl Into<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        let parsed_url = ParsedUrl::parse(&url);
        Self {
            request_id: request_id.into(),
            document_url: url.clone(),
            url,
            parsed_url,
            frame_id: None,
            resource_type: None,
            mime_type: String::new(),
            priority: Priority::default(),
            protocol: "http/1.1".to_string(),
            request_method: "GET".to_string(),
            transfer_size: 0.0,
            resource_size: 0.0,
            timing: None,
            renderer_start_time: 0.0,
            network_request_time: 0.0,
            response_headers_end_time: 0.0,
            network_end_time: 0.0,
            status_code: 200,
            finished: true,
            failed: false,
            from_disk_cache: false,
            from_worker: false,
            connection_id: 0,
            connection_reused: false,
            server_response_time: None,
            redirect_destination: None,
            initiator: None,
            initiator_request: None,
        }
    }

    /// Fills in `parsedURL` for inputs that only carried the raw URL.
    pub fn normalize(&mut self) {
        if self.parsed_url.security_origin.is_empty() && self.parsed_url.scheme.is_empty() {
            self.parsed_url = ParsedUrl::parse(&self.url);
        }
    }

    pub fn origin(&self) -> &str {
        &self.parsed_url.security_origin
    }

    pub fn is_h2(&self) -> bool {
        self.protocol == "h2"
    }

    pub fn is_h3(&self) -> bool {
        self.protocol.starts_with("h3")
    }

    pub fn is_secure(&self) -> bool {
        self.parsed_url.scheme == "https"
    }

    pub fn is_non_network(&self) -> bool {
        is_non_network_protocol(&self.protocol) || is_non_network_protocol(&self.parsed_url.scheme)
    }

    pub fn is_resource_type(&self, resource_type: ResourceType) -> bool {
        self.resource_type == Some(resource_type)
    }
}

/// Compares two URLs ignoring their fragments. Unparseable URLs compare as strings.
pub fn equal_with_excluded_fragments(a: &str, b: &str) -> bool {
    match (Url::parse(a), Url::parse(b)) {
        (Ok(mut a), Ok(mut b)) => {
            a.set_fragment(None);
            b.set_fragment(None);
            a == b
        }
        _ => a.split('#').next() == b.split('#').next(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parsed_url_origin() {
        let parsed = ParsedUrl::parse("https://example.com:8443/app.js?x=1");
        assert_eq!(parsed.scheme, "https");
        assert_eq!(parsed.host, "example.com");
        assert_eq!(parsed.security_origin, "https://example.com:8443");

        let data = ParsedUrl::parse("data:image/png;base64,AAAA");
        assert_eq!(data.scheme, "data");
        assert_eq!(data.security_origin, "data://");
    }

    #[test]
    fn test_initiator_urls_walk_async_stack() {
        let initiator = Initiator {
            kind: InitiatorType::Script,
            url: None,
            stack: Some(CallStack {
                call_frames: vec![CallFrame {
                    url: "https://a.com/one.js".into(),
                    ..Default::default()
                }],
                parent: Some(Box::new(CallStack {
                    call_frames: vec![
                        CallFrame {
                            url: "https://a.com/two.js".into(),
                            ..Default::default()
                        },
                        CallFrame {
                            url: "https://a.com/one.js".into(),
                            ..Default::default()
                        },
                    ],
                    parent: None,
                })),
            }),
        };
        assert_eq!(
            initiator.urls(),
            vec!["https://a.com/one.js", "https://a.com/two.js"]
        );
    }

    #[test]
    fn test_fragment_insensitive_compare() {
        assert!(equal_with_excluded_fragments(
            "https://a.com/page#top",
            "https://a.com/page"
        ));
        assert!(!equal_with_excluded_fragments(
            "https://a.com/page?q=1",
            "https://a.com/page"
        ));
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let json = r#"{"requestId": "1", "url": "https://a.com/", "resourceType": "XHR", "priority": "VeryHigh"}"#;
        let mut request: NetworkRequest = serde_json::from_str(json).unwrap();
        request.normalize();
        assert_eq!(request.origin(), "https://a.com");
        assert_eq!(request.resource_type, Some(ResourceType::Xhr));
        assert_eq!(request.priority, Priority::VeryHigh);
        assert!(request.timing.is_none());
        assert!(!request.finished);
    }

    #[test]
    fn test_non_network_protocols() {
        assert!(is_non_network_protocol("data"));
        assert!(is_non_network_protocol("blob:"));
        assert!(!is_non_network_protocol("h2"));
    }
}
