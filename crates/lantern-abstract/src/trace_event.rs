use serde::{Deserialize, Serialize};

use crate::request::CallFrame;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TraceFrame {
    #[serde(default)]
    pub frame: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub process_id: Option<u64>,
}

/// The subset of `args.data` the engine reads. Unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct TraceEventData {
    pub url: Option<String>,
    pub frame: Option<String>,
    pub frames: Option<Vec<TraceFrame>>,
    pub page: Option<String>,
    pub stack_trace: Option<Vec<CallFrame>>,
    pub timer_id: Option<u64>,
    pub ready_state: Option<u8>,
    pub request_id: Option<String>,
    pub style_sheet_url: Option<String>,
    pub is_loading_main_frame: Option<bool>,
    #[serde(rename = "documentLoaderURL")]
    pub document_loader_url: Option<String>,
    pub candidate_index: Option<u64>,
    pub is_main_frame: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TraceEventArgs {
    pub data: Option<TraceEventData>,
    pub frame: Option<String>,
    pub name: Option<String>,
}

/// One event of the Chrome trace event format. Timestamps are microseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub name: String,
    #[serde(default)]
    pub cat: String,
    #[serde(default)]
    pub ts: f64,
    #[serde(default)]
    pub dur: Option<f64>,
    #[serde(default)]
    pub pid: u64,
    #[serde(default)]
    pub tid: u64,
    #[serde(default)]
    pub ph: String,
    #[serde(default)]
    pub args: TraceEventArgs,
}

impl TraceEvent {
    /// A complete (`ph: "X"`) event, the shape of scheduled tasks.
    pub fn complete(name: impl Into<String>, ts: f64, dur: f64, pid: u64, tid: u64) -> Self {
        Self {
            name: name.into(),
            cat: "devtools.timeline".to_string(),
            ts,
            dur: Some(dur),
            pid,
            tid,
            ph: "X".to_string(),
            args: TraceEventArgs::default(),
        }
    }

    /// An instant (`ph: "I"`) event bound to a frame, the shape of paint markers.
    pub fn instant(name: impl Into<String>, ts: f64, pid: u64, tid: u64, frame: &str) -> Self {
        Self {
            name: name.into(),
            cat: "blink.user_timing".to_string(),
            ts,
            dur: None,
            pid,
            tid,
            ph: "I".to_string(),
            args: TraceEventArgs {
                frame: Some(frame.to_string()),
                ..Default::default()
            },
        }
    }

    pub fn with_data(mut self, data: TraceEventData) -> Self {
        self.args.data = Some(data);
        self
    }

    pub fn end_ts(&self) -> f64 {
        self.ts + self.dur.unwrap_or(0.0)
    }

    pub fn data(&self) -> Option<&TraceEventData> {
        self.args.data.as_ref()
    }

    /// The frame an event refers to, from `args.frame` or `args.data.frame`.
    pub fn frame(&self) -> Option<&str> {
        self.args
            .frame
            .as_deref()
            .or_else(|| self.data().and_then(|d| d.frame.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_event_deserializes_chrome_format() {
        let json = r#"{
            "name": "EvaluateScript", "cat": "devtools.timeline", "ph": "X",
            "ts": 1000, "dur": 250, "pid": 7, "tid": 9,
            "args": {"data": {"url": "https://a.com/app.js", "frame": "F1", "lineNumber": 3}}
        }"#;
        let event: TraceEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.end_ts(), 1250.0);
        assert_eq!(event.frame(), Some("F1"));
        assert_eq!(
            event.data().and_then(|d| d.url.as_deref()),
            Some("https://a.com/app.js")
        );
    }
}
