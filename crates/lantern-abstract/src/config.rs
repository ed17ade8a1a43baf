use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Chrome's devtools throttling adds latency per request rather than per round trip,
/// so observed latency has to be scaled back down to a packet-level RTT.
pub const DEVTOOLS_RTT_ADJUSTMENT_FACTOR: f64 = 3.75;
pub const DEVTOOLS_THROUGHPUT_ADJUSTMENT_FACTOR: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThrottlingMethod {
    Devtools,
    #[default]
    Simulate,
    Provided,
}

impl ThrottlingMethod {
    /// Whether metrics are derived by Lantern rather than read from the trace.
    pub fn is_simulated(&self) -> bool {
        matches!(self, ThrottlingMethod::Simulate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThrottlingSettings {
    pub rtt_ms: f64,
    pub throughput_kbps: f64,
    pub request_latency_ms: f64,
    pub download_throughput_kbps: f64,
    pub upload_throughput_kbps: f64,
    pub cpu_slowdown_multiplier: f64,
}

impl ThrottlingSettings {
    /// Slow 4G on a mid-tier mobile device. Lantern's coefficients are fit against it.
    pub fn mobile_slow_4g() -> Self {
        Self {
            rtt_ms: 150.0,
            throughput_kbps: 1.6 * 1024.0,
            request_latency_ms: 150.0 * DEVTOOLS_RTT_ADJUSTMENT_FACTOR,
            download_throughput_kbps: 1.6 * 1024.0 * DEVTOOLS_THROUGHPUT_ADJUSTMENT_FACTOR,
            upload_throughput_kbps: 750.0 * DEVTOOLS_THROUGHPUT_ADJUSTMENT_FACTOR,
            cpu_slowdown_multiplier: 4.0,
        }
    }

    pub fn desktop_dense_4g() -> Self {
        Self {
            rtt_ms: 40.0,
            throughput_kbps: 10.0 * 1024.0,
            request_latency_ms: 0.0,
            download_throughput_kbps: 0.0,
            upload_throughput_kbps: 0.0,
            cpu_slowdown_multiplier: 1.0,
        }
    }

    pub fn by_preset_name(name: &str) -> Option<Self> {
        match name {
            "mobile" | "mobile-slow-4g" => Some(Self::mobile_slow_4g()),
            "desktop" | "desktop-dense-4g" => Some(Self::desktop_dense_4g()),
            _ => None,
        }
    }
}

impl Default for ThrottlingSettings {
    fn default() -> Self {
        Self::mobile_slow_4g()
    }
}

/// Per-origin network estimates computed ahead of time, replacing the observed ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrecomputedLanternData {
    pub additional_rtt_by_origin: BTreeMap<String, f64>,
    pub server_response_time_by_origin: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub throttling_method: ThrottlingMethod,
    pub throttling: ThrottlingSettings,
    #[serde(default)]
    pub precomputed_lantern_data: Option<PrecomputedLanternData>,
}

impl Settings {
    pub fn desktop() -> Self {
        Self {
            throttling: ThrottlingSettings::desktop_dense_4g(),
            ..Default::default()
        }
    }
}

/// Partial settings, as found in scenario files and settings TOML files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsOverride {
    pub throttling_method: Option<ThrottlingMethod>,
    pub preset: Option<String>,
    pub rtt_ms: Option<f64>,
    pub throughput_kbps: Option<f64>,
    pub request_latency_ms: Option<f64>,
    pub download_throughput_kbps: Option<f64>,
    pub cpu_slowdown_multiplier: Option<f64>,
    pub precomputed_lantern_data: Option<PrecomputedLanternData>,
}

impl SettingsOverride {
    /// Applies the preset first so individual fields can refine it.
    pub fn apply_to(&self, settings: &mut Settings) {
        if let Some(preset) = self
            .preset
            .as_deref()
            .and_then(ThrottlingSettings::by_preset_name)
        {
            settings.throttling = preset;
        }
        if let Some(v) = self.throttling_method {
            settings.throttling_method = v;
        }
        if let Some(v) = self.rtt_ms {
            settings.throttling.rtt_ms = v;
        }
        if let Some(v) = self.throughput_kbps {
            settings.throttling.throughput_kbps = v;
        }
        if let Some(v) = self.request_latency_ms {
            settings.throttling.request_latency_ms = v;
        }
        if let Some(v) = self.download_throughput_kbps {
            settings.throttling.download_throughput_kbps = v;
        }
        if let Some(v) = self.cpu_slowdown_multiplier {
            settings.throttling.cpu_slowdown_multiplier = v;
        }
        if let Some(v) = &self.precomputed_lantern_data {
            settings.precomputed_lantern_data = Some(v.clone());
        }
    }
}
