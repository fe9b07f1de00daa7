//! Device and operating system detection from `User-Agent` headers.

use crate::config::AnalyticsConfig;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Device name and operating system derived from a user agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_name: String,
    pub operating_system: String,
}

impl DeviceInfo {
    fn new(device: impl Into<String>, os: impl Into<String>) -> Self {
        Self {
            device_name: device.into(),
            operating_system: os.into(),
        }
    }

    pub fn unknown() -> Self {
        Self::new(AnalyticsConfig::UNKNOWN_DEVICE, AnalyticsConfig::UNKNOWN_DEVICE)
    }
}

// "Android 14; Pixel 8 Build/..." or "Android 10; K)"; an optional locale
// such as "en-us;" may sit between version and model.
static ANDROID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Android (\d+)(?:\.[\d.]+)?;\s*(?:[a-z]{2}[-_][a-zA-Z]{2};\s*)?([^;)]+?)\s*(?:Build/|\))")
        .expect("android user agent regex must compile")
});

static APPLE_MOBILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((iPhone|iPad|iPod)[^)]*?OS (\d+)[_.]").unwrap());

static WINDOWS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Windows NT (\d+)\.(\d+)").unwrap());

static MAC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Mac OS X (\d+)[_.](\d+)").unwrap());

static LIBRARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(okhttp|reqwest|curl|python-requests|wget|fxgate|dalvik)/[\d.]+").unwrap()
});

/// Classify a `User-Agent` header. Unrecognized or missing agents yield
/// `"Unknown"` for both fields.
pub fn classify(user_agent: Option<&str>) -> DeviceInfo {
    let ua = match user_agent.map(str::trim) {
        Some(ua) if !ua.is_empty() => ua,
        _ => return DeviceInfo::unknown(),
    };
    if let Some(caps) = ANDROID.captures(ua) {
        let model = caps[2].trim();
        let device = if model.is_empty() || model == "K" {
            "Android Device"
        } else {
            model
        };
        return DeviceInfo::new(device, format!("Android {}", &caps[1]));
    }

    if let Some(caps) = APPLE_MOBILE.captures(ua) {
        let os = if &caps[1] == "iPad" { "iPadOS" } else { "iOS" };
        return DeviceInfo::new(format!("Apple {}", &caps[1]), format!("{} {}", os, &caps[2]));
    }

    if let Some(caps) = WINDOWS.captures(ua) {
        let version = match (&caps[1], &caps[2]) {
            ("10", "0") => "10",
            ("6", "3") => "8.1",
            ("6", "2") => "8",
            ("6", "1") => "7",
            _ => "NT",
        };
        return DeviceInfo::new("Desktop", format!("Windows {}", version));
    }

    if let Some(caps) = MAC.captures(ua) {
        let version = if &caps[1] == "10" {
            format!("10.{}", &caps[2])
        } else {
            caps[1].to_string()
        };
        return DeviceInfo::new("Apple Macintosh", format!("macOS {}", version));
    }

    if ua.contains("CrOS") {
        return DeviceInfo::new("Chromebook", "ChromeOS");
    }

    if ua.contains("Linux") || ua.contains("X11") {
        return DeviceInfo::new("Desktop", "Linux");
    }

    if let Some(caps) = LIBRARY.captures(ua) {
        let name = caps[1].to_ascii_lowercase();
        return DeviceInfo::new(format!("{} client", name), AnalyticsConfig::UNKNOWN_DEVICE);
    }

    DeviceInfo::unknown()
}
