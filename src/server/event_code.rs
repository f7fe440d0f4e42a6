//! Device-native event code translation

use serde::Serialize;
use std::collections::BTreeMap;

/// No status code
pub const STATUS_NONE: i32 = 0;
/// Event should be discarded
pub const STATUS_IGNORE: i32 = -1;

/// One native code mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventCode {
    pub native: i64,
    pub status: i32,
    pub data: Option<String>,
}

impl EventCode {
    pub fn new(native: i64, status: i32, data: Option<&str>) -> Self {
        Self {
            native,
            status,
            data: data
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
        }
    }

    /// Numeric reading of the data string (decimal or `0x` hex)
    pub fn data_i64(&self) -> Option<i64> {
        let data = self.data.as_deref()?.trim();
        match data.strip_prefix("0x").or_else(|| data.strip_prefix("0X")) {
            Some(hex) => i64::from_str_radix(hex, 16).ok(),
            None => data.parse().ok(),
        }
    }
}

/// Parse a mapped status value
///
/// Blank or `ignore` maps to `STATUS_IGNORE`, `default` or `none` to
/// `STATUS_NONE`, any negative number to `STATUS_IGNORE`. Returns `None` for
/// an unparsable value.
pub fn parse_status_value(value: &str) -> Option<i32> {
    let value = value.trim();
    match value.to_ascii_lowercase().as_str() {
        "" | "ignore" => return Some(STATUS_IGNORE),
        "default" | "none" => return Some(STATUS_NONE),
        _ => {}
    }
    let code = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None => value.parse::<i64>().ok()?,
    };
    if code < 0 {
        Some(STATUS_IGNORE)
    } else {
        i32::try_from(code).ok()
    }
}

/// Native code table with an on/off switch
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventCodeMap {
    enabled: bool,
    codes: BTreeMap<i64, EventCode>,
}

impl EventCodeMap {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            codes: BTreeMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn insert(&mut self, code: EventCode) {
        self.codes.insert(code.native, code);
    }

    pub fn get(&self, native: i64) -> Option<&EventCode> {
        self.codes.get(&native)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Mapped status, or `default` when disabled or unmapped
    pub fn translate(&self, native: i64, default: i32) -> i32 {
        if !self.enabled {
            return default;
        }
        self.codes.get(&native).map_or(default, |c| c.status)
    }
}
