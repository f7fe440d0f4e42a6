//! Listen port bindings

use serde::Serialize;
use std::fmt;

/// A listen port and the address it binds to (`None` = wildcard)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortBinding {
    pub port: u16,
    pub bind_address: Option<String>,
}

impl PortBinding {
    pub fn new(port: u16, bind_address: Option<&str>) -> Self {
        Self {
            port,
            bind_address: bind_address
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string),
        }
    }
}

impl fmt::Display for PortBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.bind_address {
            Some(addr) => write!(f, "{}:{}", addr, self.port),
            None => write!(f, "{}", self.port),
        }
    }
}

/// Parse one port, accepting 1..=65535 after adding `offset`
pub fn parse_port(value: &str, offset: i64) -> Option<u16> {
    let port: i64 = value.trim().parse().ok()?;
    if port <= 0 {
        return None;
    }
    u16::try_from(port + offset).ok().filter(|p| *p > 0)
}

/// Keep only the valid entries of a port list
pub fn filter_ports<S: AsRef<str>>(values: &[S]) -> Vec<u16> {
    values
        .iter()
        .filter_map(|v| parse_port(v.as_ref(), 0))
        .collect()
}

/// Parse a port list strictly: one bad entry invalidates the whole list
///
/// # Returns
/// * `Result<Vec<u16>, String>` - The shifted ports, or the offending entry
pub fn parse_port_list<S: AsRef<str>>(values: &[S], offset: i64) -> Result<Vec<u16>, String> {
    values
        .iter()
        .map(|v| parse_port(v.as_ref(), offset).ok_or_else(|| v.as_ref().trim().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test port parsing bounds after the offset is applied
    #[test]
    fn test_parse_port_bounds() {
        assert_eq!(parse_port("31000", 0), Some(31000));
        assert_eq!(parse_port("0", 0), None);
        assert_eq!(parse_port("-5", 0), None);
        assert_eq!(parse_port("65536", 0), None);
        assert_eq!(parse_port("65000", 1000), None);
        assert_eq!(parse_port("100", 1000), Some(1100));
        assert_eq!(parse_port("x", 0), None);
    }

    /// Test that filtering drops bad entries where strict parsing fails
    #[test]
    fn test_filter_vs_strict() {
        let list = ["100", "bad", "200"];
        assert_eq!(filter_ports(&list), vec![100, 200]);
        assert_eq!(parse_port_list(&list, 0), Err("bad".to_string()));
        assert_eq!(parse_port_list(&["1", "2"], 10), Ok(vec![11, 12]));
    }
}
