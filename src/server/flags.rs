//! Capability flags of a DCS
//!
//! Each flag keeps its external attribute name and the bit it occupies in
//! the legacy bitmask, so configurations written against the old attribute
//! names keep working.

use serde::Serialize;

pub const F_HAS_INPUTS: u32 = 0x0000_0002;
pub const F_HAS_OUTPUTS: u32 = 0x0000_0004;
pub const F_COMMAND_TCP: u32 = 0x0000_0100;
pub const F_COMMAND_UDP: u32 = 0x0000_0200;
pub const F_COMMAND_SMS: u32 = 0x0000_0400;
pub const F_TRANSMIT_TCP: u32 = 0x0000_1000;
pub const F_TRANSMIT_UDP: u32 = 0x0000_2000;
pub const F_TRANSMIT_SMS: u32 = 0x0000_4000;
pub const F_TRANSMIT_SAT: u32 = 0x0000_8000;
pub const F_JAR_OPTIONAL: u32 = 0x0001_0000;

/// Attribute name / bit pairs in display order
pub const ATTRIBUTES: &[(&str, u32)] = &[
    ("hasInputs", F_HAS_INPUTS),
    ("hasOutputs", F_HAS_OUTPUTS),
    ("commandTcp", F_COMMAND_TCP),
    ("commandUdp", F_COMMAND_UDP),
    ("commandSms", F_COMMAND_SMS),
    ("transmitTcp", F_TRANSMIT_TCP),
    ("transmitUdp", F_TRANSMIT_UDP),
    ("transmitSms", F_TRANSMIT_SMS),
    ("transmitSat", F_TRANSMIT_SAT),
    ("jarOptional", F_JAR_OPTIONAL),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerFlags {
    pub has_inputs: bool,
    pub has_outputs: bool,
    pub command_tcp: bool,
    pub command_udp: bool,
    pub command_sms: bool,
    pub transmit_tcp: bool,
    pub transmit_udp: bool,
    pub transmit_sms: bool,
    pub transmit_sat: bool,
    /// The server may be listed even when its adapter artifact is not installed
    pub artifact_optional: bool,
}

impl ServerFlags {
    /// Vehicle tracker: digital I/O, transmits over TCP and UDP
    pub fn standard_vehicle() -> Self {
        Self::from_bits(F_HAS_INPUTS | F_HAS_OUTPUTS | F_TRANSMIT_TCP | F_TRANSMIT_UDP)
    }

    /// Personal tracker: transmits over TCP and UDP, no I/O
    pub fn standard_personal() -> Self {
        Self::from_bits(F_TRANSMIT_TCP | F_TRANSMIT_UDP)
    }

    pub fn from_bits(bits: u32) -> Self {
        let mut flags = Self::default();
        for (name, bit) in ATTRIBUTES {
            flags.set_attribute(name, bits & bit != 0);
        }
        flags
    }

    pub fn bits(&self) -> u32 {
        ATTRIBUTES
            .iter()
            .filter(|(name, _)| self.attribute(name).unwrap_or(false))
            .fold(0, |acc, (_, bit)| acc | bit)
    }

    /// Value of a named attribute, `None` if the name is not a flag
    pub fn attribute(&self, name: &str) -> Option<bool> {
        let value = match name {
            "hasInputs" => self.has_inputs,
            "hasOutputs" => self.has_outputs,
            "commandTcp" => self.command_tcp,
            "commandUdp" => self.command_udp,
            "commandSms" => self.command_sms,
            "transmitTcp" => self.transmit_tcp,
            "transmitUdp" => self.transmit_udp,
            "transmitSms" => self.transmit_sms,
            "transmitSat" => self.transmit_sat,
            "jarOptional" => self.artifact_optional,
            _ => return None,
        };
        Some(value)
    }

    /// Set a named attribute, returning false if the name is not a flag
    pub fn set_attribute(&mut self, name: &str, value: bool) -> bool {
        let slot = match name {
            "hasInputs" => &mut self.has_inputs,
            "hasOutputs" => &mut self.has_outputs,
            "commandTcp" => &mut self.command_tcp,
            "commandUdp" => &mut self.command_udp,
            "commandSms" => &mut self.command_sms,
            "transmitTcp" => &mut self.transmit_tcp,
            "transmitUdp" => &mut self.transmit_udp,
            "transmitSms" => &mut self.transmit_sms,
            "transmitSat" => &mut self.transmit_sat,
            "jarOptional" => &mut self.artifact_optional,
            _ => return false,
        };
        *slot = value;
        true
    }
}
