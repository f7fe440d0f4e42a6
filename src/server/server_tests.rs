// Test suite for the server module
// Covers port overrides, prefix normalization, the command catalog and
// access checks on ServerConfig.

use super::acl::{AccessControl, AccessLevel, AccessRules};
use super::command::{Command, CommandArg, CommandTransport};
use super::event_code::{EventCode, STATUS_IGNORE};
use super::*;
use crate::properties::PropertyStore;
use std::sync::Arc;

fn server_with_globals(name: &str, globals: &[(&str, &str)]) -> ServerConfig {
    let store: PropertyStore = globals.iter().copied().collect();
    ServerConfig::new(name, Arc::new(store))
}

#[cfg(test)]
mod port_tests {
    use super::*;

    /// Test that ports are kept when no override property exists
    #[test]
    fn test_no_override_keeps_caller_ports() {
        let mut dcs = server_with_globals("gts", &[]);
        dcs.set_tcp_ports(None, &[31000, 31001], true);
        assert_eq!(dcs.tcp_ports(), vec![31000, 31001]);
    }

    /// Test that an override present but empty clears the ports
    #[test]
    fn test_empty_override_clears_ports() {
        let mut dcs = server_with_globals("gts", &[("gts.tcpPort", "")]);
        dcs.set_tcp_ports(None, &[31000], true);
        assert!(dcs.tcp_ports().is_empty());
    }

    /// Test that invalid override entries are silently dropped
    #[test]
    fn test_override_drops_invalid_entries() {
        let mut dcs = server_with_globals("gts", &[("gts.udpPort", "0, 21000 ,abc,70000,21001")]);
        dcs.set_udp_ports(None, &[31000], true);
        assert_eq!(dcs.udp_ports(), vec![21000, 21001]);
    }

    /// Test that `<name>.port` overrides both TCP and UDP
    #[test]
    fn test_port_alias_applies_to_both_lists() {
        let mut dcs = server_with_globals("gts", &[("gts.port", "5000")]);
        dcs.set_tcp_ports(None, &[1], true);
        dcs.set_udp_ports(None, &[2], true);
        assert_eq!(dcs.tcp_ports(), vec![5000]);
        assert_eq!(dcs.udp_ports(), vec![5000]);
    }

    /// Test that overrides are skipped when not requested
    #[test]
    fn test_override_ignored_without_check() {
        let mut dcs = server_with_globals("gts", &[("gts.tcpPort", "9")]);
        dcs.set_tcp_ports(None, &[31000], false);
        assert_eq!(dcs.tcp_ports(), vec![31000]);
    }

    /// Test that a local override wins over a global one
    #[test]
    fn test_local_property_beats_global() {
        let mut dcs = server_with_globals("gts", &[("gts.tcpPort", "1111")]);
        dcs.set_property("gts.tcpPort", "2222");
        dcs.set_tcp_ports(None, &[31000], true);
        assert_eq!(dcs.tcp_ports(), vec![2222]);
    }

    /// Test that duplicate ports survive in order with their bind address
    #[test]
    fn test_duplicates_preserved_and_bind_address() {
        let mut dcs = server_with_globals("gts", &[]);
        dcs.set_tcp_ports(None, &[31000, 31000], false);
        assert_eq!(dcs.tcp_ports(), vec![31000, 31000]);

        dcs.set_tcp_ports(Some("10.0.0.1"), &[100, 100], false);
        assert_eq!(dcs.tcp_ports(), vec![100, 100]);
        assert_eq!(dcs.tcp_bind_address(100), Some("10.0.0.1"));
        assert_eq!(dcs.udp_bind_address(100), None);
    }

    /// Test that listen ports are TCP first, then UDP-only ports
    #[test]
    fn test_listen_ports_order() {
        let mut dcs = server_with_globals("gts", &[]);
        dcs.set_tcp_ports(None, &[3, 1], false);
        dcs.set_udp_ports(None, &[1, 2], false);
        assert_eq!(dcs.listen_ports(), vec![3, 1, 2]);

        dcs.set_tcp_ports(None, &[100, 200], false);
        dcs.set_udp_ports(None, &[200, 300], false);
        assert_eq!(dcs.listen_ports(), vec![100, 200, 300]);
    }

    /// Test the display and port summary formats
    #[test]
    fn test_display_and_ports_summary() {
        let mut dcs = server_with_globals("gts", &[]);
        assert_eq!(dcs.ports_summary(), "no-ports");
        dcs.set_description("OpenGTS");
        dcs.set_tcp_ports(None, &[31000, 31001], false);
        dcs.set_udp_ports(None, &[31000], false);
        dcs.set_dispatch_port(30050, false);
        assert_eq!(
            dcs.to_string(),
            "(gts) OpenGTS [TCP=31000,31001 UDP=31000 CMD=30050]"
        );
    }
}

#[cfg(test)]
mod dispatch_endpoint_tests {
    use super::*;

    /// Test the dispatch host fallback chain
    #[test]
    fn test_dispatch_host_fallbacks() {
        let mut dcs = server_with_globals("gts", &[]);
        assert_eq!(dcs.dispatch_host(), "localhost");

        let mut bound = server_with_globals("gts", &[("DCServer.bindInterface", "192.168.1.5")]);
        assert_eq!(bound.dispatch_host(), "192.168.1.5");
        bound.set_bind_address(Some("10.1.1.1"));
        assert_eq!(bound.dispatch_host(), "10.1.1.1");

        dcs.set_dispatch_host(Some("cmd.example"));
        assert_eq!(dcs.dispatch_host(), "cmd.example");
    }

    /// Test the dispatch port override and dispatch support
    #[test]
    fn test_dispatch_port_override_and_support() {
        let mut dcs = server_with_globals("gts", &[("gts.commandPort", "31050")]);
        dcs.set_dispatch_port(0, true);
        assert_eq!(dcs.dispatch_port(), Some(31050));
        assert!(dcs.supports_dispatch());

        dcs.set_dispatch_port(-1, false);
        assert!(!dcs.supports_dispatch());
    }

    /// Test the command transport default and setter
    #[test]
    fn test_command_transport_property() {
        let mut dcs = server_with_globals("gts", &[]);
        assert_eq!(dcs.command_transport(), CommandTransport::Udp);
        dcs.set_property("gts.commandProtocol", "sms");
        assert_eq!(dcs.command_transport(), CommandTransport::Sms);
    }
}

#[cfg(test)]
mod prefix_tests {
    use super::*;

    /// Test unique-id prefix normalization
    #[test]
    fn test_normalize_unique_prefixes() {
        assert_eq!(
            normalize_unique_prefixes(&["*", "abc*", " "]),
            vec!["".to_string(), "abc".to_string(), "".to_string()]
        );
        assert_eq!(normalize_unique_prefixes::<&str>(&[]), vec!["".to_string()]);
        assert_eq!(normalize_unique_prefixes(&["<blank>", " imei_ "]), vec!["", "imei_"]);
    }

    /// Test that a property overrides the configured prefixes
    #[test]
    fn test_prefix_property_override() {
        let mut dcs = server_with_globals("gts", &[]);
        dcs.set_unique_prefixes(&["mid_"]);
        assert_eq!(dcs.unique_prefixes(), vec!["mid_"]);
        dcs.set_property("gts.uniquePrefix", "imei_,*");
        assert_eq!(dcs.unique_prefixes(), vec!["imei_", ""]);
    }
}

#[cfg(test)]
mod command_catalog_tests {
    use super::*;

    fn catalog() -> ServerConfig {
        let mut dcs = server_with_globals("gts", &[]);
        dcs.set_commands_acl("acl.device.command", AccessLevel::Write);

        let mut locate = Command::new("LocateNow", "LOC");
        locate.description = "Locate now".to_string();
        locate.types = vec!["map".to_string(), "admin".to_string()];
        assert!(dcs.add_command(locate));

        let mut speed = Command::new("SetSpeed", "SPD ${limit} ${arg1}");
        speed.args = vec![CommandArg::new("limit")];
        speed.types = vec!["admin".to_string()];
        speed.set_status_code(0xF020);
        assert!(dcs.add_command(speed));

        // Neither description nor template: never offered
        assert!(dcs.add_command(Command::new("Hidden", "")));
        dcs
    }

    /// Test that blank and duplicate command names are rejected
    #[test]
    fn test_add_command_rejects_blank_and_duplicate() {
        let mut dcs = catalog();
        assert!(!dcs.add_command(Command::new("  ", "X")));
        assert!(!dcs.add_command(Command::new("LocateNow", "OTHER")));
        assert_eq!(dcs.command_template("LocateNow"), Some("LOC"));
        assert_eq!(dcs.command_names(), vec!["LocateNow", "SetSpeed", "Hidden"]);
    }

    /// Test command rendering by name
    #[test]
    fn test_command_string() {
        let dcs = catalog();
        assert_eq!(
            dcs.command_string("SetSpeed", &["80", "km"]),
            Some("SPD 80 km".to_string())
        );
        assert_eq!(dcs.command_string("SetSpeed", &[]), Some("SPD  ".to_string()));
        assert_eq!(dcs.command_string("Nope", &["1"]), None);
        assert_eq!(dcs.command_status_code("SetSpeed", 0), 0xF020);
        assert_eq!(dcs.command_description("SetSpeed", "?"), "?");
    }

    /// Test that access needs write on both the commands ACL and the command ACL
    #[test]
    fn test_access_requires_both_acls() {
        let dcs = catalog();
        let mut rules = AccessRules::new();
        rules.grant("ops", "acl.device.command", AccessLevel::Write);
        rules.grant("ops", "acl.device.command.SetSpeed", AccessLevel::Read);
        rules.grant("viewer", "acl.device.command", AccessLevel::Read);

        assert!(dcs.user_has_access_to_command(&rules, "ops", "LocateNow"));
        assert!(!dcs.user_has_access_to_command(&rules, "ops", "SetSpeed"));
        assert!(!dcs.user_has_access_to_command(&rules, "viewer", "LocateNow"));
        assert!(!dcs.user_has_access_to_command(&rules, "ops", "Unknown"));
    }

    struct AllowAll;

    impl AccessControl for AllowAll {
        fn access_level(&self, _user: &str, _acl_name: &str, _default: AccessLevel) -> AccessLevel {
            AccessLevel::All
        }
    }

    struct DenyBlank;

    impl AccessControl for DenyBlank {
        fn access_level(&self, user: &str, _acl_name: &str, default: AccessLevel) -> AccessLevel {
            if user.is_empty() { AccessLevel::None } else { default }
        }
    }

    /// Test that a blank user is ruled on by the access control, not refused up front
    #[test]
    fn test_blank_user_left_to_access_control() {
        let dcs = catalog();
        assert!(dcs.user_has_access_to_command(&AllowAll, "", "LocateNow"));
        assert!(dcs.user_has_access_to_command(&AllowAll, "", "SetSpeed"));
        assert!(!dcs.user_has_access_to_command(&AllowAll, "", "Unknown"));
        assert!(!dcs.user_has_access_to_command(&DenyBlank, "", "LocateNow"));
        assert!(dcs.user_has_access_to_command(&DenyBlank, "ops", "LocateNow"));
    }

    /// Test command listing by usage tag
    #[test]
    fn test_commands_for_usage() {
        let dcs = catalog();
        let rules = AccessRules::new();

        let all: Vec<&str> = dcs
            .commands_for(&rules, "ops", "all")
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(all, vec!["LocateNow", "SetSpeed"]);

        let map = dcs.command_description_map(&rules, "ops", "map");
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("LocateNow").map(String::as_str), Some("Locate now"));
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;

    /// Test status code translation through the server
    #[test]
    fn test_translate_status_code() {
        let mut dcs = server_with_globals("gts", &[]);
        dcs.event_codes_mut().insert(EventCode::new(12, STATUS_IGNORE, None));
        assert_eq!(dcs.translate_status_code(12, 7), STATUS_IGNORE);
        dcs.event_codes_mut().set_enabled(false);
        assert_eq!(dcs.translate_status_code(12, 7), 7);
    }

    /// Test that attributes set flags and are stored as properties
    #[test]
    fn test_attributes_mirror_flags() {
        let mut dcs = server_with_globals("gts", &[]);
        dcs.set_attribute("hasInputs", "true");
        dcs.set_attribute("inputOffset", "1");
        assert!(dcs.has_digital_inputs());
        assert!(!dcs.has_digital_outputs());
        assert_eq!(dcs.properties().get("Attribute.hasInputs"), Some("true"));
        assert_eq!(dcs.input_offset(), Some(1));
    }

    /// Test the simulated digital input mask forms
    #[test]
    fn test_simulate_digital_inputs() {
        let mut dcs = server_with_globals("gts", &[]);
        assert_eq!(dcs.simulate_digital_inputs(5), 5);
        dcs.set_property("gts.simulateDigitalInputs", "true");
        assert_eq!(dcs.simulate_digital_inputs(5), ALL_DIGITAL_INPUTS);
        dcs.set_property("gts.simulateDigitalInputs", "0x0C");
        assert_eq!(dcs.simulate_digital_inputs(5), 12);
        assert!(dcs.is_simulated_digital_input(2));
        assert!(!dcs.is_simulated_digital_input(0));
        dcs.set_property("gts.simulateDigitalInputs", "default");
        assert_eq!(dcs.simulate_digital_inputs(5), 5);
    }

    /// Test the property driven tuning getters
    #[test]
    fn test_tuning_getters() {
        let dcs = server_with_globals(
            "gts",
            &[
                ("gts.clientCommandPort", "31100"),
                ("gts.clientCommandPort.tcp", "31200"),
                ("gts.tcpIdleTimeoutMS", "4000"),
                ("gts.minimumSpeedKPH", "3.5"),
                ("gts.estimateOdometer", "yes"),
                ("gts.initialPacket", "0x0A0B"),
                ("gts.finalPacket", "BYE"),
            ],
        );
        assert_eq!(dcs.client_command_port_udp(0), 31100);
        assert_eq!(dcs.client_command_port_tcp(0), 31200);
        assert_eq!(dcs.tcp_idle_timeout_ms(1), 4000);
        assert_eq!(dcs.udp_idle_timeout_ms(1), 1);
        assert_eq!(dcs.minimum_speed_kph(0.0), 3.5);
        assert!(dcs.estimate_odometer(false));
        assert!(!dcs.save_raw_data_packets(false));
        assert_eq!(dcs.initial_packet(), Some(vec![0x0A, 0x0B]));
        assert_eq!(dcs.final_packet(), Some(b"BYE".to_vec()));
    }
}
