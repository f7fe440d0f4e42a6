// Test suite for the server registry

use super::*;
use std::fs;
use tempfile::TempDir;

const TWO_SERVERS: &str = r#"
bindAddress = "127.0.0.1"
backlog = 16

[[element]]
tag = "DCServer"
name = "a"
Description = "Server A"
ListenPorts = { tcpPort = "100", udpPort = "200" }

[[element]]
tag = "DCServer"
name = "b"
ListenPorts = { tcpPort = "100,101", udpPort = "300" }

[[element]]
tag = "DCServer"
name = "c"
ListenPorts = { tcpPort = "200", warnPortConflict = false }
Attributes = { jarOptional = true, hasOutputs = true }
Commands = { dispatchPort = 30050 }
"#;

struct Fixture {
    dir: TempDir,
    config: PathBuf,
    artifacts: PathBuf,
}

fn fixture(document: &str) -> Fixture {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("dcservers.toml");
    fs::write(&config, document).unwrap();
    let artifacts = dir.path().join("lib");
    fs::create_dir(&artifacts).unwrap();
    Fixture {
        dir,
        config,
        artifacts,
    }
}

fn options(fx: &Fixture) -> RegistryOptions {
    RegistryOptions {
        config_file: Some(fx.config.clone()),
        artifact_dir: Some(fx.artifacts.clone()),
        ..RegistryOptions::default()
    }
}

fn runtime(props: &[(&str, &str)]) -> RuntimeConfig {
    RuntimeConfig::from_properties(props.iter().copied().collect::<PropertyStore>())
}

fn init_registry(fx: &Fixture, rt: &RuntimeConfig) -> (ServerRegistry, ListenDefaults) {
    let mut registry = ServerRegistry::new(options(fx));
    let mut listen = ListenDefaults::default();
    registry.init(rt, &mut listen);
    (registry, listen)
}

#[cfg(test)]
mod init_tests {
    use super::*;

    /// Test that init loads servers and publishes listen settings
    #[test]
    fn test_init_loads_and_publishes_listen_settings() {
        let fx = fixture(TWO_SERVERS);
        let (registry, listen) = init_registry(&fx, &runtime(&[]));
        assert!(registry.is_initialized());
        assert_eq!(registry.len(), 3);
        assert_eq!(listen.bind_address, Some("127.0.0.1".parse().unwrap()));
        assert_eq!(listen.backlog, Some(16));
    }

    /// Test that a second init does nothing
    #[test]
    fn test_init_is_idempotent() {
        let fx = fixture(TWO_SERVERS);
        let (mut registry, _) = init_registry(&fx, &runtime(&[]));

        fs::write(&fx.config, "").unwrap();
        let mut listen = ListenDefaults::default();
        registry.init(&runtime(&[]), &mut listen);
        assert_eq!(registry.len(), 3);
        assert_eq!(listen, ListenDefaults::default());
    }

    /// Test that an uninitialized runtime still loads the document
    #[test]
    fn test_uninitialized_runtime_still_loads() {
        let fx = fixture(TWO_SERVERS);
        let (registry, _) = init_registry(&fx, &RuntimeConfig::new());
        assert_eq!(registry.len(), 3);
    }

    /// Test that an unparsable bind address falls back to the wildcard
    #[test]
    fn test_invalid_bind_address_publishes_wildcard() {
        let fx = fixture("bindAddress = \"not-an-ip\"\n");
        let (registry, listen) = init_registry(&fx, &runtime(&[]));
        assert!(registry.is_empty());
        assert_eq!(listen.bind_address, None);
        assert_eq!(listen.backlog, None);
        assert_eq!(registry.listen_settings().backlog, DEFAULT_LISTEN_BACKLOG);
        assert_eq!(registry.listen_settings().port_offset, DEFAULT_PORT_OFFSET);
    }

    /// Test that runtime properties seed the listen settings and offset
    #[test]
    fn test_runtime_properties_seed_settings() {
        let fx = fixture("[[element]]\ntag = \"DCServer\"\nname = \"x\"\nListenPorts = { tcpPort = \"10\" }\n");
        let rt = runtime(&[
            ("DCServer.bindInterface", "10.0.0.1"),
            ("DCServer.listenBacklog", "8"),
            ("DCServer.portOffset", "1000"),
        ]);
        let (registry, listen) = init_registry(&fx, &rt);
        assert_eq!(listen.bind_address, Some("10.0.0.1".parse().unwrap()));
        assert_eq!(listen.backlog, Some(8));
        assert_eq!(registry.listen_settings().port_offset, 1000);
        assert_eq!(registry.get_server_config("x").unwrap().tcp_ports(), vec![1010]);
        assert_eq!(registry.port(5), Some(1005));
        assert_eq!(registry.ports(&[1, 65000]), vec![1001]);
    }

    /// Test that a missing document leaves the registry empty
    #[test]
    fn test_missing_document_yields_empty_registry() {
        let fx = fixture("");
        fs::remove_file(&fx.config).unwrap();
        let (registry, listen) = init_registry(&fx, &runtime(&[]));
        assert!(registry.is_initialized());
        assert!(registry.is_empty());
        assert_eq!(listen.bind_address, None);
    }
}

#[cfg(test)]
mod single_server_tests {
    use super::*;

    /// Test single server selection from `DCServer.name`
    #[test]
    fn test_specific_server_from_runtime() {
        let fx = fixture(TWO_SERVERS);
        let (registry, _) = init_registry(&fx, &runtime(&[("DCServer.name", "b")]));
        assert_eq!(registry.specific_server(), Some("b"));
        assert_eq!(registry.len(), 1);
        assert!(registry.has_server_config("b"));
    }

    /// Test that `*` selects every server
    #[test]
    fn test_star_means_all_servers() {
        let fx = fixture(TWO_SERVERS);
        let (registry, _) = init_registry(&fx, &runtime(&[("DCServer.name", "*")]));
        assert_eq!(registry.specific_server(), None);
        assert_eq!(registry.len(), 3);
    }

    /// Test the per-server file fallback and its global properties
    #[test]
    fn test_per_server_file_fallback_and_globals() {
        let fx = fixture("");
        fs::remove_file(&fx.config).unwrap();
        let sub = fx.dir.path().join("dcservers");
        fs::create_dir(&sub).unwrap();
        fs::write(
            sub.join("dcserver_solo.toml"),
            r#"
            [[element]]
            tag = "DCServer"
            name = "solo"
            [element.GlobalProperties]
            "solo.tcpPort" = "4444"
            "#,
        )
        .unwrap();

        let mut opts = options(&fx);
        opts.specific_server = Some("solo".to_string());
        let mut registry = ServerRegistry::new(opts);
        registry.init(&runtime(&[("shared", "1")]), &mut ListenDefaults::default());

        let solo = registry.get_server_config("solo").unwrap();
        assert_eq!(solo.globals().get("shared"), Some("1"));
        assert_eq!(solo.globals().get("solo.tcpPort"), Some("4444"));
        assert_eq!(registry.global_properties().get("solo.tcpPort"), Some("4444"));
    }
}

#[cfg(test)]
mod lookup_tests {
    use super::*;

    /// Test that the first claimant owns a port
    #[test]
    fn test_port_conflicts_first_claimant_wins() {
        let fx = fixture(TWO_SERVERS);
        let (registry, _) = init_registry(&fx, &runtime(&[]));

        assert_eq!(registry.tcp_port_owner(100).map(|s| s.name()), Some("a"));
        assert_eq!(registry.tcp_port_owner(101).map(|s| s.name()), Some("b"));
        // both configs keep the port
        assert_eq!(registry.get_server_config("b").unwrap().tcp_ports(), vec![100, 101]);

        // TCP and UDP tables are independent
        assert_eq!(registry.udp_port_owner(200).map(|s| s.name()), Some("a"));
        assert_eq!(registry.tcp_port_owner(200).map(|s| s.name()), Some("c"));

        let conflicts = registry.port_tables().conflicts();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(
            conflicts[0],
            PortConflict {
                kind: PortKind::Tcp,
                port: 100,
                owner: "a".to_string(),
                claimant: "b".to_string(),
            }
        );
    }

    /// Test that a second server with the same name never reaches the registry
    #[test]
    fn test_duplicate_server_name_registers_first() {
        let fx = fixture(
            "[[element]]\ntag = \"DCServer\"\nname = \"x\"\nDescription = \"first\"\n\n\
             [[element]]\ntag = \"DCServer\"\nname = \"x\"\nDescription = \"second\"\n",
        );
        let (registry, _) = init_registry(&fx, &runtime(&[]));
        let all = registry.get_server_config_list(true);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].description(), "first");
    }

    /// Test that an unknown server gives None and a placeholder description
    #[test]
    fn test_unknown_server() {
        let fx = fixture(TWO_SERVERS);
        let (registry, _) = init_registry(&fx, &runtime(&[]));
        assert!(registry.get_server_config("zzz").is_none());
        assert!(registry.get_server_config("").is_none());
        assert_eq!(registry.server_description("zzz"), "(zzz)");
        assert_eq!(registry.server_description("a"), "Server A");
        assert_eq!(registry.server_description("b"), "(b)");
        assert!(!registry.supports_dispatch("zzz"));
    }

    /// Test capability lookups by server name
    #[test]
    fn test_capability_lookups() {
        let fx = fixture(TWO_SERVERS);
        let (registry, _) = init_registry(&fx, &runtime(&[]));
        assert!(registry.supports_dispatch("c"));
        assert!(!registry.supports_dispatch("a"));
        assert!(registry.has_digital_outputs("c"));
        assert!(!registry.has_digital_inputs("c"));
    }

    /// Test that the list hides servers without an artifact
    #[test]
    fn test_list_filters_by_artifact() {
        let fx = fixture(TWO_SERVERS);
        fs::write(fx.artifacts.join("a"), "").unwrap();
        let (registry, _) = init_registry(&fx, &runtime(&[]));

        let installed: Vec<&str> = registry
            .get_server_config_list(false)
            .iter()
            .map(|s| s.name())
            .collect();
        assert_eq!(installed, vec!["a", "c"]);

        let all: Vec<&str> = registry
            .get_server_config_list(true)
            .iter()
            .map(|s| s.name())
            .collect();
        assert_eq!(all, vec!["a", "b", "c"]);
    }

    /// Test the artifact path suffix
    #[test]
    fn test_artifact_suffix() {
        let fx = fixture(TWO_SERVERS);
        fs::write(fx.artifacts.join("b.jar"), "").unwrap();
        let mut opts = options(&fx);
        opts.artifact_suffix = Some(".jar".to_string());
        let registry = ServerRegistry::new(opts);
        assert!(registry.artifact_exists("b"));
        assert!(!registry.artifact_exists("a"));
    }
}

#[cfg(test)]
mod add_dcs_tests {
    use super::*;

    /// Test that a missing artifact is recorded and refused
    #[test]
    fn test_missing_artifact_recorded_and_refused() {
        let fx = fixture("");
        let rt = runtime(&[("gtsdmtp.tcpPort", "31000")]);
        let (mut registry, _) = init_registry(&fx, &rt);

        let added = registry.add_dcs(
            "gtsdmtp",
            "OpenDMTP",
            &[31000],
            &[31000],
            0,
            ServerFlags::standard_vehicle(),
            &["mid_"],
        );
        assert!(added.is_none());
        assert_eq!(registry.missing_servers(), vec!["gtsdmtp"]);
        assert!(registry.has_missing_servers());

        // Not referenced by any property: refused but not reported missing
        assert!(registry
            .add_dcs("quiet", "", &[1], &[], 0, ServerFlags::default(), &[])
            .is_none());
        assert_eq!(registry.missing_servers(), vec!["gtsdmtp"]);
    }

    /// Test that the web tier registers servers without an artifact
    #[test]
    fn test_web_tier_registers_without_artifact() {
        let fx = fixture("");
        let rt = runtime(&[("gtsdmtp.udpPort", "")]).with_web_tier(true);
        let (mut registry, _) = init_registry(&fx, &rt);

        let dcs = registry
            .add_dcs(
                "gtsdmtp",
                "OpenDMTP",
                &[31000],
                &[31000],
                31050,
                ServerFlags::standard_vehicle(),
                &["*"],
            )
            .unwrap();
        assert_eq!(dcs.tcp_ports(), vec![31000]);
        assert!(dcs.udp_ports().is_empty());
        assert_eq!(dcs.dispatch_port(), Some(31050));
        assert_eq!(dcs.unique_prefixes(), vec![""]);
        assert_eq!(registry.missing_servers(), vec!["gtsdmtp"]);
        assert_eq!(registry.tcp_port_owner(31000).map(|s| s.name()), Some("gtsdmtp"));
    }

    /// Test that an installed server registers once
    #[test]
    fn test_installed_and_duplicate() {
        let fx = fixture("");
        fs::write(fx.artifacts.join("gtsdmtp"), "").unwrap();
        let (mut registry, _) = init_registry(&fx, &runtime(&[]));

        assert!(registry
            .add_dcs("gtsdmtp", "first", &[1], &[], 0, ServerFlags::default(), &[])
            .is_some());
        assert!(registry
            .add_dcs("gtsdmtp", "second", &[2], &[], 0, ServerFlags::default(), &[])
            .is_none());
        assert!(registry.add_dcs(" ", "", &[], &[], 0, ServerFlags::default(), &[]).is_none());
        assert_eq!(registry.server_description("gtsdmtp"), "first");
        assert!(!registry.has_missing_servers());
    }
}
