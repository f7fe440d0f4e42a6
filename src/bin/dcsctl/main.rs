#![cfg(feature = "cli")]

use clap::{Parser, Subcommand};
use dcserver::config::{DEFAULT_CONFIG_DIR, DEFAULT_RUNTIME_CONFIG};
use dcserver::device::InMemoryDevice;
use dcserver::registry::{ListenDefaults, RegistryOptions, ServerRegistry};
use dcserver::server::ServerConfig;
use dcserver::sms::SmsGatewayRegistry;
use dcserver::utils::tracing::setup_tracing;
use dcserver::{CommandDispatchClient, DcsError, RuntimeConfig};
use serde_json::json;
use std::path::{Path, PathBuf};

/// Global CLI arguments
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Runtime configuration file
    #[arg(short, long, default_value_os_t = default_runtime_config())]
    config: PathBuf,

    /// Server configuration document (defaults to dcservers.toml next to the runtime config)
    #[arg(long)]
    servers: Option<PathBuf>,

    /// Load only this server
    #[arg(long = "only")]
    only: Option<String>,

    /// Directory holding adapter artifacts
    #[arg(long)]
    artifact_dir: Option<PathBuf>,

    /// Enable terminal logging
    #[arg(short, long)]
    log: bool,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

/// List of available subcommands
#[derive(Subcommand, Debug)]
enum Commands {
    /// List registered servers
    List {
        /// Include servers whose artifact is not installed
        #[arg(long)]
        all: bool,
    },
    /// Show one server's configuration
    Describe { server: String },
    /// Show TCP/UDP port ownership and conflicts
    Ports,
    /// List a server's commands
    Commands {
        server: String,
        /// Usage type filter (`all` or blank for every command)
        #[arg(short = 't', long = "type", default_value = "")]
        cmd_type: String,
    },
    /// Render a command string with argument values
    Render {
        server: String,
        command: String,
        args: Vec<String>,
    },
    /// Translate a device status code to a platform status code
    Translate {
        server: String,
        /// Native code, decimal or 0x-prefixed hex
        code: String,
        #[arg(long, default_value_t = 0)]
        default: i32,
    },
    /// List servers configured but not installed
    Missing,
    /// Send a command to a device through its server
    Send {
        #[arg(long)]
        server: String,
        #[arg(long)]
        account: String,
        #[arg(long)]
        device: String,
        #[arg(long = "command")]
        name: String,
        #[arg(short = 't', long = "type", default_value = "")]
        cmd_type: String,
        /// Command allowance (0 = unlimited)
        #[arg(long, default_value_t = 0)]
        max: u32,
        /// Commands already sent
        #[arg(long, default_value_t = 0)]
        count: u32,
        /// SIM phone number, for SMS commands
        #[arg(long)]
        phone: Option<String>,
        /// Spool file for SMS commands (defaults to DCServer.smsOutboxFile)
        #[arg(long)]
        sms_outbox: Option<PathBuf>,
        args: Vec<String>,
    },
}

fn default_runtime_config() -> PathBuf {
    Path::new(DEFAULT_CONFIG_DIR).join(DEFAULT_RUNTIME_CONFIG)
}

/// Entry point
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.log {
        setup_tracing(None, "info")?;
    }

    if let Err(e) = handle_command(&cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    Ok(())
}

fn load_registry(cli: &Cli) -> Result<(RuntimeConfig, ServerRegistry), Box<dyn std::error::Error>> {
    let runtime = if cli.config.is_file() {
        RuntimeConfig::load(&cli.config)?
    } else {
        RuntimeConfig::new()
    };
    let mut registry = ServerRegistry::new(RegistryOptions {
        config_file: cli.servers.clone(),
        specific_server: cli.only.clone(),
        artifact_dir: cli.artifact_dir.clone(),
        ..RegistryOptions::default()
    });
    registry.init(&runtime, &mut ListenDefaults::default());
    Ok((runtime, registry))
}

fn server<'r>(registry: &'r ServerRegistry, name: &str) -> Result<&'r ServerConfig, DcsError> {
    registry
        .get_server_config(name)
        .ok_or_else(|| DcsError::NotFound(format!("DCServer '{}'", name)))
}

fn parse_code(code: &str) -> Result<i64, DcsError> {
    let code = code.trim();
    let parsed = match code.strip_prefix("0x").or_else(|| code.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16)?,
        None => code.parse()?,
    };
    Ok(parsed)
}

fn server_json(registry: &ServerRegistry, dcs: &ServerConfig) -> serde_json::Value {
    json!({
        "name": dcs.name(),
        "description": registry.server_description(dcs.name()),
        "installed": registry.artifact_exists(dcs.name()) || dcs.flags().artifact_optional,
        "tcpPorts": dcs.tcp_ports(),
        "udpPorts": dcs.udp_ports(),
        "dispatchHost": dcs.dispatch_host(),
        "dispatchPort": dcs.dispatch_port(),
        "commandTransport": dcs.command_transport(),
        "uniquePrefixes": dcs.unique_prefixes(),
        "flags": dcs.flags(),
        "commands": dcs.command_names(),
    })
}

/// Execute the selected subcommand
fn handle_command(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let (runtime, registry) = load_registry(cli)?;

    match &cli.command {
        Commands::List { all } => {
            let list = registry.get_server_config_list(*all);
            if cli.json {
                let values: Vec<_> = list.iter().map(|dcs| server_json(&registry, dcs)).collect();
                println!("{}", serde_json::to_string_pretty(&values)?);
            } else {
                for dcs in list {
                    println!("{}", dcs);
                }
            }
        }
        Commands::Describe { server: name } => {
            let dcs = server(&registry, name)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&server_json(&registry, dcs))?);
            } else {
                println!("Name:        {}", dcs.name());
                println!("Description: {}", registry.server_description(dcs.name()));
                println!("Ports:       {}", dcs.ports_summary());
                match dcs.dispatch_port() {
                    Some(port) => println!("Dispatch:    {}:{} ({})", dcs.dispatch_host(), port, dcs.command_transport()),
                    None => println!("Dispatch:    not supported"),
                }
                println!("Prefixes:    {:?}", dcs.unique_prefixes());
                println!("Commands:    {}", dcs.command_names().join(", "));
                if let Some(source) = dcs.source() {
                    println!("Source:      {}", source.display());
                }
            }
        }
        Commands::Ports => {
            let conflicts = registry.port_tables().conflicts();
            if cli.json {
                let conflicts: Vec<_> = conflicts
                    .iter()
                    .map(|c| json!({"kind": c.kind.to_string(), "port": c.port, "owner": c.owner, "claimant": c.claimant}))
                    .collect();
                let servers: Vec<_> = registry
                    .get_server_config_list(true)
                    .iter()
                    .map(|dcs| json!({"name": dcs.name(), "tcp": dcs.tcp_ports(), "udp": dcs.udp_ports()}))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&json!({"servers": servers, "conflicts": conflicts}))?);
            } else {
                for dcs in registry.get_server_config_list(true) {
                    println!("{:<16} {}", dcs.name(), dcs.ports_summary());
                }
                for c in conflicts {
                    println!("{} port {} claimed by '{}', owned by '{}'", c.kind, c.port, c.claimant, c.owner);
                }
            }
        }
        Commands::Commands { server: name, cmd_type } => {
            let dcs = server(&registry, name)?;
            let commands: Vec<_> = dcs.commands().iter().filter(|c| c.matches_type(cmd_type)).collect();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&commands)?);
            } else {
                for c in commands {
                    println!("{:<20} {:<40} args={} [{}]", c.name, c.description, c.arg_count(), c.types.join(","));
                }
            }
        }
        Commands::Render { server: name, command, args } => {
            let dcs = server(&registry, name)?;
            let values: Vec<&str> = args.iter().map(String::as_str).collect();
            let text = dcs
                .command_string(command, &values)
                .ok_or_else(|| DcsError::NotFound(format!("command '{}'", command)))?;
            println!("{}", text);
        }
        Commands::Translate { server: name, code, default } => {
            let dcs = server(&registry, name)?;
            let status = dcs.translate_status_code(parse_code(code)?, *default);
            if cli.json {
                println!("{}", json!({"server": dcs.name(), "code": code, "status": status}));
            } else {
                println!("0x{:04X}", status);
            }
        }
        Commands::Missing => {
            let missing = registry.missing_servers();
            if cli.json {
                println!("{}", serde_json::to_string(&missing)?);
            } else {
                for name in missing {
                    println!("{}", name);
                }
            }
        }
        Commands::Send {
            server: name,
            account,
            device,
            name: cmd_name,
            cmd_type,
            max,
            count,
            phone,
            sms_outbox,
            args,
        } => {
            let mut dev = InMemoryDevice::new(account, device, name).with_ping_limit(*count, *max);
            if let Some(phone) = phone {
                dev = dev.with_sim_phone_number(phone);
            }
            let client = CommandDispatchClient::from_runtime(&runtime);
            let outbox = sms_outbox.clone().unwrap_or_else(|| runtime.sms_outbox_file());
            let gateways = SmsGatewayRegistry::with_spool(&outbox);
            let resp = client.deliver_command(&registry, &gateways, &mut dev, cmd_type, cmd_name, args);
            if cli.json {
                let fields: serde_json::Map<String, serde_json::Value> = resp
                    .fields()
                    .iter()
                    .map(|(k, v)| (k.clone(), json!(v)))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&fields)?);
            } else {
                println!("{}", resp);
            }
            if !resp.is_ok() {
                return Err(Box::new(DcsError::Transmit(resp.result_code().to_string())));
            }
        }
    }

    Ok(())
}
