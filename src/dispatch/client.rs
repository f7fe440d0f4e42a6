//! Command dispatch client
//!
//! Delivers one command request to a running DCS over its control endpoint:
//! connect, write the request line, read one reply line, close. Transport
//! failures never escape as errors; they become result codes.

use chrono::Utc;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{error, info, warn};

use super::protocol::CommandRequest;
use super::result::{CommandResponse, ResultCode};
use crate::config::{DEFAULT_DISPATCH_TIMEOUT, MAX_LINE_LENGTH, PROP_SMS_GATEWAY, RuntimeConfig};
use crate::device::DeviceRecord;
use crate::registry::ServerRegistry;
use crate::server::ServerConfig;
use crate::server::command::CommandTransport;
use crate::sms::SmsGatewayRegistry;
use crate::utils::error::{DcsError, Result};

#[derive(Debug, Clone)]
pub struct CommandDispatchClient {
    timeout: Duration,
    sms_gateway: Option<String>,
}

impl Default for CommandDispatchClient {
    fn default() -> Self {
        Self::new(DEFAULT_DISPATCH_TIMEOUT)
    }
}

impl CommandDispatchClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            sms_gateway: None,
        }
    }

    /// Client using `DCServer.dispatchTimeoutMS` and `DCServer.smsGateway`
    pub fn from_runtime(runtime: &RuntimeConfig) -> Self {
        Self {
            timeout: runtime.dispatch_timeout(),
            sms_gateway: runtime.get_string(PROP_SMS_GATEWAY),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send a command to the server the device reports through
    ///
    /// Server, allowance, account, device and dispatch support are checked
    /// before any connection is made. The device command counter is
    /// incremented on an OK reply.
    ///
    /// # Arguments
    /// * `registry` - Initialized server registry
    /// * `device` - Target device
    /// * `cmd_type` - Usage type the command is sent under
    /// * `cmd_name` - Command name
    /// * `args` - Positional argument values
    ///
    /// # Returns
    /// * `CommandResponse` - Reply from the server, or a locally generated result
    pub fn send_server_command<S: AsRef<str>>(
        &self,
        registry: &ServerRegistry,
        device: &mut dyn DeviceRecord,
        cmd_type: &str,
        cmd_name: &str,
        args: &[S],
    ) -> CommandResponse {
        let request = CommandRequest::new(device.account_id(), device.device_id(), cmd_type, cmd_name, args);

        let dcs = match self.check_device(registry, &*device, &request) {
            Ok(dcs) => dcs,
            Err(code) => return CommandResponse::with_result(request.pairs(), code),
        };
        if !dcs.supports_dispatch() {
            error!("[{}] Command port not supported", dcs.name());
            return CommandResponse::with_result(request.pairs(), ResultCode::NotSupported);
        }

        let resp = self.send_to_server(dcs, &request);
        if resp.is_ok() {
            device.increment_ping_count(Utc::now());
        }
        resp
    }

    /// Deliver a command over the transport its definition names
    ///
    /// SMS commands are rendered and handed to the SMS gateway; everything
    /// else goes to the server's control endpoint.
    pub fn deliver_command<S: AsRef<str>>(
        &self,
        registry: &ServerRegistry,
        gateways: &SmsGatewayRegistry,
        device: &mut dyn DeviceRecord,
        cmd_type: &str,
        cmd_name: &str,
        args: &[S],
    ) -> CommandResponse {
        let request = CommandRequest::new(device.account_id(), device.device_id(), cmd_type, cmd_name, args);

        let dcs = match self.check_device(registry, &*device, &request) {
            Ok(dcs) => dcs,
            Err(code) => return CommandResponse::with_result(request.pairs(), code),
        };
        let Some(command) = dcs.command(cmd_name) else {
            warn!("[{}] Command not found: {}", dcs.name(), cmd_name);
            return CommandResponse::with_result(request.pairs(), ResultCode::InvalidCommand);
        };

        let transport = command.transport.unwrap_or_else(|| dcs.command_transport());
        if transport != CommandTransport::Sms {
            return self.send_server_command(registry, device, cmd_type, cmd_name, args);
        }

        let text = command.render(&request.arg_refs());
        let handler = command.handler.as_deref().or(self.sms_gateway.as_deref());
        info!(
            "[{}] Sending SMS command '{}' to {}/{}",
            dcs.name(),
            cmd_name,
            device.account_id(),
            device.device_id()
        );
        let code = gateways.send(handler, &*device, &text);
        if code.is_ok() {
            device.increment_ping_count(Utc::now());
        }
        CommandResponse::with_result(request.pairs(), code)
    }

    fn check_device<'r>(
        &self,
        registry: &'r ServerRegistry,
        device: &dyn DeviceRecord,
        request: &CommandRequest,
    ) -> std::result::Result<&'r ServerConfig, ResultCode> {
        let server = device.server_id().trim();
        if server.is_empty() {
            warn!("Device server id is blank");
            return Err(ResultCode::InvalidServer);
        }
        let dcs = registry
            .get_server_config(server)
            .ok_or(ResultCode::InvalidServer)?;

        if device.is_over_limit() {
            warn!(
                "Device exceeded maximum pings: {} >= {}",
                device.total_ping_count(),
                device.max_ping_count()
            );
            return Err(ResultCode::OverLimit);
        }
        if request.account.trim().is_empty() {
            error!("Account is blank");
            return Err(ResultCode::InvalidAccount);
        }
        if request.device.trim().is_empty() {
            error!("Device is blank");
            return Err(ResultCode::InvalidDevice);
        }
        Ok(dcs)
    }

    /// One request/reply exchange with a server's control endpoint
    pub fn send_to_server(&self, dcs: &ServerConfig, request: &CommandRequest) -> CommandResponse {
        let Some(port) = dcs.dispatch_port() else {
            return CommandResponse::with_result(request.pairs(), ResultCode::NotSupported);
        };
        let host = dcs.dispatch_host();
        let line = request.encode();
        info!("[{}] Sending command to '{}:{}'", dcs.name(), host, port);
        info!("[{}] Command String: {}", dcs.name(), line);

        match self.exchange(&host, port, &line) {
            Ok(reply) => {
                info!("[{}] Command Response: {}", dcs.name(), reply.trim_end());
                CommandResponse::decode(&reply)
            }
            Err(DcsError::UnknownHost(host)) => {
                error!("[{}] Unknown host: {}", dcs.name(), host);
                CommandResponse::with_result(request.pairs(), ResultCode::UnknownHost)
            }
            Err(e) => {
                error!("[{}] Unable to send command: {}", dcs.name(), e);
                CommandResponse::with_result(request.pairs(), ResultCode::TransmitFail)
            }
        }
    }

    /// Write `line` and read back one reply line
    ///
    /// The stream is dropped, and so closed, on every return path.
    fn exchange(&self, host: &str, port: u16, line: &str) -> Result<String> {
        let address = resolve_address(host, port)?;
        let mut stream = TcpStream::connect_timeout(&address, self.timeout)
            .map_err(|e| DcsError::Transmit(format!("{}: {}", address, e)))?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;

        stream.write_all(line.as_bytes())?;
        stream.write_all(b"\n")?;
        stream.flush()?;

        let mut reply = String::new();
        let read = BufReader::new((&stream).take(MAX_LINE_LENGTH as u64)).read_line(&mut reply)?;
        if read == 0 {
            return Err(DcsError::Transmit("connection closed without reply".to_string()));
        }
        Ok(reply)
    }
}

fn resolve_address(host: &str, port: u16) -> Result<SocketAddr> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|_| DcsError::UnknownHost(host.to_string()))?;
    addrs
        .next()
        .ok_or_else(|| DcsError::UnknownHost(host.to_string()))
}
