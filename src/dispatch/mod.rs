//! Remote command dispatch
//!
//! Client and listener sides of the line-oriented command protocol spoken
//! between the platform and a running DCS.

pub mod client;
pub mod listener;
pub mod protocol;
pub mod result;

pub use client::CommandDispatchClient;
pub use listener::{CommandEvaluator, CommandListener, PendingCommand, PendingQueue};
pub use protocol::CommandRequest;
pub use result::{CommandResponse, ResultCode, is_command_result_ok};
