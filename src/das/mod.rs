//! DAS terminal command protocol
//!
//! - `command`: builders for every outbound command line
//! - `reply`: raw replies and the header-row reshape
//! - `parsers`: typed rows pulled out of replies
//! - `session`: login and the send-settle-drain cycle
//! - `transport`: TCP and scripted byte transports

pub mod command;
pub mod parsers;
pub mod reply;
pub mod session;
pub mod transport;

pub use command::{Command, Level, Subscription};
pub use reply::{Reply, Table};
pub use session::{Session, SessionState};
pub use transport::{ScriptedTransport, StreamTransport, TcpTransport};
