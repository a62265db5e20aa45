//! # noise-senders - Destination Transports
//!
//! [`Sender`](noise_core::Sender) implementations for the supported
//! destination kinds:
//!
//! - **syslog**: UDP datagrams or newline-framed TCP, RFC 5424 or RFC 3164
//! - **hec**: Splunk HTTP Event Collector over HTTPS
//! - **file**: local file with size-based rotation
//!
//! [`DestinationSenderFactory`] picks the right one for a destination.

pub mod factory;
pub mod file;
pub mod hec;
pub mod syslog;

pub use factory::DestinationSenderFactory;
pub use file::FileSender;
pub use hec::{HecConfig, HecSender};
pub use syslog::SyslogSender;
