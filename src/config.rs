//! Process configuration
//!
//! Every flag can also be set through the environment.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_LOG_FILTER: &str = "noisegen=info,noise_core=info,noise_senders=info";

#[derive(Parser, Debug, Clone)]
#[command(name = "noisegen", version, about = "Security log noise generator")]
pub struct Cli {
    /// Address the REST API listens on
    #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0:8090")]
    pub bind_address: SocketAddr,

    /// JSON file holding destinations and the last noise configuration
    #[arg(long, env = "NOISEGEN_DATA_FILE", default_value = "noisegen.json")]
    pub data_file: PathBuf,

    /// Resume the saved noise configuration on boot
    #[arg(long, env = "NOISEGEN_AUTOSTART")]
    pub autostart: bool,

    /// Per-request timeout for HEC destinations, in seconds
    #[arg(long, env = "NOISEGEN_HEC_TIMEOUT_SECS", default_value_t = 10)]
    pub hec_timeout_secs: u64,
}

impl Cli {
    pub fn hec_timeout(&self) -> Duration {
        Duration::from_secs(self.hec_timeout_secs.max(1))
    }
}
