use std::{net::SocketAddr, time::Duration};

use clap::Parser;

use crate::{
    fee::FeeSchedule,
    server::{ServerConfig, DEFAULT_MAX_CONNECTIONS, DEFAULT_SHUTDOWN_GRACE},
};

/// Collects toll booth reports and charges the vehicles leaving the highway.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Socket address the collector should bind to. Use port 0 for an ephemeral port.
    #[arg(long, default_value = "0.0.0.0:31199")]
    pub listen: SocketAddr,

    /// Close a booth connection after this many seconds without any data.
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub read_timeout: Option<u64>,

    /// Maximum number of booths served at the same time.
    #[arg(long, default_value_t = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: usize,

    /// Seconds open connections may keep running once shutdown was requested.
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_SHUTDOWN_GRACE.as_secs())]
    pub shutdown_grace: u64,

    /// Flat fee charged for every trip.
    #[arg(long, default_value_t = FeeSchedule::default().base_fee)]
    pub base_fee: i64,

    /// Fee charged for every booth between the entry and the exit.
    #[arg(long, default_value_t = FeeSchedule::default().per_booth_rate)]
    pub per_booth_rate: i64,

    /// Fee charged for every minute spent on the highway.
    #[arg(long, default_value_t = FeeSchedule::default().per_minute_rate)]
    pub per_minute_rate: i64,
}

impl Cli {
    pub fn fee_schedule(&self) -> FeeSchedule {
        FeeSchedule {
            base_fee: self.base_fee,
            per_booth_rate: self.per_booth_rate,
            per_minute_rate: self.per_minute_rate,
        }
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            read_timeout: self.read_timeout.map(Duration::from_secs),
            max_connections: self.max_connections,
            shutdown_grace: Duration::from_secs(self.shutdown_grace),
        }
    }
}
