use clap::Parser;
use clap::Subcommand;
use utils::version;

use crate::config::daemon::DaemonArgs;
use crate::config::host::HostArgs;

#[derive(Parser)]
#[command(about, long_about, version = &**version::VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the SR-IOV manager daemon
    Daemon(Box<DaemonArgs>),
    /// Check that the host exposes SR-IOV capable devices
    Validate(HostArgs),
    /// Discover VFs once and print them as JSON
    Discover(HostArgs),
}
