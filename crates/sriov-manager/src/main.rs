use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use sriov_manager::app::ApplicationBuilder;
use sriov_manager::config::Cli;
use sriov_manager::config::Commands;
use sriov_manager::config::DaemonArgs;
use sriov_manager::config::HostArgs;
use sriov_manager::config::NodeSettings;
use sriov_manager::sriov::validate_capabilities;
use utils::logging;
use utils::version;

/// Sets up global panic hooks.
fn setup_global_hooks() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_global_hooks();

    let cli = Cli::parse();

    match cli.command {
        Commands::Daemon(daemon_args) => run_daemon(*daemon_args).await,
        Commands::Validate(host_args) => run_validate(host_args),
        Commands::Discover(host_args) => run_discover(host_args),
    }
}

async fn run_daemon(daemon_args: DaemonArgs) -> Result<()> {
    let _guard =
        logging::init(daemon_args.log_file.as_deref()).context("failed to initialize logging")?;

    tracing::info!("Starting sriov-manager daemon {}", &**version::VERSION);

    let settings = NodeSettings::resolve(&daemon_args)
        .map_err(|e| anyhow::anyhow!("{e:?}"))
        .context("invalid configuration")?;

    let app = ApplicationBuilder::new(settings).build().await?;

    app.run().await?;
    app.shutdown().await?;

    Ok(())
}

fn run_validate(host_args: HostArgs) -> Result<()> {
    let _guard = logging::init(None).context("failed to initialize logging")?;

    let devices = validate_capabilities(&host_args.sysfs_root)
        .map_err(|e| anyhow::anyhow!("{e:?}"))
        .context("SR-IOV capability check failed")?;

    for device in &devices {
        tracing::info!("SR-IOV capable: {}", device.display());
    }
    tracing::info!(device_count = devices.len(), "SR-IOV capability check passed");
    Ok(())
}

fn run_discover(host_args: HostArgs) -> Result<()> {
    let _guard = logging::init(None).context("failed to initialize logging")?;

    let vfs = host_args
        .prober()
        .discover()
        .map_err(|e| anyhow::anyhow!("{e:?}"))
        .context("VF discovery failed")?;

    println!("{}", serde_json::to_string_pretty(&vfs)?);
    Ok(())
}
