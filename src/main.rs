// rackdirector binary: loads inventory and templates, then serves network boot
use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use rackdirector_bmc::{IpmiTool, IpmiToolConfig};
use rackdirector_dhcp::DhcpConfig;
use rackdirector_inventory::HostDirectory;
use rackdirector_provision::{
    BootAssets, ContentSettings, PlanCatalog, PlanRegistry, ProvisioningService,
};
use rackdirector_server::{ServerConfig, ServicesConfig, TftpServiceConfig};
use std::io::stderr;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Bare metal provisioning over network boot", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output - shows more detailed logs
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the DHCP, TFTP and HTTP servers
    Serve(ServeArgs),
    /// Load inventory, templates and plans, report, and exit
    Check(SourceArgs),
}

/// Inputs shared by `serve` and `check`
#[derive(Args, Debug)]
struct SourceArgs {
    /// Host inventory (JSON)
    #[arg(long, env = "RACKDIRECTOR_INVENTORY", default_value = "hosts.json")]
    inventory: PathBuf,

    /// Directory of `*.template` files
    #[arg(long, env = "RACKDIRECTOR_TEMPLATES", default_value = "templates")]
    templates: PathBuf,

    /// Plan catalog (YAML); built-in plans when absent
    #[arg(long, env = "RACKDIRECTOR_PLANS")]
    plans: Option<PathBuf>,

    /// Address of this server, advertised in DHCP and templates
    #[arg(long, env = "RACKDIRECTOR_SERVER", default_value = "10.0.1.10")]
    server: Ipv4Addr,

    /// OS mirror address handed to templates
    #[arg(long, env = "RACKDIRECTOR_OS_SERVER", default_value = "192.168.0.10")]
    os_server: Ipv4Addr,

    /// DNS resolvers
    #[arg(long, env = "RACKDIRECTOR_DNS", value_delimiter = ',', default_value = "1.1.1.1")]
    dns: Vec<Ipv4Addr>,
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// HTTP listen port
    #[arg(long, env = "RACKDIRECTOR_HTTP_PORT", default_value_t = 80)]
    http_port: u16,

    /// Static boot loader files served over HTTP
    #[arg(long, env = "RACKDIRECTOR_HTTP_DIR", default_value = "http")]
    http_dir: PathBuf,

    /// Boot loader files served over TFTP
    #[arg(long, env = "RACKDIRECTOR_TFTP_DIR", default_value = "tftp")]
    tftp_dir: PathBuf,

    /// Do not start the DHCP responder
    #[arg(long, env = "RACKDIRECTOR_NO_DHCP", default_value_t = false)]
    no_dhcp: bool,

    /// Do not start the TFTP server
    #[arg(long, env = "RACKDIRECTOR_NO_TFTP", default_value_t = false)]
    no_tftp: bool,

    /// BMC username
    #[arg(long, env = "RACKDIRECTOR_BMC_USERNAME", default_value = "ADMIN")]
    bmc_username: String,

    /// BMC password
    #[arg(long, env = "RACKDIRECTOR_BMC_PASSWORD", default_value = "ADMIN", hide_env_values = true)]
    bmc_password: String,

    /// ipmitool binary
    #[arg(long, env = "RACKDIRECTOR_IPMITOOL", default_value = "ipmitool")]
    ipmitool: String,

    /// Power cycle timeout in seconds
    #[arg(long, env = "RACKDIRECTOR_POWER_TIMEOUT", default_value_t = 60)]
    power_timeout: u64,
}

/// Everything loaded from disk before any listener starts
struct Loaded {
    directory: HostDirectory,
    catalog: PlanCatalog,
    assets: BootAssets,
}

fn load(args: &SourceArgs) -> Result<Loaded> {
    let directory = HostDirectory::from_file(&args.inventory)
        .wrap_err_with(|| format!("Failed to load inventory {}", args.inventory.display()))?;

    let catalog = match &args.plans {
        Some(path) => PlanCatalog::from_file(path)
            .wrap_err_with(|| format!("Failed to load plan catalog {}", path.display()))?,
        None => PlanCatalog::default(),
    };

    let settings = ContentSettings::default()
        .with_server(args.server)
        .with_os_server(args.os_server)
        .with_dns(args.dns.clone());
    let assets = BootAssets::from_dir(&args.templates, settings)
        .wrap_err_with(|| format!("Failed to load templates from {}", args.templates.display()))?;

    Ok(Loaded {
        directory,
        catalog,
        assets,
    })
}

fn check(args: &SourceArgs) -> Result<()> {
    let loaded = load(args)?;

    println!("inventory: {} hosts", loaded.directory.len());
    for host in loaded.directory.hosts() {
        let primary = host
            .primary_address()
            .map(|a| a.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("  {} {} (bmc {})", host.hostname, primary, host.bmc.hostname);
    }

    println!("plans:");
    for name in loaded.catalog.names() {
        let stages = loaded.catalog.stages(name).unwrap_or_default();
        let missing: Vec<&str> = stages
            .iter()
            .filter(|stage| stage.starts_with("install-"))
            .filter(|stage| {
                !loaded
                    .assets
                    .template_names()
                    .contains(&format!("{}.template", stage))
            })
            .map(String::as_str)
            .collect();
        if missing.is_empty() {
            println!("  {}: {}", name, stages.join(" -> "));
        } else {
            println!(
                "  {}: {} (missing templates for {})",
                name,
                stages.join(" -> "),
                missing.join(", ")
            );
        }
    }

    println!("templates: {}", loaded.assets.template_names().join(", "));
    Ok(())
}

async fn serve(args: ServeArgs) -> Result<()> {
    let Loaded {
        directory,
        catalog,
        assets,
    } = load(&args.source)?;
    info!(hosts = directory.len(), "Inventory loaded");

    let power = IpmiTool::new(
        IpmiToolConfig::new(args.bmc_username, args.bmc_password)
            .with_program(args.ipmitool)
            .with_timeout(Duration::from_secs(args.power_timeout)),
    );
    let service = Arc::new(ProvisioningService::new(
        Arc::new(directory),
        Arc::new(PlanRegistry::new(catalog)),
        Arc::new(power),
        assets,
    ));

    let server_ip = args.source.server;
    let services = ServicesConfig {
        dhcp: (!args.no_dhcp)
            .then(|| DhcpConfig::new(server_ip).with_dns_servers(args.source.dns.clone())),
        tftp: (!args.no_tftp).then(|| TftpServiceConfig {
            base_dir: args.tftp_dir.clone(),
            ..Default::default()
        }),
    };
    let config = ServerConfig {
        http_addr: SocketAddr::from(([0, 0, 0, 0], args.http_port)),
        http_dir: args.http_dir,
        services,
    };

    rackdirector_server::run(config, service)
        .await
        .map_err(|e| color_eyre::eyre::eyre!("{:#}", e))
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let default_directives = format!(
        "rackdirector={level},rackdirector_inventory={level},rackdirector_dhcp={level},rackdirector_tftp={level},rackdirector_bmc={level},rackdirector_provision={level},rackdirector_server={level},tower=warn,hyper=warn,h2=warn,mio=warn",
        level = default_level
    );
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));
    registry()
        .with(filter)
        .with(fmt::layer().with_writer(stderr))
        .init();

    match cli.command {
        Commands::Serve(args) => serve(args).await,
        Commands::Check(args) => check(&args),
    }
}
