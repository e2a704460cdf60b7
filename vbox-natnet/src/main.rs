use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tabled::{Table, Tabled};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use vbox_natnet::config::resolve_vboxmanage;
use vbox_natnet::{CommandRunner, NatNet, NatNetManager};

#[derive(Parser)]
#[command(name = "vbox-natnet")]
#[command(about = "Manage VirtualBox NAT networks", long_about = None)]
struct Cli {
    /// Path to the VBoxManage executable
    #[arg(long, env = "VBOXMANAGE")]
    vboxmanage: Option<PathBuf>,

    /// Log executed VBoxManage commands
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all NAT networks
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show a single NAT network
    Show {
        /// Network name
        name: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Create a NAT network
    Create {
        /// Network name
        name: String,

        /// IPv4 network in CIDR notation, e.g. 10.0.123.0/24
        cidr: String,

        /// Built-in DHCP server
        #[arg(long, value_enum, default_value_t = Switch::Off)]
        dhcp: Switch,

        /// IPv6 support
        #[arg(long, value_enum, default_value_t = Switch::Off)]
        ipv6: Switch,
    },

    /// Delete a NAT network
    Delete {
        /// Network name
        name: String,
    },

    /// Change DHCP or IPv6 settings of a NAT network
    Update {
        /// Network name
        name: String,

        /// Built-in DHCP server
        #[arg(long, value_enum)]
        dhcp: Option<Switch>,

        /// IPv6 support
        #[arg(long, value_enum)]
        ipv6: Option<Switch>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Switch {
    On,
    Off,
}

impl From<Switch> for bool {
    fn from(s: Switch) -> Self {
        matches!(s, Switch::On)
    }
}

#[derive(Tabled)]
struct NatNetRow {
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "GATEWAY")]
    gateway: String,
    #[tabled(rename = "NETWORK")]
    network: String,
    #[tabled(rename = "IPV6 PREFIX")]
    ipv6_prefix: String,
    #[tabled(rename = "DHCP")]
    dhcp: String,
    #[tabled(rename = "IPV6")]
    ipv6: String,
    #[tabled(rename = "ENABLED")]
    enabled: String,
}

impl From<&NatNet> for NatNetRow {
    fn from(net: &NatNet) -> Self {
        Self {
            name: net.name.clone(),
            gateway: opt(net.ipv4_address),
            network: opt(net.ipv4_network),
            ipv6_prefix: opt(net.ipv6_network),
            dhcp: yes_no(net.dhcp_enabled),
            ipv6: yes_no(net.ipv6_enabled),
            enabled: yes_no(net.enabled),
        }
    }
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

fn yes_no(flag: bool) -> String {
    let s = if flag { "yes" } else { "no" };
    s.to_string()
}

fn print_natnet(net: &NatNet) {
    println!("Name:        {}", net.name);
    println!("Gateway:     {}", opt(net.ipv4_address));
    println!("Network:     {}", opt(net.ipv4_network));
    println!("Netmask:     {}", opt(net.ipv4_mask()));
    println!("IPv6 Prefix: {}", opt(net.ipv6_network));
    println!("DHCP:        {}", yes_no(net.dhcp_enabled));
    println!("IPv6:        {}", yes_no(net.ipv6_enabled));
    println!("Enabled:     {}", yes_no(net.enabled));
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let directive = if cli.verbose {
        "vbox_natnet=debug"
    } else {
        "vbox_natnet=info"
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .init();

    let program = resolve_vboxmanage(cli.vboxmanage.as_deref());
    debug!(vboxmanage = %program.display(), "Using VBoxManage");
    let manager = NatNetManager::new(CommandRunner::new(program));

    match cli.command {
        Commands::List { json } => {
            let nets = manager
                .natnets()
                .await
                .context("Failed to list NAT networks")?;

            if json {
                let list: Vec<&NatNet> = nets.values().collect();
                println!("{}", serde_json::to_string_pretty(&list)?);
            } else if nets.is_empty() {
                println!("No NAT networks found");
            } else {
                let rows: Vec<NatNetRow> = nets.values().map(NatNetRow::from).collect();
                println!("{}", Table::new(rows));
            }
        }

        Commands::Show { name, json } => {
            let Some(net) = manager
                .natnet(&name)
                .await
                .context("Failed to list NAT networks")?
            else {
                bail!("NAT network not found: {}", name);
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&net)?);
            } else {
                print_natnet(&net);
            }
        }

        Commands::Create {
            name,
            cidr,
            dhcp,
            ipv6,
        } => {
            let net = manager
                .create_natnet(&name, &cidr, dhcp.into(), ipv6.into())
                .await
                .with_context(|| format!("Failed to create NAT network {}", name))?;

            if net.name.is_empty() {
                bail!("NAT network {} was added but is not listed by VBoxManage", name);
            }
            println!("Created NAT network: {}", net.name);
        }

        Commands::Delete { name } => {
            manager
                .delete_natnet(&name)
                .await
                .with_context(|| format!("Failed to delete NAT network {}", name))?;
            println!("Deleted NAT network: {}", name);
        }

        Commands::Update { name, dhcp, ipv6 } => {
            let Some(mut net) = manager
                .natnet(&name)
                .await
                .context("Failed to list NAT networks")?
            else {
                bail!("NAT network not found: {}", name);
            };

            if let Some(dhcp) = dhcp {
                net.dhcp_enabled = dhcp.into();
            }
            if let Some(ipv6) = ipv6 {
                net.ipv6_enabled = ipv6.into();
            }

            manager
                .update(&net)
                .await
                .with_context(|| format!("Failed to update NAT network {}", name))?;
            println!(
                "Updated NAT network: {} (dhcp: {}, ipv6: {})",
                name,
                yes_no(net.dhcp_enabled),
                yes_no(net.ipv6_enabled)
            );
        }
    }

    Ok(())
}
