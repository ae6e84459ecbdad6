use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rtnl-cli", about = "Configure links and addresses via the kernel's rtnetlink protocol")]
struct Cli {
	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand)]
enum Command {
	/// List every interface known to the kernel.
	ListLinks,
	/// Create a bridge interface.
	CreateBridge { name: String },
	/// Create a veth pair.
	CreateVeth { name: String, peer: String },
	/// Delete an interface.
	DeleteLink { name: String },
	/// Bring an interface up.
	Up { name: String },
	/// Bring an interface down.
	Down { name: String },
	/// Report whether an interface is up.
	IsUp { name: String },
	/// Assign an IPv4 address, e.g. `172.17.43.1/26`.
	AddAddress { name: String, cidr: String },
}

fn main() -> Result<()> {
	let cli = Cli::parse();

	match cli.command {
		Command::ListLinks => {
			for (index, name) in rtnl::list_links(None)? {
				println!("{index}: {name}");
			}
		}
		Command::CreateBridge { name } => rtnl::create_bridge(&name)?,
		Command::CreateVeth { name, peer } => rtnl::create_veth(&name, &peer)?,
		Command::DeleteLink { name } => rtnl::delete_link(&name)?,
		Command::Up { name } => rtnl::set_link_up(&name)?,
		Command::Down { name } => rtnl::set_link_down(&name)?,
		Command::IsUp { name } => println!("{}", rtnl::is_up(&name)?),
		Command::AddAddress { name, cidr } => {
			let (ip, prefix_len) = parse_cidr(&cidr)?;
			rtnl::assign_ipv4_address(&name, ip, prefix_len)?;
		}
	}

	Ok(())
}

fn parse_cidr(s: &str) -> Result<(std::net::Ipv4Addr, u8)> {
	let (ip, prefix) = s
		.split_once('/')
		.ok_or_else(|| anyhow::anyhow!("expected address in CIDR form, e.g. 172.17.43.1/26"))?;
	Ok((ip.parse()?, prefix.parse()?))
}
