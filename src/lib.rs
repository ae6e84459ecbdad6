//! High-level convenience wrapper over `rtnl-core`: name↔index resolution,
//! bridge/veth creation, address assignment, and link up/down, the way the
//! original `net` package wrapped its `rtnetlink` package.
//!
//! This is an external collaborator, not the protocol engine. Every
//! operation here is a thin composition of `rtnl_core::route` calls.

use std::net::Ipv4Addr;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use rtnl_core::constants::{IFF_UP, IFLA_IFNAME, IF_NAMESIZE};
use rtnl_core::link::LinkMessage;
use rtnl_core::route;

/// The longest interface name the kernel will accept, NUL terminator
/// excluded.
const MAX_IF_NAME_LEN: usize = IF_NAMESIZE - 1;

fn check_if_name(name: &str) -> Result<()> {
	if name.is_empty() {
		bail!("empty interface name");
	}
	if name.len() > MAX_IF_NAME_LEN {
		bail!("interface name '{}' too long", name);
	}
	Ok(())
}

/// Looks up the index of the interface named `name` by dumping every link
/// and scanning for a matching `IFLA_IFNAME` attribute.
pub fn if_index(name: &str) -> Result<i32> {
	let links = route::get_links(None)?;
	for link in &links {
		if let Some(attr) = link.attrs.get(IFLA_IFNAME) {
			if attr.as_string()? == name {
				return Ok(link.index);
			}
		}
	}
	Err(anyhow!("interface '{}' not found", name))
}

/// Creates a bridge interface named `name`.
pub fn create_bridge(name: &str) -> Result<()> {
	check_if_name(name)?;
	route::create_link(&route::bridge_link(name), None)?;
	Ok(())
}

/// Creates a veth pair; `name` and `peer` become each other's link partners.
pub fn create_veth(name: &str, peer: &str) -> Result<()> {
	check_if_name(name)?;
	check_if_name(peer)?;
	route::create_link(&route::veth_link(name, peer), None)?;
	Ok(())
}

/// Removes the named interface.
pub fn delete_link(name: &str) -> Result<()> {
	let idx = if_index(name)?;
	route::delete_link(idx, None)?;
	Ok(())
}

/// Reports whether the named interface currently has `IFF_UP` set.
///
/// `(flags & IFF_UP) != 0`, not `== 1`: `IFF_UP`'s bit position makes the
/// equality-with-one test wrong for every flag value except exactly 1.
pub fn is_up(name: &str) -> Result<bool> {
	let idx = if_index(name)?;
	let link = route::get_link(idx, None)?;
	Ok((link.flags & IFF_UP as u32) != 0)
}

fn set_up_flag(name: &str, up: bool) -> Result<()> {
	let idx = if_index(name)?;
	let mut link = LinkMessage::new();
	link.index = idx;
	link.change = IFF_UP as u32;
	link.flags = if up { IFF_UP as u32 } else { 0 };
	route::modify_link(&link, None)?;
	Ok(())
}

/// Brings the named interface up.
pub fn set_link_up(name: &str) -> Result<()> {
	set_up_flag(name, true)
}

/// Brings the named interface down.
pub fn set_link_down(name: &str) -> Result<()> {
	set_up_flag(name, false)
}

/// Assigns an IPv4 address to the named interface.
pub fn assign_ipv4_address(name: &str, ip: Ipv4Addr, prefix_len: u8) -> Result<()> {
	let idx = if_index(name)?;
	route::assign_ipv4_address(idx, ip, prefix_len, None)?;
	Ok(())
}

/// Lists every interface currently known to the kernel as `(index, name)`
/// pairs, with an optional deadline on the underlying dump.
pub fn list_links(deadline: Option<Duration>) -> Result<Vec<(i32, String)>> {
	let links = route::get_links(deadline)?;
	links
		.iter()
		.map(|link| {
			let name = link
				.attrs
				.get(IFLA_IFNAME)
				.ok_or_else(|| anyhow!("link {} has no IFLA_IFNAME attribute", link.index))?
				.as_string()?;
			Ok((link.index, name))
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejects_empty_name() {
		assert!(check_if_name("").is_err());
	}

	#[test]
	fn rejects_name_longer_than_fifteen_bytes() {
		assert!(check_if_name("0123456789ABCDEF").is_err());
		assert!(check_if_name("0123456789ABCDE").is_ok());
	}
}
