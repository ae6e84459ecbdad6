//! Route-family operations: composes typed link and address records with the
//! transport's request/request_ack engine.

use std::net::Ipv4Addr;
use std::time::Duration;

use crate::addr::AddressMessage;
use crate::attr::{Attribute, AttributeList, Encode};
use crate::constants::{
	AF_UNSPEC, IFA_ADDRESS, IFA_BROADCAST, IFA_LOCAL, IFLA_IFNAME, IFLA_INFO_DATA, IFLA_INFO_KIND,
	NLM_F_ACK, NLM_F_CREATE, NLM_F_DUMP, NLM_F_EXCL, NLM_F_REQUEST, RTM_DELLINK, RTM_GETADDR,
	RTM_GETLINK, RTM_NEWADDR, RTM_NEWLINK, VETH_INFO_PEER,
};
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::link::LinkMessage;
use crate::transport::{self, Endpoint};

const REQUEST: u16 = NLM_F_REQUEST as u16;
const ACK: u16 = NLM_F_ACK as u16;
const DUMP: u16 = NLM_F_DUMP as u16;
const CREATE: u16 = NLM_F_CREATE as u16;
const EXCL: u16 = NLM_F_EXCL as u16;

/// Dumps every link.
pub fn get_links(deadline: Option<Duration>) -> Result<Vec<LinkMessage>> {
	let ep = crate::transport::Socket::open(deadline)?;
	get_links_with(&ep)
}

pub(crate) fn get_links_with<E: Endpoint>(ep: &E) -> Result<Vec<LinkMessage>> {
	let req = LinkMessage::new();
	let frame = Frame::new(RTM_GETLINK, REQUEST | DUMP, 1, 0, req.encode()?);
	let replies = transport::request_with(ep, frame)?;
	decode_links(replies)
}

/// Fetches a single link by index.
pub fn get_link(index: i32, deadline: Option<Duration>) -> Result<LinkMessage> {
	let ep = crate::transport::Socket::open(deadline)?;
	get_link_with(&ep, index)
}

pub(crate) fn get_link_with<E: Endpoint>(ep: &E, index: i32) -> Result<LinkMessage> {
	let mut req = LinkMessage::new();
	req.family = AF_UNSPEC as u8;
	req.index = index;
	let frame = Frame::new(RTM_GETLINK, REQUEST, 1, 0, req.encode()?);
	let replies = transport::request_with(ep, frame)?;
	match replies.as_slice() {
		[only] if !only.is_ack() && !only.is_error() => LinkMessage::decode(&only.payload),
		[only] if only.is_ack() => Err(Error::Protocol(
			"unexpected acknowledgement in place of link data".into(),
		)),
		other => Err(Error::Protocol(format!(
			"expected exactly one reply frame, got {}",
			other.len()
		))),
	}
}

/// Issues `RTM_NEWLINK` with create|exclusive semantics.
pub fn create_link(link: &LinkMessage, deadline: Option<Duration>) -> Result<()> {
	let ep = crate::transport::Socket::open(deadline)?;
	create_link_with(&ep, link)
}

pub(crate) fn create_link_with<E: Endpoint>(ep: &E, link: &LinkMessage) -> Result<()> {
	let frame = Frame::new(RTM_NEWLINK, REQUEST | ACK | CREATE | EXCL, 1, 0, link.encode()?);
	transport::request_ack_with(ep, frame)
}

/// Issues `RTM_NEWLINK` without create/exclusive semantics, for flag/attribute
/// modification of an existing link.
pub fn modify_link(link: &LinkMessage, deadline: Option<Duration>) -> Result<()> {
	let ep = crate::transport::Socket::open(deadline)?;
	modify_link_with(&ep, link)
}

pub(crate) fn modify_link_with<E: Endpoint>(ep: &E, link: &LinkMessage) -> Result<()> {
	let frame = Frame::new(RTM_NEWLINK, REQUEST | ACK, 1, 0, link.encode()?);
	transport::request_ack_with(ep, frame)
}

/// Deletes the link at `index`.
pub fn delete_link(index: i32, deadline: Option<Duration>) -> Result<()> {
	let ep = crate::transport::Socket::open(deadline)?;
	delete_link_with(&ep, index)
}

pub(crate) fn delete_link_with<E: Endpoint>(ep: &E, index: i32) -> Result<()> {
	let mut req = LinkMessage::new();
	req.family = AF_UNSPEC as u8;
	req.index = index;
	let frame = Frame::new(RTM_DELLINK, REQUEST | ACK, 1, 0, req.encode()?);
	transport::request_ack_with(ep, frame)
}

/// Builds the attribute set for a bridge creation request: `IFNAME` plus
/// `LINKINFO{INFO_KIND="bridge"}`.
pub fn bridge_link(name: &str) -> LinkMessage {
	let mut link = LinkMessage::new();
	link.attrs.add(Attribute::new_string(IFLA_IFNAME, name));

	let mut link_info = AttributeList::new();
	link_info.add(Attribute::new_string(IFLA_INFO_KIND, "bridge"));
	link.attrs.add(Attribute::new_nested(crate::constants::IFLA_LINKINFO, &link_info).unwrap());
	link
}

/// Builds the attribute set for a veth pair creation request: the kernel
/// creates both halves atomically from a single `NEW_LINK` request.
pub fn veth_link(name: &str, peer_name: &str) -> LinkMessage {
	let mut link = LinkMessage::new();
	link.attrs.add(Attribute::new_string(IFLA_IFNAME, name));

	let mut peer = LinkMessage::new();
	peer.attrs.add(Attribute::new_string(IFLA_IFNAME, peer_name));

	let mut info_data = AttributeList::new();
	info_data.add(Attribute::new_nested(VETH_INFO_PEER, &peer).unwrap());

	let mut link_info = AttributeList::new();
	link_info.add(Attribute::new_string(IFLA_INFO_KIND, "veth"));
	link_info.add(Attribute::new_nested(IFLA_INFO_DATA, &info_data).unwrap());

	link.attrs.add(Attribute::new_nested(crate::constants::IFLA_LINKINFO, &link_info).unwrap());
	link
}

/// Dumps every address.
pub fn get_addrs(deadline: Option<Duration>) -> Result<Vec<AddressMessage>> {
	let ep = crate::transport::Socket::open(deadline)?;
	get_addrs_with(&ep)
}

pub(crate) fn get_addrs_with<E: Endpoint>(ep: &E) -> Result<Vec<AddressMessage>> {
	let req = AddressMessage::new();
	let frame = Frame::new(RTM_GETADDR, REQUEST | DUMP, 1, 0, req.encode()?);
	let replies = transport::request_with(ep, frame)?;
	decode_addrs(replies)
}

/// Assigns an IPv4 address to a link. The broadcast address is computed as
/// `ip | !mask`.
pub fn assign_ipv4_address(
	index: i32,
	ip: Ipv4Addr,
	prefix_len: u8,
	deadline: Option<Duration>,
) -> Result<()> {
	let ep = crate::transport::Socket::open(deadline)?;
	assign_ipv4_address_with(&ep, index, ip, prefix_len)
}

pub(crate) fn assign_ipv4_address_with<E: Endpoint>(
	ep: &E,
	index: i32,
	ip: Ipv4Addr,
	prefix_len: u8,
) -> Result<()> {
	let mut addr = AddressMessage::new();
	addr.family = libc::AF_INET as u8;
	addr.prefix_len = prefix_len;
	addr.index = index;

	let octets = u32::from(ip);
	let mask: u32 = if prefix_len == 0 { 0 } else { u32::MAX << (32 - prefix_len) };
	let broadcast = Ipv4Addr::from(octets | !mask);

	addr.attrs.add(Attribute::new_bytes(IFA_ADDRESS, ip.octets().to_vec()));
	addr.attrs.add(Attribute::new_bytes(IFA_LOCAL, ip.octets().to_vec()));
	addr.attrs.add(Attribute::new_bytes(IFA_BROADCAST, broadcast.octets().to_vec()));

	let frame = Frame::new(RTM_NEWADDR, REQUEST | ACK | CREATE | EXCL, 1, 0, addr.encode()?);
	transport::request_ack_with(ep, frame)
}

fn decode_links(replies: Vec<Frame>) -> Result<Vec<LinkMessage>> {
	replies
		.into_iter()
		.map(|f| {
			if f.is_ack() || f.is_error() {
				return Err(Error::Protocol("unexpected acknowledgement in a link dump".into()));
			}
			LinkMessage::decode(&f.payload)
		})
		.collect()
}

fn decode_addrs(replies: Vec<Frame>) -> Result<Vec<AddressMessage>> {
	replies
		.into_iter()
		.map(|f| {
			if f.is_ack() || f.is_error() {
				return Err(Error::Protocol("unexpected acknowledgement in an address dump".into()));
			}
			AddressMessage::decode(&f.payload)
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::constants::{IFLA_LINKINFO, NLMSG_DONE, NLMSG_ERROR, NLM_F_MULTI};
	use crate::transport::test_support::MockEndpoint;
	use byteorder::{NativeEndian, WriteBytesExt};

	fn ack() -> Vec<u8> {
		let mut payload = Vec::new();
		payload.write_i32::<NativeEndian>(0).unwrap();
		Frame::new(NLMSG_ERROR as u16, 0, 1, 0, payload).encode().unwrap()
	}

	fn error(code: i32) -> Vec<u8> {
		let mut payload = Vec::new();
		payload.write_i32::<NativeEndian>(code).unwrap();
		Frame::new(NLMSG_ERROR as u16, 0, 1, 0, payload).encode().unwrap()
	}

	fn padded(frame: Frame) -> Vec<u8> {
		let mut buf = frame.encode().unwrap();
		let pad = crate::align::align_msg(buf.len()) - buf.len();
		buf.extend(std::iter::repeat_n(0u8, pad));
		buf
	}

	#[test]
	fn create_bridge_sends_ifname_and_linkinfo_and_succeeds_on_ack() {
		let ep = MockEndpoint::new(1, vec![ack()]);
		let link = bridge_link("test_bridge");
		create_link_with(&ep, &link).unwrap();

		let sent = ep.sent.borrow();
		let (frames, _) = Frame::decode_stream(&sent[0]).unwrap();
		assert_eq!(frames[0].msg_type, RTM_NEWLINK);
		assert_eq!(frames[0].flags, REQUEST | ACK | CREATE | EXCL);

		let decoded = LinkMessage::decode(&frames[0].payload).unwrap();
		assert_eq!(decoded.attrs.get(IFLA_IFNAME).unwrap().as_string().unwrap(), "test_bridge");
		let info = decoded.attrs.get(IFLA_LINKINFO).unwrap().as_nested().unwrap();
		assert_eq!(info.get(IFLA_INFO_KIND).unwrap().as_string().unwrap(), "bridge");
	}

	#[test]
	fn create_veth_nests_peer_link_record() {
		let ep = MockEndpoint::new(1, vec![ack()]);
		let link = veth_link("test_veth0", "test_veth1");
		create_link_with(&ep, &link).unwrap();

		let sent = ep.sent.borrow();
		let (frames, _) = Frame::decode_stream(&sent[0]).unwrap();
		let decoded = LinkMessage::decode(&frames[0].payload).unwrap();
		assert_eq!(decoded.attrs.get(IFLA_IFNAME).unwrap().as_string().unwrap(), "test_veth0");

		let info = decoded.attrs.get(IFLA_LINKINFO).unwrap().as_nested().unwrap();
		assert_eq!(info.get(IFLA_INFO_KIND).unwrap().as_string().unwrap(), "veth");
		let info_data = info.get(IFLA_INFO_DATA).unwrap().as_nested().unwrap();
		let peer = info_data.get(VETH_INFO_PEER).unwrap();
		let peer_link = LinkMessage::decode(peer.as_bytes()).unwrap();
		assert_eq!(peer_link.attrs.get(IFLA_IFNAME).unwrap().as_string().unwrap(), "test_veth1");
	}

	#[test]
	fn assign_ipv4_address_computes_broadcast() {
		let ep = MockEndpoint::new(1, vec![ack()]);
		assign_ipv4_address_with(&ep, 7, "172.17.43.1".parse().unwrap(), 26).unwrap();

		let sent = ep.sent.borrow();
		let (frames, _) = Frame::decode_stream(&sent[0]).unwrap();
		assert_eq!(frames[0].msg_type, RTM_NEWADDR);
		let decoded = AddressMessage::decode(&frames[0].payload).unwrap();
		assert_eq!(decoded.family, libc::AF_INET as u8);
		assert_eq!(decoded.prefix_len, 26);
		assert_eq!(decoded.index, 7);
		assert_eq!(decoded.attrs.get(IFA_ADDRESS).unwrap().as_bytes(), &[172, 17, 43, 1]);
		assert_eq!(decoded.attrs.get(IFA_BROADCAST).unwrap().as_bytes(), &[172, 17, 43, 63]);
	}

	#[test]
	fn dump_links_returns_two_records() {
		let a = padded(Frame::new(RTM_NEWLINK, NLM_F_MULTI as u16, 1, 0, LinkMessage::new().encode().unwrap()));
		let b = padded(Frame::new(RTM_NEWLINK, NLM_F_MULTI as u16, 1, 0, LinkMessage::new().encode().unwrap()));
		let done = padded(Frame::new(NLMSG_DONE as u16, NLM_F_MULTI as u16, 1, 0, vec![]));

		let ep = MockEndpoint::new(1, vec![a, b, done]);
		let links = get_links_with(&ep).unwrap();
		assert_eq!(links.len(), 2);
	}

	#[test]
	fn kernel_error_propagates_raw_code() {
		let ep = MockEndpoint::new(1, vec![error(1)]);
		let err = create_link_with(&ep, &bridge_link("x")).unwrap_err();
		assert!(matches!(err, Error::Kernel(1)));
	}

	#[test]
	fn unexpected_ack_on_get_link_one_shot_is_protocol_error() {
		let ep = MockEndpoint::new(1, vec![ack()]);
		let err = get_link_with(&ep, 7).unwrap_err();
		assert!(matches!(err, Error::Protocol(_)));
	}

	#[test]
	fn delete_link_requires_ack() {
		let ep = MockEndpoint::new(1, vec![ack()]);
		delete_link_with(&ep, 7).unwrap();

		let sent = ep.sent.borrow();
		let (frames, _) = Frame::decode_stream(&sent[0]).unwrap();
		assert_eq!(frames[0].msg_type, RTM_DELLINK);
	}
}
