//! Kernel ABI constants this codec targets, re-exported from `libc` where
//! available. The numeric values come from the system headers.
//!
//! A handful of attribute tags used by the `veth` and bridge link-info
//! nesting are not exposed by the `libc` crate and are defined here
//! directly, matching `linux/if_link.h`.

pub use libc::{
	AF_NETLINK, AF_UNSPEC, NETLINK_ROUTE,
	NLMSG_DONE, NLMSG_ERROR,
	NLM_F_ACK, NLM_F_CREATE, NLM_F_DUMP, NLM_F_EXCL, NLM_F_MULTI, NLM_F_REQUEST,
	RTM_DELLINK, RTM_GETADDR, RTM_GETLINK, RTM_NEWADDR, RTM_NEWLINK,
	IFA_ADDRESS, IFA_BROADCAST, IFA_LOCAL,
	IFLA_IFNAME, IFLA_LINKINFO, IFLA_MASTER, IFLA_NET_NS_PID,
	IFF_UP,
	IF_NAMESIZE,
};

/// `IFLA_INFO_KIND`, not exposed by `libc`. Value from `linux/if_link.h`.
pub const IFLA_INFO_KIND: u16 = 1;
/// `IFLA_INFO_DATA`, not exposed by `libc`. Value from `linux/if_link.h`.
pub const IFLA_INFO_DATA: u16 = 2;
/// `VETH_INFO_PEER`, not exposed by `libc`. Value from `linux/if_link.h`.
pub const VETH_INFO_PEER: u16 = 1;

/// Socket send/receive buffer size set on every fresh endpoint.
pub const SOCKET_BUFFER_BYTES: i32 = 32 * 1024;
