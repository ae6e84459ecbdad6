//! The OS primitives this protocol needs (open, bind, getsockname, sendto,
//! recvfrom, close, plus the send/receive buffer-size setsockopt) live behind
//! the [`Endpoint`] trait. [`Socket`] is the one production implementation,
//! built directly on `libc` much like a UDP manager builds directly on
//! `std::net::UdpSocket`. This protocol has no portable cross-platform
//! equivalent, so there is exactly one implementation rather than a per-OS
//! family of them.

use std::io;
use std::mem;
use std::os::unix::io::RawFd;
use std::time::Duration;

use crate::constants::{AF_NETLINK, NETLINK_ROUTE, SOCKET_BUFFER_BYTES};
use crate::error::{Error, Result};
use crate::frame::Frame;

/// A bound endpoint capable of exchanging datagrams with the kernel's
/// configuration socket family. Each public route-family call opens one of
/// these, drives it to completion, and lets it go.
pub trait Endpoint {
	/// The local id the kernel assigned this endpoint on bind.
	fn local_pid(&self) -> u32;
	/// Sends one complete, already-encoded frame to the kernel.
	fn send(&self, buf: &[u8]) -> Result<()>;
	/// Reads one datagram. Returns the number of bytes written into `buf`.
	fn recv(&self, buf: &mut [u8]) -> Result<usize>;
}

/// A raw `AF_NETLINK`/`NETLINK_ROUTE` socket.
pub struct Socket {
	fd: RawFd,
	local_pid: u32,
}

impl Socket {
	/// Opens a fresh endpoint: creates the socket, sets both buffer sizes to
	/// 32 KiB, binds to an unspecified local address, and reads back the
	/// kernel-assigned local id.
	///
	/// `deadline`, if set, becomes both `SO_RCVTIMEO` and `SO_SNDTIMEO` so
	/// `send`/`recv` return rather than blocking indefinitely.
	pub fn open(deadline: Option<Duration>) -> Result<Socket> {
		let fd = cvt(unsafe { libc::socket(AF_NETLINK, libc::SOCK_RAW, NETLINK_ROUTE) })?;

		if let Err(e) = Self::init(fd, deadline) {
			unsafe { libc::close(fd) };
			return Err(e);
		}

		let local_pid = Self::bound_pid(fd)?;
		Ok(Socket { fd, local_pid })
	}

	fn init(fd: RawFd, deadline: Option<Duration>) -> Result<()> {
		set_buffer_size(fd, libc::SO_SNDBUF)?;
		set_buffer_size(fd, libc::SO_RCVBUF)?;
		if let Some(d) = deadline {
			set_timeout(fd, libc::SO_RCVTIMEO, d)?;
			set_timeout(fd, libc::SO_SNDTIMEO, d)?;
		}

		let addr = sockaddr_nl(0);
		cvt(unsafe {
			libc::bind(
				fd,
				&addr as *const libc::sockaddr_nl as *const libc::sockaddr,
				mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t,
			)
		})?;
		Ok(())
	}

	fn bound_pid(fd: RawFd) -> Result<u32> {
		let mut addr: libc::sockaddr_nl = unsafe { mem::zeroed() };
		let mut len = mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t;
		cvt(unsafe {
			libc::getsockname(fd, &mut addr as *mut libc::sockaddr_nl as *mut libc::sockaddr, &mut len)
		})?;
		Ok(addr.nl_pid)
	}
}

impl Endpoint for Socket {
	fn local_pid(&self) -> u32 {
		self.local_pid
	}

	fn send(&self, buf: &[u8]) -> Result<()> {
		let kernel = sockaddr_nl(0);
		let sent = unsafe {
			libc::sendto(
				self.fd,
				buf.as_ptr() as *const libc::c_void,
				buf.len(),
				0,
				&kernel as *const libc::sockaddr_nl as *const libc::sockaddr,
				mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t,
			)
		};
		if sent < 0 {
			return Err(Error::Os(io::Error::last_os_error()));
		}
		if sent as usize != buf.len() {
			return Err(Error::Protocol(format!(
				"short send: wrote {} of {} bytes",
				sent,
				buf.len()
			)));
		}
		Ok(())
	}

	fn recv(&self, buf: &mut [u8]) -> Result<usize> {
		let n = unsafe {
			libc::recvfrom(
				self.fd,
				buf.as_mut_ptr() as *mut libc::c_void,
				buf.len(),
				0,
				std::ptr::null_mut(),
				std::ptr::null_mut(),
			)
		};
		if n < 0 {
			let err = io::Error::last_os_error();
			// The endpoint was torn down (e.g. by another thread) while this
			// recv was blocked: surface as cancellation, not a generic OS
			// error.
			if matches!(err.raw_os_error(), Some(libc::EBADF) | Some(libc::ENOTCONN)) {
				return Err(Error::Cancelled);
			}
			return Err(Error::Os(err));
		}
		Ok(n as usize)
	}
}

impl Drop for Socket {
	fn drop(&mut self) {
		unsafe { libc::close(self.fd) };
	}
}

fn sockaddr_nl(pid: u32) -> libc::sockaddr_nl {
	let mut addr: libc::sockaddr_nl = unsafe { mem::zeroed() };
	addr.nl_family = AF_NETLINK as libc::sa_family_t;
	addr.nl_pid = pid;
	addr
}

fn set_buffer_size(fd: RawFd, which: libc::c_int) -> Result<()> {
	cvt(unsafe {
		libc::setsockopt(
			fd,
			libc::SOL_SOCKET,
			which,
			&SOCKET_BUFFER_BYTES as *const i32 as *const libc::c_void,
			mem::size_of::<i32>() as libc::socklen_t,
		)
	})?;
	Ok(())
}

fn set_timeout(fd: RawFd, which: libc::c_int, d: Duration) -> Result<()> {
	let tv = libc::timeval {
		tv_sec: d.as_secs() as libc::time_t,
		tv_usec: d.subsec_micros() as libc::suseconds_t,
	};
	cvt(unsafe {
		libc::setsockopt(
			fd,
			libc::SOL_SOCKET,
			which,
			&tv as *const libc::timeval as *const libc::c_void,
			mem::size_of::<libc::timeval>() as libc::socklen_t,
		)
	})?;
	Ok(())
}

fn cvt(ret: libc::c_int) -> Result<libc::c_int> {
	if ret < 0 {
		Err(Error::Os(io::Error::last_os_error()))
	} else {
		Ok(ret)
	}
}

/// Size of one OS page, used to size the receive buffer for a single
/// `recvfrom`.
fn page_size() -> usize {
	let n = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
	if n > 0 {
		n as usize
	} else {
		4096
	}
}

/// Issues `frame` as a single request and drains the complete reply,
/// including a multipart dump, using a freshly opened [`Socket`].
pub fn request(frame: Frame, deadline: Option<Duration>) -> Result<Vec<Frame>> {
	let endpoint = Socket::open(deadline)?;
	request_with(&endpoint, frame)
}

/// As [`request`], but additionally requires that the single reply frame be
/// an acknowledgement.
pub fn request_ack(frame: Frame, deadline: Option<Duration>) -> Result<()> {
	let endpoint = Socket::open(deadline)?;
	request_ack_with(&endpoint, frame)
}

/// `request`, parameterized over the endpoint so tests can substitute a
/// deterministic simulated kernel for the real socket.
pub fn request_with<E: Endpoint>(endpoint: &E, mut frame: Frame) -> Result<Vec<Frame>> {
	if frame.pid == 0 {
		frame.pid = endpoint.local_pid();
	}
	let bytes = frame.encode()?;
	endpoint.send(&bytes)?;

	let mut replies = Vec::new();
	loop {
		let mut buf = vec![0u8; page_size()];
		let n = endpoint.recv(&mut buf)?;
		let (frames, more) = Frame::decode_stream(&buf[..n])?;
		replies.extend(frames);
		if !more {
			break;
		}
	}

	if let [only] = replies.as_slice() {
		if only.is_error() {
			return Err(Error::Kernel(only.error_code()));
		}
	}
	Ok(replies)
}

pub fn request_ack_with<E: Endpoint>(endpoint: &E, frame: Frame) -> Result<()> {
	let replies = request_with(endpoint, frame)?;
	match replies.as_slice() {
		[only] if only.is_ack() => Ok(()),
		_ => Err(Error::Protocol(format!(
			"expected a single acknowledgement, got {} reply frame(s)",
			replies.len()
		))),
	}
}
