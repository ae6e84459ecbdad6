use std::io;
use thiserror::Error;

/// Errors surfaced by the codec and transport.
#[derive(Error, Debug)]
pub enum Error {
	/// A socket(2)/bind(2)/getsockname(2)/setsockopt(2)/sendto(2)/recvfrom(2)/close(2)
	/// call failed. The wrapped error is the underlying OS error.
	#[error("os error: {0}")]
	Os(#[from] io::Error),

	/// A frame or attribute failed to decode: inconsistent length, mid-stream
	/// truncation, an unexpected reply count, or an acknowledgement where data
	/// was expected (or vice versa).
	#[error("protocol error: {0}")]
	Protocol(String),

	/// The kernel replied with an error frame. `code` is the raw wire value
	/// (negated errno convention; callers negate to recover an errno).
	#[error("kernel error: {0}")]
	Kernel(i32),

	/// The endpoint was closed while a receive was in flight.
	#[error("cancelled")]
	Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;
