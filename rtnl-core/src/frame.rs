use byteorder::{NativeEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use crate::align::align_msg;
use crate::constants::{NLMSG_DONE, NLMSG_ERROR};
use crate::error::{Error, Result};

/// One self-delimited protocol message: a 16-byte header plus a
/// family-specific payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
	/// Command or reply classifier.
	pub msg_type: u16,
	/// request/ack/dump/create/exclusive/multipart bits.
	pub flags: u16,
	/// Caller-assigned correlation id. Not validated by this layer.
	pub sequence: u32,
	/// Sender identity; the bound-socket local id for userspace, 0 for the kernel.
	pub pid: u32,
	pub payload: Vec<u8>,
}

impl Frame {
	/// Size of the fixed header, in bytes.
	pub const HEADER_LEN: usize = 16;

	pub fn new(msg_type: u16, flags: u16, sequence: u32, pid: u32, payload: Vec<u8>) -> Frame {
		Frame { msg_type, flags, sequence, pid, payload }
	}

	/// Encodes this frame. The returned buffer is exactly `16 + payload.len()`
	/// bytes; the caller is responsible for the trailing alignment padding
	/// when appending more frames to the same stream.
	pub fn encode(&self) -> Result<Vec<u8>> {
		let total_len = Self::HEADER_LEN + self.payload.len();
		let mut v = Vec::with_capacity(total_len);
		v.write_u32::<NativeEndian>(total_len as u32)?;
		v.write_u16::<NativeEndian>(self.msg_type)?;
		v.write_u16::<NativeEndian>(self.flags)?;
		v.write_u32::<NativeEndian>(self.sequence)?;
		v.write_u32::<NativeEndian>(self.pid)?;
		v.extend_from_slice(&self.payload);
		Ok(v)
	}

	/// Decodes every frame in `buf`, in order. Returns the frames plus
	/// whether the peer is expected to send more (a dump whose stream ended
	/// before a "done" sentinel arrived).
	///
	/// A "done" sentinel terminates the stream without itself becoming a
	/// frame in the result.
	pub fn decode_stream(buf: &[u8]) -> Result<(Vec<Frame>, bool)> {
		let mut frames = Vec::new();
		let mut cursor = buf;
		let mut more = false;

		while cursor.len() >= Self::HEADER_LEN {
			let mut c = Cursor::new(cursor);
			let length = c.read_u32::<NativeEndian>()? as usize;
			if length < Self::HEADER_LEN || length > cursor.len() {
				return Err(Error::Protocol(format!(
					"truncated frame: length {} out of range for {} remaining bytes",
					length,
					cursor.len()
				)));
			}
			let msg_type = c.read_u16::<NativeEndian>()?;
			let flags = c.read_u16::<NativeEndian>()?;
			let sequence = c.read_u32::<NativeEndian>()?;
			let pid = c.read_u32::<NativeEndian>()?;
			let payload = cursor[Self::HEADER_LEN..length].to_vec();

			if msg_type == NLMSG_DONE as u16 {
				more = false;
				break;
			}

			more = flags & (libc::NLM_F_MULTI as u16) != 0;
			frames.push(Frame { msg_type, flags, sequence, pid, payload });
			cursor = &cursor[align_msg(length).min(cursor.len())..];
		}

		Ok((frames, more))
	}

	/// The signed 32-bit error code carried by an error/ack frame's payload,
	/// or 0 if this frame is not of the reserved error type. The kernel's
	/// negated-errno convention is preserved as-is; callers negate the result
	/// to recover an errno.
	pub fn error_code(&self) -> i32 {
		if self.msg_type != NLMSG_ERROR as u16 {
			return 0;
		}
		if self.payload.len() < 4 {
			return 0;
		}
		let mut c = Cursor::new(&self.payload[0..4]);
		c.read_i32::<NativeEndian>().unwrap_or(0)
	}

	pub fn is_ack(&self) -> bool {
		self.msg_type == NLMSG_ERROR as u16 && self.error_code() == 0
	}

	pub fn is_error(&self) -> bool {
		self.msg_type == NLMSG_ERROR as u16 && self.error_code() != 0
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn frame(msg_type: u16, flags: u16, payload: Vec<u8>) -> Frame {
		Frame::new(msg_type, flags, 7, 1234, payload)
	}

	#[test]
	fn encode_has_correct_length_and_header() {
		let f = frame(16, 5, vec![1, 2, 3, 4, 5]);
		let buf = f.encode().unwrap();
		assert_eq!(buf.len(), 16 + 5);

		let (decoded, more) = Frame::decode_stream(&buf).unwrap();
		assert!(!more);
		assert_eq!(decoded.len(), 1);
		assert_eq!(decoded[0], f);
	}

	#[test]
	fn decode_stream_concatenated_frames() {
		let a = frame(10, 0, vec![1, 2, 3]);
		let b = frame(11, 0, vec![9]);

		let mut buf = a.encode().unwrap();
		buf.resize(align_msg(buf.len()), 0);
		buf.extend(b.encode().unwrap());

		let (decoded, more) = Frame::decode_stream(&buf).unwrap();
		assert!(!more);
		assert_eq!(decoded, vec![a, b]);
	}

	#[test]
	fn multipart_dump_terminated_by_done() {
		let a = frame(100, libc::NLM_F_MULTI as u16, vec![1]);
		let b = frame(100, libc::NLM_F_MULTI as u16, vec![2]);
		let done = frame(NLMSG_DONE as u16, libc::NLM_F_MULTI as u16, vec![]);

		let mut buf = Vec::new();
		for f in [&a, &b, &done] {
			let enc = f.encode().unwrap();
			buf.extend(&enc);
			let pad = align_msg(enc.len()) - enc.len();
			buf.extend(std::iter::repeat_n(0u8, pad));
		}

		let (decoded, more) = Frame::decode_stream(&buf).unwrap();
		assert!(!more);
		assert_eq!(decoded, vec![a, b]);
	}

	#[test]
	fn multipart_without_done_signals_continuation() {
		let a = frame(100, libc::NLM_F_MULTI as u16, vec![1]);
		let buf = a.encode().unwrap();

		let (decoded, more) = Frame::decode_stream(&buf).unwrap();
		assert!(more);
		assert_eq!(decoded, vec![a]);
	}

	#[test]
	fn empty_dump_is_just_a_done_sentinel() {
		let done = frame(NLMSG_DONE as u16, libc::NLM_F_MULTI as u16, vec![]);
		let buf = done.encode().unwrap();

		let (decoded, more) = Frame::decode_stream(&buf).unwrap();
		assert!(!more);
		assert!(decoded.is_empty());
	}

	#[test]
	fn truncated_frame_is_an_error() {
		let f = frame(10, 0, vec![1, 2, 3, 4]);
		let buf = f.encode().unwrap();
		let err = Frame::decode_stream(&buf[..buf.len() - 1]).unwrap_err();
		assert!(matches!(err, Error::Protocol(_)));
	}

	#[test]
	fn error_and_ack_recognition() {
		let mut err_payload = Vec::new();
		err_payload.write_i32::<NativeEndian>(-1).unwrap();
		let err_frame = frame(NLMSG_ERROR as u16, 0, err_payload);
		assert!(err_frame.is_error());
		assert!(!err_frame.is_ack());
		assert_eq!(err_frame.error_code(), -1);

		let mut ack_payload = Vec::new();
		ack_payload.write_i32::<NativeEndian>(0).unwrap();
		let ack_frame = frame(NLMSG_ERROR as u16, 0, ack_payload);
		assert!(ack_frame.is_ack());
		assert!(!ack_frame.is_error());
		assert_eq!(ack_frame.error_code(), 0);
	}
}
