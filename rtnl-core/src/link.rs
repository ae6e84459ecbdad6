use byteorder::{NativeEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use crate::attr::{AttributeList, Encode};
use crate::error::{Error, Result};

/// A link record: the fixed family/type/index/flags/change prefix followed
/// by an attribute list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkMessage {
	pub family: u8,
	pub link_type: u16,
	pub index: i32,
	pub flags: u32,
	/// Selects which bits of `flags` an encoder is asking the kernel to
	/// modify. Defaults to all-ones: every bit of `flags` is authoritative
	/// unless the caller narrows `change` to make a targeted edit.
	pub change: u32,
	pub attrs: AttributeList,
}

impl LinkMessage {
	pub const PREFIX_LEN: usize = 16;

	pub fn new() -> LinkMessage {
		LinkMessage {
			family: 0,
			link_type: 0,
			index: 0,
			flags: 0,
			change: 0xFFFF_FFFF,
			attrs: AttributeList::new(),
		}
	}

	pub fn decode(buf: &[u8]) -> Result<LinkMessage> {
		if buf.len() < Self::PREFIX_LEN {
			return Err(Error::Protocol(format!(
				"link record too short: {} bytes",
				buf.len()
			)));
		}
		let mut c = Cursor::new(buf);
		let family = c.read_u8()?;
		let _pad = c.read_u8()?;
		let link_type = c.read_u16::<NativeEndian>()?;
		let index = c.read_i32::<NativeEndian>()?;
		let flags = c.read_u32::<NativeEndian>()?;
		let change = c.read_u32::<NativeEndian>()?;
		let attrs = AttributeList::decode(&buf[Self::PREFIX_LEN..])?;

		Ok(LinkMessage { family, link_type, index, flags, change, attrs })
	}
}

impl Default for LinkMessage {
	fn default() -> LinkMessage {
		LinkMessage::new()
	}
}

impl Encode for LinkMessage {
	fn encode(&self) -> Result<Vec<u8>> {
		let mut v = Vec::with_capacity(Self::PREFIX_LEN);
		v.write_u8(self.family)?;
		v.write_u8(0)?;
		v.write_u16::<NativeEndian>(self.link_type)?;
		v.write_i32::<NativeEndian>(self.index)?;
		v.write_u32::<NativeEndian>(self.flags)?;
		v.write_u32::<NativeEndian>(self.change)?;
		v.extend(self.attrs.encode()?);
		Ok(v)
	}
}
