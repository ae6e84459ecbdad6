use byteorder::{NativeEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use crate::attr::{AttributeList, Encode};
use crate::error::{Error, Result};

/// An address record: the fixed family/prefix-length/flags/scope/index
/// prefix followed by an attribute list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressMessage {
	pub family: u8,
	pub prefix_len: u8,
	pub flags: u8,
	pub scope: u8,
	pub index: i32,
	pub attrs: AttributeList,
}

impl AddressMessage {
	pub const PREFIX_LEN: usize = 8;

	pub fn new() -> AddressMessage {
		AddressMessage {
			family: 0,
			prefix_len: 0,
			flags: 0,
			scope: 0,
			index: 0,
			attrs: AttributeList::new(),
		}
	}

	pub fn decode(buf: &[u8]) -> Result<AddressMessage> {
		if buf.len() < Self::PREFIX_LEN {
			return Err(Error::Protocol(format!(
				"address record too short: {} bytes",
				buf.len()
			)));
		}
		let mut c = Cursor::new(buf);
		let family = c.read_u8()?;
		let prefix_len = c.read_u8()?;
		let flags = c.read_u8()?;
		let scope = c.read_u8()?;
		let index = c.read_i32::<NativeEndian>()?;
		let attrs = AttributeList::decode(&buf[Self::PREFIX_LEN..])?;

		Ok(AddressMessage { family, prefix_len, flags, scope, index, attrs })
	}
}

impl Default for AddressMessage {
	fn default() -> AddressMessage {
		AddressMessage::new()
	}
}

impl Encode for AddressMessage {
	fn encode(&self) -> Result<Vec<u8>> {
		let mut v = Vec::with_capacity(Self::PREFIX_LEN);
		v.write_u8(self.family)?;
		v.write_u8(self.prefix_len)?;
		v.write_u8(self.flags)?;
		v.write_u8(self.scope)?;
		v.write_i32::<NativeEndian>(self.index)?;
		v.extend(self.attrs.encode()?);
		Ok(v)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::attr::Attribute;
	use crate::constants::IFA_ADDRESS;

	#[test]
	fn encode_decode_round_trip() {
		let mut msg = AddressMessage::new();
		msg.family = libc::AF_INET as u8;
		msg.prefix_len = 26;
		msg.index = 7;
		msg.attrs.add(Attribute::new_bytes(IFA_ADDRESS, vec![172, 17, 43, 1]));

		let encoded = msg.encode().unwrap();
		let decoded = AddressMessage::decode(&encoded).unwrap();

		assert_eq!(decoded.prefix_len, 26);
		assert_eq!(decoded.index, 7);
		assert_eq!(decoded.attrs.get(IFA_ADDRESS).unwrap().as_bytes(), &[172, 17, 43, 1]);
	}

	#[test]
	fn decode_rejects_short_buffer() {
		let err = AddressMessage::decode(&[0u8; 3]).unwrap_err();
		assert!(matches!(err, Error::Protocol(_)));
	}
}
