use std::io::Cursor;

use crate::align::align_attr;
use crate::error::{Error, Result};
use crate::read_write::{NativeEndianReader, NativeEndianWriter};

/// Something that can be encoded into an attribute payload: primitives,
/// a nested `AttributeList`, or any typed record (link/address) that knows
/// how to lay itself out on the wire.
pub trait Encode {
	fn encode(&self) -> Result<Vec<u8>>;
}

/// A single tag-length-value sub-record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
	pub attr_type: u16,
	pub data: Vec<u8>,
}

enum Decoded<'a> {
	Attr(Attribute, &'a [u8]),
	End,
}

impl Attribute {
	pub const HEADER_LEN: usize = 4;

	pub fn new_bytes(attr_type: u16, data: Vec<u8>) -> Attribute {
		Attribute { attr_type, data }
	}

	pub fn new_u8(attr_type: u16, v: u8) -> Attribute {
		Attribute::new_bytes(attr_type, vec![v])
	}

	pub fn new_i8(attr_type: u16, v: i8) -> Attribute {
		Attribute::new_bytes(attr_type, vec![v as u8])
	}

	pub fn new_u16(attr_type: u16, v: u16) -> Result<Attribute> {
		Ok(Attribute::new_bytes(attr_type, encode_val(v)?))
	}

	pub fn new_i16(attr_type: u16, v: i16) -> Result<Attribute> {
		Ok(Attribute::new_bytes(attr_type, encode_val(v)?))
	}

	pub fn new_u32(attr_type: u16, v: u32) -> Result<Attribute> {
		Ok(Attribute::new_bytes(attr_type, encode_val(v)?))
	}

	pub fn new_i32(attr_type: u16, v: i32) -> Result<Attribute> {
		Ok(Attribute::new_bytes(attr_type, encode_val(v)?))
	}

	/// Copies `s`'s bytes verbatim; no trailing NUL is appended (the kernel
	/// accepts attribute strings either way, and adding one would change the
	/// encoded length unnecessarily).
	pub fn new_string(attr_type: u16, s: &str) -> Attribute {
		Attribute::new_bytes(attr_type, s.as_bytes().to_vec())
	}

	/// Stores `value`'s encoded form as this attribute's data. Accepts any
	/// value implementing the encode trait, so attribute lists nest freely.
	pub fn new_nested<E: Encode>(attr_type: u16, value: &E) -> Result<Attribute> {
		Ok(Attribute::new_bytes(attr_type, value.encode()?))
	}

	pub fn as_u8(&self) -> Result<u8> {
		read_val(&self.data)
	}

	pub fn as_i8(&self) -> Result<i8> {
		read_val(&self.data)
	}

	pub fn as_u16(&self) -> Result<u16> {
		read_val(&self.data)
	}

	pub fn as_i16(&self) -> Result<i16> {
		read_val(&self.data)
	}

	pub fn as_u32(&self) -> Result<u32> {
		read_val(&self.data)
	}

	pub fn as_i32(&self) -> Result<i32> {
		read_val(&self.data)
	}

	pub fn as_bytes(&self) -> &[u8] {
		&self.data
	}

	/// The kernel pads fixed-size string fields (`IFLA_IFNAME` and similar)
	/// with trailing NUL bytes; those are stripped here.
	pub fn as_string(&self) -> Result<String> {
		let trimmed = match self.data.iter().position(|&b| b == 0) {
			Some(idx) => &self.data[..idx],
			None => &self.data[..],
		};
		String::from_utf8(trimmed.to_vec())
			.map_err(|e| Error::Protocol(format!("invalid utf-8 in attribute: {e}")))
	}

	/// Decodes this attribute's data as a nested attribute list.
	pub fn as_nested(&self) -> Result<AttributeList> {
		AttributeList::decode(&self.data)
	}

	/// Encodes header + data, padded to a 4-byte boundary with zero bytes.
	/// The padding is present in the returned buffer but not counted by the
	/// `length` field.
	pub fn encode(&self) -> Vec<u8> {
		let unpadded = Self::HEADER_LEN + self.data.len();
		let mut v = Vec::with_capacity(align_attr(unpadded));
		v.write_val(unpadded as u16).expect("writing to Vec never fails");
		v.write_val(self.attr_type).expect("writing to Vec never fails");
		v.extend_from_slice(&self.data);
		v.resize(align_attr(unpadded), 0);
		v
	}

	fn decode_one(buf: &[u8]) -> Result<Decoded<'_>> {
		if buf.len() < Self::HEADER_LEN {
			return Ok(Decoded::End);
		}
		let mut c = Cursor::new(buf);
		let length: u16 = c.read_val()?;
		let length = length as usize;
		let attr_type: u16 = c.read_val()?;
		if length < Self::HEADER_LEN || length > buf.len() {
			return Err(Error::Protocol(format!(
				"truncated attribute: length {} out of range for {} remaining bytes",
				length,
				buf.len()
			)));
		}
		let data = buf[Self::HEADER_LEN..length].to_vec();
		let consumed = align_attr(length);
		Ok(Decoded::Attr(Attribute { attr_type, data }, &buf[consumed..]))
	}
}

impl Encode for Attribute {
	fn encode(&self) -> Result<Vec<u8>> {
		Ok(Attribute::encode(self))
	}
}

fn encode_val<T>(v: T) -> Result<Vec<u8>>
where
	Vec<u8>: NativeEndianWriter<T>,
{
	let mut buf = Vec::new();
	buf.write_val(v)?;
	Ok(buf)
}

fn read_val<T>(data: &[u8]) -> Result<T>
where
	for<'a> Cursor<&'a [u8]>: NativeEndianReader<T>,
{
	let mut c = Cursor::new(data);
	Ok(c.read_val()?)
}

/// An ordered mapping from attribute tag to attribute. `add` is
/// last-write-wins: re-adding an existing tag replaces its value in place, so
/// encoding order always matches first-seen insertion order. That keeps
/// dumps deterministic for testing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeList {
	items: Vec<Attribute>,
}

impl AttributeList {
	pub fn new() -> AttributeList {
		AttributeList { items: Vec::new() }
	}

	pub fn add(&mut self, attr: Attribute) {
		if let Some(existing) = self.items.iter_mut().find(|a| a.attr_type == attr.attr_type) {
			*existing = attr;
		} else {
			self.items.push(attr);
		}
	}

	pub fn get(&self, attr_type: u16) -> Option<&Attribute> {
		self.items.iter().find(|a| a.attr_type == attr_type)
	}

	pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
		self.items.iter()
	}

	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}

	pub fn len(&self) -> usize {
		self.items.len()
	}

	/// Decodes a sequence of attributes until `buf` is exhausted. A length
	/// prefix that would run past the end of `buf` is a real error; running
	/// out of bytes to even read a 4-byte header is the normal end of a list
	/// and is not an error.
	pub fn decode(buf: &[u8]) -> Result<AttributeList> {
		let mut list = AttributeList::new();
		let mut cursor = buf;
		loop {
			match Attribute::decode_one(cursor)? {
				Decoded::End => break,
				Decoded::Attr(attr, rest) => {
					list.add(attr);
					cursor = rest;
				}
			}
		}
		Ok(list)
	}
}

impl Encode for AttributeList {
	fn encode(&self) -> Result<Vec<u8>> {
		let mut v = Vec::new();
		for attr in &self.items {
			v.extend(attr.encode());
		}
		Ok(v)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn primitive_round_trip() {
		assert_eq!(Attribute::new_u8(1, 0x42).as_u8().unwrap(), 0x42);
		assert_eq!(Attribute::new_i8(1, -5).as_i8().unwrap(), -5);
		assert_eq!(Attribute::new_u16(1, 0x1234).unwrap().as_u16().unwrap(), 0x1234);
		assert_eq!(Attribute::new_i16(1, -1234).unwrap().as_i16().unwrap(), -1234);
		assert_eq!(Attribute::new_u32(1, 0xdead_beef).unwrap().as_u32().unwrap(), 0xdead_beef);
		assert_eq!(Attribute::new_i32(1, -123456).unwrap().as_i32().unwrap(), -123456);
	}

	#[test]
	fn string_round_trip_strips_trailing_nul() {
		let attr = Attribute::new_string(3, "eth0");
		let mut padded = attr.data.clone();
		padded.extend([0u8; 11]);
		let padded_attr = Attribute::new_bytes(3, padded);
		assert_eq!(padded_attr.as_string().unwrap(), "eth0");
	}

	#[test]
	fn encode_decode_one_attribute() {
		let attr = Attribute::new_u32(5, 9001).unwrap();
		let buf = attr.encode();
		assert_eq!(buf.len(), 8); // 4 header + 4 data, already a multiple of 4

		let (decoded, rest) = match Attribute::decode_one(&buf).unwrap() {
			Decoded::Attr(a, r) => (a, r),
			Decoded::End => panic!("expected an attribute"),
		};
		assert_eq!(decoded, attr);
		assert!(rest.is_empty());
	}

	#[test]
	fn zero_length_data_round_trips() {
		let attr = Attribute::new_bytes(9, vec![]);
		let buf = attr.encode();
		assert_eq!(buf.len(), 4);
		let list = AttributeList::decode(&buf).unwrap();
		assert_eq!(list.get(9).unwrap().data, Vec::<u8>::new());
	}

	#[test]
	fn list_add_get_last_write_wins_preserves_position() {
		let mut list = AttributeList::new();
		list.add(Attribute::new_u16(1, 10).unwrap());
		list.add(Attribute::new_u16(2, 20).unwrap());
		list.add(Attribute::new_u16(1, 99).unwrap());

		assert_eq!(list.get(1).unwrap().as_u16().unwrap(), 99);
		let order: Vec<u16> = list.iter().map(|a| a.attr_type).collect();
		assert_eq!(order, vec![1, 2]);
	}

	#[test]
	fn list_encode_decode_round_trip() {
		let mut list = AttributeList::new();
		list.add(Attribute::new_string(1, "br0"));
		list.add(Attribute::new_u32(2, 7).unwrap());
		list.add(Attribute::new_bytes(3, vec![1, 2, 3]));

		let encoded = list.encode().unwrap();
		let decoded = AttributeList::decode(&encoded).unwrap();

		assert_eq!(decoded.get(1).unwrap().as_string().unwrap(), "br0");
		assert_eq!(decoded.get(2).unwrap().as_u32().unwrap(), 7);
		assert_eq!(decoded.get(3).unwrap().as_bytes(), &[1, 2, 3]);
	}

	#[test]
	fn nested_attribute_round_trips() {
		let mut inner = AttributeList::new();
		inner.add(Attribute::new_string(10, "bridge"));

		let outer_attr = Attribute::new_nested(20, &inner).unwrap();
		let decoded_inner = outer_attr.as_nested().unwrap();
		assert_eq!(decoded_inner.get(10).unwrap().as_string().unwrap(), "bridge");
	}

	#[test]
	fn truncated_attribute_mid_stream_is_an_error() {
		let attr = Attribute::new_u32(1, 1).unwrap();
		let mut buf = attr.encode();
		buf.truncate(buf.len() - 1);
		let err = AttributeList::decode(&buf).unwrap_err();
		assert!(matches!(err, Error::Protocol(_)));
	}
}
