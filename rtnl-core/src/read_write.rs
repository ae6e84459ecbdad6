use std::io;
use byteorder::{NativeEndian, ReadBytesExt, WriteBytesExt};

/// Reads a fixed-width value in the wire format's native byte order.
pub trait NativeEndianReader<T> {
	fn read_val(&mut self) -> Result<T, io::Error>;
}

impl<R: ReadBytesExt> NativeEndianReader<u8> for R {
	fn read_val(&mut self) -> Result<u8, io::Error> {
		self.read_u8()
	}
}
impl<R: ReadBytesExt> NativeEndianReader<i8> for R {
	fn read_val(&mut self) -> Result<i8, io::Error> {
		self.read_i8()
	}
}
macro_rules! derive_reader {
	{ $( $m:ident: $t:ty ),*} => {
		$(
			impl<T: ReadBytesExt> NativeEndianReader<$t> for T {
				fn read_val(&mut self) -> Result<$t, io::Error> {
					self . $m ::<NativeEndian>()
				}
			}
		)*
	}
}
derive_reader! { read_u16: u16, read_i16: i16, read_u32: u32, read_i32: i32 }

/// Writes a fixed-width value in the wire format's native byte order.
pub trait NativeEndianWriter<T>: WriteBytesExt {
	fn write_val(&mut self, v: T) -> Result<(), io::Error>;
}
impl<T: WriteBytesExt> NativeEndianWriter<u8> for T {
	fn write_val(&mut self, v: u8) -> Result<(), io::Error> {
		self.write_u8(v)
	}
}
impl<T: WriteBytesExt> NativeEndianWriter<i8> for T {
	fn write_val(&mut self, v: i8) -> Result<(), io::Error> {
		self.write_i8(v)
	}
}
macro_rules! derive_writer {
	{ $( $m:ident: $t:ty ),*} => {
		$(
			impl<T: WriteBytesExt> NativeEndianWriter<$t> for T {
				fn write_val(&mut self, v: $t) -> Result<(), io::Error> {
					self . $m ::<NativeEndian>(v)
				}
			}
		)*
	}
}
derive_writer! { write_u16: u16, write_i16: i16, write_u32: u32, write_i32: i32 }
