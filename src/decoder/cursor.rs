//! Bounds-checked little-endian reads over an account payload.

use super::DecodeError;

/// Sequential reader over a payload slice.
///
/// Each read consumes exactly the declared field width; a read past the end
/// of the buffer fails instead of truncating. The cursor never looks at
/// trailing bytes beyond what the schema asks for.
pub(crate) struct Cursor<'a> {
	buf: &'a [u8],
	pos: usize,
}

impl<'a> Cursor<'a> {
	pub(crate) fn new(buf: &'a [u8]) -> Self {
		Self { buf, pos: 0 }
	}

	pub(crate) fn position(&self) -> usize {
		self.pos
	}

	fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
		let end = self.pos + n;
		if end > self.buf.len() {
			return Err(DecodeError::BufferTooShort {
				needed: end,
				got: self.buf.len(),
			});
		}
		let slice = &self.buf[self.pos..end];
		self.pos = end;
		Ok(slice)
	}

	pub(crate) fn skip(&mut self, n: usize) -> Result<(), DecodeError> {
		self.take(n).map(|_| ())
	}

	pub(crate) fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
		let mut out = [0u8; N];
		out.copy_from_slice(self.take(N)?);
		Ok(out)
	}

	pub(crate) fn read_u8(&mut self) -> Result<u8, DecodeError> {
		Ok(self.take(1)?[0])
	}

	pub(crate) fn read_u16(&mut self) -> Result<u16, DecodeError> {
		Ok(u16::from_le_bytes(self.read_array()?))
	}

	pub(crate) fn read_u32(&mut self) -> Result<u32, DecodeError> {
		Ok(u32::from_le_bytes(self.read_array()?))
	}

	pub(crate) fn read_u64(&mut self) -> Result<u64, DecodeError> {
		Ok(u64::from_le_bytes(self.read_array()?))
	}

	pub(crate) fn read_i64(&mut self) -> Result<i64, DecodeError> {
		Ok(i64::from_le_bytes(self.read_array()?))
	}
}
