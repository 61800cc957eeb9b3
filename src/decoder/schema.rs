//! Declarative account layout tables.
//!
//! The original backend tracked offsets with a running cursor incremented
//! after each read, which meant inserting or reordering a field silently
//! shifted every later offset. Here each layout is declared once as an
//! ordered table of (name, width, element count); offsets fall out of walking
//! the table and the walked total is asserted against the known account size
//! at compile time. The decoders still read sequentially, and debug builds
//! verify the cursor lands exactly on the schema total.

/// One field in a fixed account layout.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
	pub name: &'static str,
	/// Width of one element in bytes.
	pub width: usize,
	/// Number of elements (1 for scalars).
	pub count: usize,
}

impl FieldSpec {
	pub const fn scalar(name: &'static str, width: usize) -> Self {
		Self {
			name,
			width,
			count: 1,
		}
	}

	pub const fn array(name: &'static str, width: usize, count: usize) -> Self {
		Self { name, width, count }
	}

	pub const fn size(&self) -> usize {
		self.width * self.count
	}
}

/// Total payload size of a layout, excluding the discriminator.
pub const fn payload_size(fields: &[FieldSpec]) -> usize {
	let mut total = 0;
	let mut i = 0;
	while i < fields.len() {
		total += fields[i].size();
		i += 1;
	}
	total
}

/// Byte offset of a named field within the payload.
///
/// Panics at compile time when evaluated in a `const` context with an unknown
/// field name.
pub const fn offset_of(fields: &[FieldSpec], name: &str) -> usize {
	let mut offset = 0;
	let mut i = 0;
	while i < fields.len() {
		if str_eq(fields[i].name, name) {
			return offset;
		}
		offset += fields[i].size();
		i += 1;
	}
	panic!("unknown field in account layout");
}

const fn str_eq(a: &str, b: &str) -> bool {
	let (a, b) = (a.as_bytes(), b.as_bytes());
	if a.len() != b.len() {
		return false;
	}
	let mut i = 0;
	while i < a.len() {
		if a[i] != b[i] {
			return false;
		}
		i += 1;
	}
	true
}

#[cfg(test)]
mod tests {
	use super::*;

	const LAYOUT: [FieldSpec; 3] = [
		FieldSpec::scalar("key", 32),
		FieldSpec::scalar("value", 8),
		FieldSpec::array("slots", 2, 4),
	];

	#[test]
	fn payload_size_walks_the_table() {
		assert_eq!(payload_size(&LAYOUT), 32 + 8 + 8);
	}

	#[test]
	fn offsets_are_cumulative() {
		assert_eq!(offset_of(&LAYOUT, "key"), 0);
		assert_eq!(offset_of(&LAYOUT, "value"), 32);
		assert_eq!(offset_of(&LAYOUT, "slots"), 40);
	}
}
