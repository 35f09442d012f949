//! The block device: fixed-size block I/O over a single backing file.
//!
//! All persistent structures are block-aligned; there are no partial-block reads or writes.
//! This is the raw primitive every other module builds on.

use std::fs::{File, OpenOptions};
use std::io;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Size in bytes of one block. All regions of the image are block-aligned multiples of this.
pub const BLOCK_SIZE: usize = 4096;

/// A single zeroed block, used as a write buffer or read scratch space.
pub type Block = [u8; BLOCK_SIZE];

/// Returns a block filled with zero bytes.
pub fn zero_block() -> Block {
	[0; BLOCK_SIZE]
}

/// A fixed-size-block device backed by a single regular file.
pub struct BlockDevice {
	file: File,
}

impl BlockDevice {
	/// Creates (or truncates) the backing file at `path` and extends it to `len` bytes, sized to
	/// hold every region of the image.
	pub fn init(path: &Path, len: u64) -> io::Result<()> {
		let file = OpenOptions::new()
			.read(true)
			.write(true)
			.create(true)
			.truncate(true)
			.open(path)?;
		file.set_len(len)?;
		Ok(())
	}

	/// Opens an existing backing file. Fails if the file does not exist.
	pub fn open(path: &Path) -> io::Result<Self> {
		let file = OpenOptions::new().read(true).write(true).open(path)?;
		Ok(Self {
			file,
		})
	}

	/// Reads one block into `buf`.
	pub fn bio_read(&mut self, block_no: u32, buf: &mut Block) -> io::Result<()> {
		self.file.seek(SeekFrom::Start(block_no as u64 * BLOCK_SIZE as u64))?;
		self.file.read_exact(buf)
	}

	/// Writes one block from `buf`.
	pub fn bio_write(&mut self, block_no: u32, buf: &Block) -> io::Result<()> {
		self.file.seek(SeekFrom::Start(block_no as u64 * BLOCK_SIZE as u64))?;
		self.file.write_all(buf)?;
		self.file.flush()
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use tempfile::NamedTempFile;

	#[test]
	fn round_trip() {
		let tmp = NamedTempFile::new().unwrap();
		BlockDevice::init(tmp.path(), BLOCK_SIZE as u64 * 4).unwrap();
		let mut dev = BlockDevice::open(tmp.path()).unwrap();

		let mut buf = zero_block();
		buf[0] = 0x42;
		buf[BLOCK_SIZE - 1] = 0x24;
		dev.bio_write(2, &buf).unwrap();

		let mut out = zero_block();
		dev.bio_read(2, &mut out).unwrap();
		assert_eq!(buf, out);

		// Blocks that were never written read back as zero.
		let mut untouched = zero_block();
		dev.bio_read(1, &mut untouched).unwrap();
		assert_eq!(untouched, zero_block());
	}

	#[test]
	fn open_missing_fails() {
		let tmp = NamedTempFile::new().unwrap();
		let path = tmp.path().to_owned();
		drop(tmp);
		assert!(BlockDevice::open(&path).is_err());
	}
}
