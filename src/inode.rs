//! Inode representation and inode-table I/O.
//!
//! Inodes are packed 16 per block (see [`crate::superblock::INODES_PER_BLOCK`]); reading or
//! writing a single inode therefore requires a read-modify-write of the whole block it lives in.

use crate::block::{zero_block, Block, BLOCK_SIZE};
use crate::error::{Result, TfsError};
use crate::superblock::{INODES_PER_BLOCK, I_START_BLK};
use crate::Tfs;

/// On-disk size of one inode record. `BLOCK_SIZE` must be an exact multiple of this.
pub const INODE_SIZE: usize = 256;

/// Sentinel stored in a [`Inode::direct_ptr`] slot that has no block allocated.
pub const NO_BLOCK: i32 = -1;
/// Number of direct block pointers per inode; files are bounded by this many blocks.
pub const DIRECT_PTR_COUNT: usize = 16;

/// A file is a regular file.
pub const TYPE_FILE: u8 = 0;
/// A file is a directory.
pub const TYPE_DIR: u8 = 1;

/// Cache of attributes returned to the host on attribute queries.
#[repr(C, packed)]
#[derive(Clone, Copy, Default)]
pub struct Vstat {
	pub mode: u32,
	pub size: u64,
	pub blksize: u32,
	pub blocks: u64,
	pub ino: u64,
}

/// A fixed-size inode record: one file or directory.
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct Inode {
	/// Self-index into the inode table.
	pub ino: u16,
	/// `1` if allocated, `0` if free or tombstoned.
	pub valid: u8,
	/// [`TYPE_FILE`] or [`TYPE_DIR`].
	pub itype: u8,
	/// Reference count.
	pub link: u32,
	/// Logical byte length (file) or `BLOCK_SIZE * blocks_used` (directory).
	pub size: u64,
	/// Absolute block indices into the data region. `NO_BLOCK` terminates the live prefix.
	pub direct_ptr: [i32; DIRECT_PTR_COUNT],
	pub vstat: Vstat,
	_padding: [u8; INODE_SIZE - 2 - 1 - 1 - 4 - 8 - DIRECT_PTR_COUNT * 4 - std::mem::size_of::<Vstat>()],
}

const _: () = assert!(BLOCK_SIZE.is_multiple_of(INODE_SIZE));
const _: () = assert!(std::mem::size_of::<Inode>() == INODE_SIZE);

impl Inode {
	/// Builds a fresh, unallocated inode with every direct pointer set to [`NO_BLOCK`].
	pub fn empty(ino: u16) -> Self {
		Self {
			ino,
			valid: 0,
			itype: TYPE_FILE,
			link: 0,
			size: 0,
			direct_ptr: [NO_BLOCK; DIRECT_PTR_COUNT],
			vstat: Vstat::default(),
			_padding: [0; INODE_SIZE - 2 - 1 - 1 - 4 - 8 - DIRECT_PTR_COUNT * 4 - std::mem::size_of::<Vstat>()],
		}
	}

	/// Index of the first unallocated direct pointer slot, if any remain.
	pub fn first_free_slot(&self) -> Option<usize> {
		let direct_ptr = self.direct_ptr;
		direct_ptr.iter().position(|&p| p == NO_BLOCK)
	}
}

/// Computes the inode-table block holding inode `ino` and the inode's offset within it.
pub fn locate(ino: u16) -> (u32, usize) {
	let block = I_START_BLK + ino as u32 / INODES_PER_BLOCK;
	let offset = (ino as u32 % INODES_PER_BLOCK) as usize * INODE_SIZE;
	(block, offset)
}

/// Reinterprets the `INODE_SIZE` bytes at `offset` in `block` as an inode.
fn inode_at(block: &Block, offset: usize) -> Inode {
	unsafe { *(block[offset..offset + INODE_SIZE].as_ptr() as *const Inode) }
}

/// Overwrites the `INODE_SIZE` bytes at `offset` in `block` with `inode`.
fn write_at(block: &mut Block, offset: usize, inode: &Inode) {
	let bytes = unsafe {
		std::slice::from_raw_parts(inode as *const _ as *const u8, INODE_SIZE)
	};
	block[offset..offset + INODE_SIZE].copy_from_slice(bytes);
}

impl Tfs {
	/// Reads inode `ino` from the inode table.
	pub fn read_inode(&mut self, ino: u16) -> Result<Inode> {
		let (block_no, offset) = locate(ino);
		let mut block = zero_block();
		self.dev.bio_read(block_no, &mut block)?;
		Ok(inode_at(&block, offset))
	}

	/// Writes `inode` back to its slot, read-modify-write since 16 inodes share a block.
	pub fn write_inode(&mut self, inode: &Inode) -> Result<()> {
		let (block_no, offset) = locate(inode.ino);
		let mut block = zero_block();
		self.dev.bio_read(block_no, &mut block)?;
		write_at(&mut block, offset, inode);
		self.dev.bio_write(block_no, &block)?;
		Ok(())
	}

	/// Reads inode `ino` and fails with [`TfsError::NotFound`] unless it is live.
	pub fn read_live_inode(&mut self, ino: u16) -> Result<Inode> {
		let inode = self.read_inode(ino)?;
		if inode.valid == 0 {
			return Err(TfsError::NotFound);
		}
		Ok(inode)
	}
}
