//! Regular-file operations: block-crossing read and write, create, and unlink.

use crate::block::{zero_block, BLOCK_SIZE};
use crate::error::{Result, TfsError};
use crate::inode::{Inode, DIRECT_PTR_COUNT, NO_BLOCK, TYPE_DIR, TYPE_FILE};
use crate::path::split_parent_child;
use crate::Tfs;

/// Largest offset+size a write may reach: one block per direct pointer.
pub const MAX_FILE_SIZE: u64 = (DIRECT_PTR_COUNT * BLOCK_SIZE) as u64;

impl Tfs {
	/// Creates a regular file named by the last component of `path` in its parent directory.
	/// Returns the new file's inode number.
	pub fn create(&mut self, path: &str) -> Result<u16> {
		let (parent_path, name) = split_parent_child(path)?;
		let parent_ino = self.resolve(parent_path)?;
		let mut parent = self.read_live_inode(parent_ino)?;
		if parent.itype != TYPE_DIR {
			return Err(TfsError::NotADirectory);
		}

		let child_ino = self.allocate_inode()?;
		// dir_add validates the name and rejects duplicates before any inode is persisted, so
		// roll back the allocation on failure rather than leaving a dangling bitmap bit.
		if let Err(e) = self.dir_add(&mut parent, child_ino, name.as_bytes()) {
			self.free_inode(child_ino)?;
			return Err(e);
		}

		let mut child = Inode::empty(child_ino);
		child.valid = 1;
		child.itype = TYPE_FILE;
		child.link = 1;
		child.vstat.mode = 0o100644;
		child.vstat.blksize = BLOCK_SIZE as u32;
		child.vstat.ino = child_ino as u64;
		self.write_inode(&child)?;
		Ok(child_ino)
	}

	/// Removes the regular file at `path`, releasing its inode and data blocks.
	pub fn unlink(&mut self, path: &str) -> Result<()> {
		let (parent_path, name) = split_parent_child(path)?;
		let parent_ino = self.resolve(parent_path)?;
		let target_ino = self.dir_lookup(parent_ino, name.as_bytes())?.ino;
		let target = self.read_live_inode(target_ino)?;
		if target.itype != TYPE_FILE {
			return Err(TfsError::IsADirectory);
		}
		self.release_inode(target)?;
		self.dir_remove(parent_ino, name.as_bytes())?;
		Ok(())
	}

	/// Clears every allocated data block referenced by `inode`, resets its direct pointers to
	/// [`NO_BLOCK`], and frees the inode itself.
	pub(crate) fn release_inode(&mut self, mut inode: Inode) -> Result<()> {
		for i in 0..DIRECT_PTR_COUNT {
			let ptr = inode.direct_ptr[i];
			if ptr == NO_BLOCK {
				break;
			}
			self.free_data_block(ptr)?;
			inode.direct_ptr[i] = NO_BLOCK;
		}
		inode.valid = 0;
		self.write_inode(&inode)?;
		self.free_inode(inode.ino)
	}

	/// Reads up to `size` bytes from `ino` at `offset`. Never allocates.
	pub fn read_file(&mut self, ino: u16, size: usize, offset: u64) -> Result<Vec<u8>> {
		let inode = self.read_live_inode(ino)?;
		if inode.itype != TYPE_FILE {
			return Err(TfsError::IsADirectory);
		}
		if offset >= inode.size {
			return Ok(Vec::new());
		}
		let to_read = size.min((inode.size - offset) as usize);
		let mut out = Vec::with_capacity(to_read);

		let mut remaining = to_read;
		let mut off = offset;
		while remaining > 0 {
			let block_idx = (off / BLOCK_SIZE as u64) as usize;
			let in_block = (off % BLOCK_SIZE as u64) as usize;
			let chunk = remaining.min(BLOCK_SIZE - in_block);

			let ptr = inode.direct_ptr[block_idx];
			if ptr == NO_BLOCK {
				out.resize(out.len() + chunk, 0);
			} else {
				let mut block = zero_block();
				self.dev.bio_read(ptr as u32, &mut block)?;
				out.extend_from_slice(&block[in_block..in_block + chunk]);
			}

			off += chunk as u64;
			remaining -= chunk;
		}
		Ok(out)
	}

	/// Writes `data` into file `ino` at `offset`, crossing block boundaries and allocating new
	/// data blocks as needed. Returns the number of bytes written.
	pub fn write_file(&mut self, ino: u16, data: &[u8], offset: u64) -> Result<usize> {
		let mut inode = self.read_live_inode(ino)?;
		if inode.itype != TYPE_FILE {
			return Err(TfsError::IsADirectory);
		}
		let size = data.len() as u64;
		if offset + size > MAX_FILE_SIZE {
			return Err(TfsError::FileTooBig);
		}

		let mut blocks_added = 0u64;
		let mut newly_allocated = Vec::new();
		let mut written = 0usize;
		let mut off = offset;
		let result = (|| -> Result<()> {
			while written < data.len() {
				let block_idx = (off / BLOCK_SIZE as u64) as usize;
				let in_block = (off % BLOCK_SIZE as u64) as usize;
				let chunk = (data.len() - written).min(BLOCK_SIZE - in_block);
				let whole_block = in_block == 0 && chunk == BLOCK_SIZE;

				if inode.direct_ptr[block_idx] == NO_BLOCK {
					let abs = self.allocate_data_block()?;
					inode.direct_ptr[block_idx] = abs;
					newly_allocated.push(abs);
					blocks_added += 1;
				}
				let abs = inode.direct_ptr[block_idx] as u32;

				// A full-block overwrite never needs the prior contents, so skip the read.
				let mut block = if whole_block {
					zero_block()
				} else {
					let mut b = zero_block();
					self.dev.bio_read(abs, &mut b)?;
					b
				};
				block[in_block..in_block + chunk].copy_from_slice(&data[written..written + chunk]);
				self.dev.bio_write(abs, &block)?;

				off += chunk as u64;
				written += chunk;
			}
			Ok(())
		})();

		if let Err(e) = result {
			// Roll back every data block this call allocated and reset the inode's direct
			// pointers so the failed write leaves no trace in the bitmap or the inode.
			for abs in newly_allocated {
				self.free_data_block(abs)?;
				for i in 0..DIRECT_PTR_COUNT {
					if inode.direct_ptr[i] == abs {
						inode.direct_ptr[i] = NO_BLOCK;
						break;
					}
				}
			}
			return Err(e);
		}

		inode.size += written as u64;
		inode.vstat.size += written as u64;
		inode.vstat.blocks += blocks_added;
		self.write_inode(&inode)?;
		Ok(written)
	}
}

#[cfg(test)]
mod test {
	use crate::test_support::fresh_fs;

	#[test]
	fn create_then_write_then_read_round_trips() {
		let mut fs = fresh_fs();
		fs.create("/f").unwrap();
		let ino = fs.resolve("/f").unwrap();
		let n = fs.write_file(ino, b"hello", 0).unwrap();
		assert_eq!(n, 5);
		let out = fs.read_file(ino, 5, 0).unwrap();
		assert_eq!(out, b"hello");
	}

	#[test]
	fn write_across_block_boundary_allocates_two_blocks() {
		let mut fs = fresh_fs();
		fs.create("/f").unwrap();
		let ino = fs.resolve("/f").unwrap();
		let data = vec![7u8; 4096];
		let n = fs.write_file(ino, &data, 4094).unwrap();
		assert_eq!(n, 4096);
		let inode = fs.read_inode(ino).unwrap();
		assert_ne!({ inode.direct_ptr[0] }, crate::inode::NO_BLOCK);
		assert_ne!({ inode.direct_ptr[1] }, crate::inode::NO_BLOCK);
		assert_eq!({ inode.vstat.blocks }, 2);
	}

	#[test]
	fn write_past_last_block_is_file_too_big() {
		let mut fs = fresh_fs();
		fs.create("/f").unwrap();
		let ino = fs.resolve("/f").unwrap();
		assert!(fs.write_file(ino, &[0u8; 1], crate::fileops::MAX_FILE_SIZE - 1).is_ok());
		let ino2 = fs.create("/g").unwrap();
		assert!(matches!(
			fs.write_file(ino2, &[0u8; 2], crate::fileops::MAX_FILE_SIZE - 1),
			Err(crate::error::TfsError::FileTooBig)
		));
	}

	#[test]
	fn read_past_eof_returns_empty() {
		let mut fs = fresh_fs();
		fs.create("/f").unwrap();
		let ino = fs.resolve("/f").unwrap();
		fs.write_file(ino, b"hi", 0).unwrap();
		assert_eq!(fs.read_file(ino, 10, 2).unwrap(), Vec::<u8>::new());
	}

	#[test]
	fn unlink_then_recreate_leaves_no_stale_entry() {
		let mut fs = fresh_fs();
		fs.create("/x").unwrap();
		fs.unlink("/x").unwrap();
		assert!(matches!(fs.resolve("/x"), Err(crate::error::TfsError::NotFound)));
		assert!(fs.create("/x").is_ok());
	}

	#[test]
	fn write_rolls_back_blocks_allocated_this_call_on_mid_write_no_space() {
		let mut fs = fresh_fs();
		fs.create("/f").unwrap();
		let ino = fs.resolve("/f").unwrap();

		// Exhaust every data block except the one the root directory already holds, leaving
		// exactly one free for this call's write to consume.
		let mut held = Vec::new();
		loop {
			match fs.allocate_data_block() {
				Ok(abs) => held.push(abs),
				Err(crate::error::TfsError::NoSpace) => break,
				Err(e) => panic!("unexpected error: {e}"),
			}
		}
		let abs = held.pop().unwrap();
		fs.free_data_block(abs).unwrap();

		// A two-block write now allocates the one remaining block for the head block, then
		// fails with NoSpace trying to allocate the tail block.
		let data = vec![9u8; 4096 + 1];
		assert!(matches!(
			fs.write_file(ino, &data, 0),
			Err(crate::error::TfsError::NoSpace)
		));

		// The block allocated for the head write before the failure must have been freed again
		// and the inode must show no trace of the aborted write.
		let reclaimed = fs.allocate_data_block().unwrap();
		assert_eq!(reclaimed, abs);
		let inode = fs.read_inode(ino).unwrap();
		assert_eq!({ inode.size }, 0);
		assert_eq!({ inode.direct_ptr[0] }, crate::inode::NO_BLOCK);
	}

	#[test]
	fn create_rolls_back_inode_allocation_on_duplicate() {
		let mut fs = fresh_fs();
		fs.create("/dup").unwrap();
		assert!(matches!(fs.create("/dup"), Err(crate::error::TfsError::Duplicate)));
		// The failed create must not have leaked an inode.
		let reclaimed = fs.allocate_inode().unwrap();
		fs.free_inode(reclaimed).unwrap();
		fs.create("/another").unwrap();
	}
}
