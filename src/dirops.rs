//! Directory-level operations: `mkdir`, `rmdir`, `readdir`, `getattr`.

use crate::block::{zero_block, BLOCK_SIZE};
use crate::error::{Result, TfsError};
use crate::inode::{Inode, Vstat, TYPE_DIR};
use crate::path::split_parent_child;
use crate::superblock::ROOT_INO;
use crate::Tfs;

/// Mode bits for a directory (`S_IFDIR | 0755`).
pub const DIR_MODE: u32 = 0o040755;

impl Tfs {
	/// Creates a directory named by the last component of `path`. Returns the new directory's
	/// inode number.
	pub fn mkdir(&mut self, path: &str) -> Result<u16> {
		let (parent_path, name) = split_parent_child(path)?;
		let parent_ino = self.resolve(parent_path)?;
		let mut parent = self.read_live_inode(parent_ino)?;
		if parent.itype != TYPE_DIR {
			return Err(TfsError::NotADirectory);
		}

		let child_ino = self.allocate_inode()?;
		if let Err(e) = self.dir_add(&mut parent, child_ino, name.as_bytes()) {
			self.free_inode(child_ino)?;
			return Err(e);
		}

		let data_block = match self.allocate_data_block() {
			Ok(b) => b,
			Err(e) => {
				// Undo the directory entry and inode allocation; nothing else was persisted.
				let _ = self.dir_remove(parent_ino, name.as_bytes());
				let _ = self.free_inode(child_ino);
				return Err(e);
			}
		};
		self.dev.bio_write(data_block as u32, &zero_block())?;

		let mut child = Inode::empty(child_ino);
		child.valid = 1;
		child.itype = TYPE_DIR;
		child.link = 2;
		child.size = BLOCK_SIZE as u64;
		child.direct_ptr[0] = data_block;
		child.vstat = Vstat {
			mode: DIR_MODE,
			size: BLOCK_SIZE as u64,
			blksize: BLOCK_SIZE as u32,
			blocks: 1,
			ino: child_ino as u64,
		};
		self.write_inode(&child)?;

		// Traditional Unix semantics: a parent directory's link count only grows when a child
		// *directory* is added.
		parent.link += 1;
		self.write_inode(&parent)?;
		Ok(child_ino)
	}

	/// Removes the empty directory at `path`.
	pub fn rmdir(&mut self, path: &str) -> Result<()> {
		let (parent_path, name) = split_parent_child(path)?;
		let parent_ino = self.resolve(parent_path)?;
		let target_ino = self.dir_lookup(parent_ino, name.as_bytes())?.ino;
		let target = self.read_live_inode(target_ino)?;
		if target.itype != TYPE_DIR {
			return Err(TfsError::NotADirectory);
		}
		if !self.dir_is_empty(target_ino)? {
			return Err(TfsError::NotEmpty);
		}

		self.release_inode(target)?;
		self.dir_remove(parent_ino, name.as_bytes())?;

		let mut parent = self.read_live_inode(parent_ino)?;
		parent.link = parent.link.saturating_sub(1);
		self.write_inode(&parent)?;
		Ok(())
	}

	/// Invokes `filler` once for every live entry's name in the directory at `path`.
	pub fn readdir(&mut self, path: &str, mut filler: impl FnMut(u16, &[u8])) -> Result<()> {
		let ino = self.resolve(path)?;
		let inode = self.read_live_inode(ino)?;
		if inode.itype != TYPE_DIR {
			return Err(TfsError::NotADirectory);
		}
		let direct_ptr = inode.direct_ptr;
		for &ptr in direct_ptr.iter() {
			if ptr == crate::inode::NO_BLOCK {
				break;
			}
			let mut block = zero_block();
			self.dev.bio_read(ptr as u32, &mut block)?;
			for slot in crate::dirent::slots(&block) {
				if slot.is_live() {
					filler(slot.ino, slot.name());
				}
			}
		}
		Ok(())
	}

	/// Resolves `path` and returns a copy of its cached attributes.
	pub fn getattr(&mut self, path: &str) -> Result<Vstat> {
		let ino = self.resolve(path)?;
		let inode = self.read_live_inode(ino)?;
		Ok(inode.vstat)
	}

	/// Returns whether `ino` is the root directory.
	pub fn is_root(ino: u16) -> bool {
		ino == ROOT_INO
	}
}

#[cfg(test)]
mod test {
	use crate::test_support::fresh_fs;

	#[test]
	fn fresh_mount_root_getattr() {
		let mut fs = fresh_fs();
		let attr = fs.getattr("/").unwrap();
		assert_eq!({ attr.mode }, crate::dirops::DIR_MODE);
		assert_eq!({ attr.size }, 4096);
		assert_eq!({ attr.blocks }, 1);
	}

	#[test]
	fn mkdir_then_readdir_lists_it() {
		let mut fs = fresh_fs();
		fs.mkdir("/a").unwrap();
		let mut seen = Vec::new();
		fs.readdir("/", |ino, name| seen.push((ino, name.to_vec()))).unwrap();
		assert_eq!(seen.len(), 1);
		assert_eq!(seen[0].1, b"a");

		let attr = fs.getattr("/a").unwrap();
		assert_eq!({ attr.mode }, crate::dirops::DIR_MODE);
	}

	#[test]
	fn duplicate_mkdir_fails_without_leaking_bitmap_bit() {
		let mut fs = fresh_fs();
		fs.mkdir("/a").unwrap();
		assert!(matches!(fs.mkdir("/a"), Err(crate::error::TfsError::Duplicate)));
		// Bitmap should be unchanged by the failed second mkdir: only one inode (besides root)
		// and one data block (besides root's) are in use.
		let reclaimed_ino = fs.allocate_inode().unwrap();
		assert_eq!(reclaimed_ino, 2);
		fs.free_inode(reclaimed_ino).unwrap();
	}

	#[test]
	fn create_unlink_create_hides_intermediate_entry() {
		let mut fs = fresh_fs();
		fs.create("/x").unwrap();
		fs.unlink("/x").unwrap();
		let mut seen = Vec::new();
		fs.readdir("/", |_, name| seen.push(name.to_vec())).unwrap();
		assert!(seen.is_empty());
		assert!(fs.create("/x").is_ok());
	}

	#[test]
	fn rmdir_non_empty_is_rejected() {
		let mut fs = fresh_fs();
		fs.mkdir("/a").unwrap();
		fs.create("/a/f").unwrap();
		assert!(matches!(fs.rmdir("/a"), Err(crate::error::TfsError::NotEmpty)));
	}

	#[test]
	fn rmdir_empty_succeeds_and_frees_storage() {
		let mut fs = fresh_fs();
		fs.mkdir("/a").unwrap();
		fs.rmdir("/a").unwrap();
		assert!(matches!(fs.resolve("/a"), Err(crate::error::TfsError::NotFound)));
	}
}
