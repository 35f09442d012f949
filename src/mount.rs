//! Formatting and mount-time initialisation.

use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::block::{zero_block, BlockDevice};
use crate::error::Result;
use crate::inode::{Inode, Vstat, TYPE_DIR};
use crate::superblock::{Superblock, D_START_BLK, IMAGE_LEN, ROOT_INO};
use crate::Tfs;

impl Tfs {
	/// Formats a fresh image at `path`: truncates the backing file, writes the superblock, zeroes
	/// both bitmaps, and materialises the root directory (inode 0, one data block).
	pub fn mkfs(path: &Path) -> Result<()> {
		info!("formatting {}", path.display());
		BlockDevice::init(path, IMAGE_LEN)?;
		let mut dev = BlockDevice::open(path)?;

		dev.bio_write(0, &Superblock::new().to_block())?;
		dev.bio_write(crate::superblock::I_BITMAP_BLK, &zero_block())?;
		dev.bio_write(crate::superblock::D_BITMAP_BLK, &zero_block())?;

		let mut fs = Tfs {
			dev,
			path: path.to_owned(),
		};
		// Root occupies inode 0 and data block 0; mark both used directly rather than going
		// through allocate_inode/allocate_data_block, which would also work but this pins them to
		// the indices the invariants require.
		fs.mark_allocated(ROOT_INO, D_START_BLK as i32)?;

		let mut root = Inode::empty(ROOT_INO);
		root.valid = 1;
		root.itype = TYPE_DIR;
		root.link = 2;
		root.size = crate::block::BLOCK_SIZE as u64;
		root.direct_ptr[0] = D_START_BLK as i32;
		root.vstat = Vstat {
			mode: crate::dirops::DIR_MODE,
			size: crate::block::BLOCK_SIZE as u64,
			blksize: crate::block::BLOCK_SIZE as u32,
			blocks: 1,
			ino: ROOT_INO as u64,
		};
		fs.write_inode(&root)?;
		fs.dev.bio_write(D_START_BLK, &zero_block())?;
		Ok(())
	}

	/// Marks inode `ino` and absolute data block `block` as allocated in their bitmaps, without
	/// touching the inode table or data region (used only by `mkfs`, which initialises both
	/// directly afterwards).
	fn mark_allocated(&mut self, ino: u16, block: i32) -> Result<()> {
		let ino_bit = self.allocate_inode()?;
		debug_assert_eq!(ino_bit, ino);
		let data_bit = self.allocate_data_block()?;
		debug_assert_eq!(data_bit, block);
		Ok(())
	}

	/// Opens the backing file at `path`, formatting it first if it does not exist or its magic
	/// does not match.
	pub fn mount(path: &Path) -> Result<Self> {
		if BlockDevice::open(path).is_err() {
			Self::mkfs(path)?;
		}
		let mut dev = BlockDevice::open(path)?;
		let mut sb_block = zero_block();
		dev.bio_read(0, &mut sb_block)?;
		if !Superblock::from_block(&sb_block).is_valid() {
			warn!("{}: bad magic, reformatting", path.display());
			drop(dev);
			Self::mkfs(path)?;
			dev = BlockDevice::open(path)?;
		}
		info!("mounted {}", path.display());
		Ok(Self {
			dev,
			path: path.to_owned(),
		})
	}

	/// The path to the backing file this filesystem is mounted from.
	pub fn backing_path(&self) -> &PathBuf {
		&self.path
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use tempfile::NamedTempFile;

	#[test]
	fn mkfs_then_mount_root_is_stable() {
		let tmp = NamedTempFile::new().unwrap();
		std::fs::remove_file(tmp.path()).ok();
		Tfs::mkfs(tmp.path()).unwrap();

		let mut fs1 = Tfs::mount(tmp.path()).unwrap();
		let root1 = fs1.read_inode(ROOT_INO).unwrap();
		drop(fs1);

		let mut fs2 = Tfs::mount(tmp.path()).unwrap();
		let root2 = fs2.read_inode(ROOT_INO).unwrap();

		assert_eq!({ root1.link }, { root2.link });
		assert_eq!({ root1.direct_ptr[0] }, { root2.direct_ptr[0] });
		assert_eq!({ root1.size }, { root2.size });
	}

	#[test]
	fn mount_formats_when_file_absent() {
		let tmp = NamedTempFile::new().unwrap();
		let path = tmp.path().to_owned();
		std::fs::remove_file(&path).unwrap();
		let mut fs = Tfs::mount(&path).unwrap();
		assert!(fs.getattr("/").is_ok());
	}

	#[test]
	fn mount_reformats_on_bad_magic() {
		let tmp = NamedTempFile::new().unwrap();
		std::fs::remove_file(tmp.path()).ok();
		Tfs::mkfs(tmp.path()).unwrap();

		{
			let mut dev = BlockDevice::open(tmp.path()).unwrap();
			dev.bio_write(0, &zero_block()).unwrap();
		}

		let mut fs = Tfs::mount(tmp.path()).unwrap();
		assert!(fs.getattr("/").is_ok());
	}
}
