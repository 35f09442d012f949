//! Directory entry lookup, insertion (with dedup and growth), and tombstone-based removal.
//!
//! A directory's storage is the concatenation of up to [`DIRECT_PTR_COUNT`] blocks addressed by
//! its inode's `direct_ptr`; each block holds [`DIRENTS_PER_BLOCK`] entries. The first
//! `direct_ptr == NO_BLOCK` terminates the block list; within a block, the first unset slot
//! terminates the live prefix (tombstones are not terminators).

use crate::block::{zero_block, BLOCK_SIZE};
use crate::dirent::{slots, slots_mut, Dirent};
use crate::error::{Result, TfsError};
use crate::inode::{Inode, NO_BLOCK, TYPE_DIR};
use crate::Tfs;

impl Tfs {
	/// Looks up `name` in the directory `parent_ino`, returning its dirent if found.
	pub fn dir_lookup(&mut self, parent_ino: u16, name: &[u8]) -> Result<Dirent> {
		let parent = self.read_live_inode(parent_ino)?;
		if parent.itype != TYPE_DIR {
			return Err(TfsError::NotADirectory);
		}
		let direct_ptr = parent.direct_ptr;
		for &ptr in direct_ptr.iter() {
			if ptr == NO_BLOCK {
				break;
			}
			let mut block = zero_block();
			self.dev.bio_read(ptr as u32, &mut block)?;
			for slot in slots(&block) {
				if slot.is_unset() {
					break;
				}
				if slot.is_live() && slot.name() == name {
					return Ok(*slot);
				}
			}
		}
		Err(TfsError::NotFound)
	}

	/// Adds a `name -> child_ino` entry to the directory `parent`, updating it in place.
	///
	/// Scans existing blocks left-to-right for the first unset-or-tombstoned slot; if none is
	/// free and a direct pointer slot remains, allocates and zero-initialises a new block.
	pub fn dir_add(&mut self, parent: &mut Inode, child_ino: u16, name: &[u8]) -> Result<()> {
		let entry = Dirent::new(child_ino, name).ok_or(TfsError::NameTooLong)?;

		let direct_ptr = parent.direct_ptr;
		for &ptr in direct_ptr.iter() {
			if ptr == NO_BLOCK {
				break;
			}
			let mut block = zero_block();
			self.dev.bio_read(ptr as u32, &mut block)?;
			let slots = slots_mut(&mut block);
			for slot in slots.iter() {
				if slot.is_live() && slot.name() == name {
					return Err(TfsError::Duplicate);
				}
			}
			for (i, slot) in slots.iter().enumerate() {
				if slot.is_unset() || slot.is_tombstone() {
					slots[i] = entry;
					self.dev.bio_write(ptr as u32, &block)?;
					return Ok(());
				}
			}
		}

		let free_slot = parent.first_free_slot().ok_or(TfsError::NoSpace)?;
		let new_block_abs = self.allocate_data_block()?;
		let mut block = zero_block();
		slots_mut(&mut block)[0] = entry;
		self.dev.bio_write(new_block_abs as u32, &block)?;

		parent.direct_ptr[free_slot] = new_block_abs;
		parent.size += BLOCK_SIZE as u64;
		parent.vstat.size += BLOCK_SIZE as u64;
		parent.vstat.blocks += 1;
		self.write_inode(parent)?;
		Ok(())
	}

	/// Tombstones the entry named `name` in directory `parent_ino`.
	pub fn dir_remove(&mut self, parent_ino: u16, name: &[u8]) -> Result<()> {
		let parent = self.read_live_inode(parent_ino)?;
		let direct_ptr = parent.direct_ptr;
		for &ptr in direct_ptr.iter() {
			if ptr == NO_BLOCK {
				break;
			}
			let mut block = zero_block();
			self.dev.bio_read(ptr as u32, &mut block)?;
			let slots = slots_mut(&mut block);
			for slot in slots.iter_mut() {
				if slot.is_unset() {
					break;
				}
				if slot.is_live() && slot.name() == name {
					slot.tombstone();
					self.dev.bio_write(ptr as u32, &block)?;
					return Ok(());
				}
			}
		}
		Err(TfsError::NotFound)
	}

	/// Whether directory `ino` has no live entries.
	pub fn dir_is_empty(&mut self, ino: u16) -> Result<bool> {
		let dir = self.read_live_inode(ino)?;
		let direct_ptr = dir.direct_ptr;
		for &ptr in direct_ptr.iter() {
			if ptr == NO_BLOCK {
				break;
			}
			let mut block = zero_block();
			self.dev.bio_read(ptr as u32, &mut block)?;
			for slot in slots(&block) {
				if slot.is_unset() {
					break;
				}
				if slot.is_live() {
					return Ok(false);
				}
			}
		}
		Ok(true)
	}
}
