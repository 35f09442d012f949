//! Directory entry records.
//!
//! A directory entry maps a name to an inode. A slot can be in one of three states, collapsed
//! onto a single on-disk representation: *unset* (`valid = 0`, `ino = 0`,
//! `name[0] = 0`; never written, terminates a block's live prefix), *tombstone* (`valid = 0`
//! with a nonzero `ino` or name; a deleted entry, NOT a terminator), or *live* (`valid = 1`).

use crate::block::BLOCK_SIZE;

/// On-disk size of one directory entry. `BLOCK_SIZE` must be an exact multiple of this.
pub const DIRENT_SIZE: usize = 256;
/// Maximum length, in bytes, of one path component.
pub const NAME_MAX: usize = 252;

/// A single name-to-inode mapping within a directory block.
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct Dirent {
	pub ino: u16,
	pub valid: u8,
	name: [u8; DIRENT_SIZE - 2 - 1],
}

const _: () = assert!(BLOCK_SIZE.is_multiple_of(DIRENT_SIZE));
const _: () = assert!(std::mem::size_of::<Dirent>() == DIRENT_SIZE);
const _: () = assert!(DIRENT_SIZE - 2 - 1 > NAME_MAX);

impl Dirent {
	/// An unset slot: never written, terminates a block's live-entry scan.
	pub const UNSET: Self = Self {
		ino: 0,
		valid: 0,
		name: [0; DIRENT_SIZE - 2 - 1],
	};

	/// Builds a live entry for `ino` named `name`.
	///
	/// Fails if `name` exceeds [`NAME_MAX`] bytes.
	pub fn new(ino: u16, name: &[u8]) -> Option<Self> {
		if name.is_empty() || name.len() > NAME_MAX {
			return None;
		}
		let mut buf = [0u8; DIRENT_SIZE - 2 - 1];
		buf[..name.len()].copy_from_slice(name);
		Some(Self {
			ino,
			valid: 1,
			name: buf,
		})
	}

	/// This slot has never held a live entry (not a tombstone).
	pub fn is_unset(&self) -> bool {
		self.valid == 0 && self.ino == 0 && self.name[0] == 0
	}

	/// This slot is a tombstone: previously live, now removed.
	pub fn is_tombstone(&self) -> bool {
		self.valid == 0 && !self.is_unset()
	}

	/// This slot holds a live entry.
	pub fn is_live(&self) -> bool {
		self.valid == 1
	}

	/// The entry's name, up to its first null byte.
	pub fn name(&self) -> &[u8] {
		let len = self.name.iter().position(|&b| b == 0).unwrap_or(self.name.len());
		&self.name[..len]
	}

	/// Marks this entry as removed, preserving `ino` and `name` so it reads back as a tombstone.
	pub fn tombstone(&mut self) {
		self.valid = 0;
	}
}

/// Reinterprets one block as 16 directory entry slots.
pub fn slots(block: &crate::block::Block) -> &[Dirent] {
	let ptr = block.as_ptr() as *const Dirent;
	unsafe { std::slice::from_raw_parts(ptr, crate::superblock::DIRENTS_PER_BLOCK as usize) }
}

/// Reinterprets one block as 16 mutable directory entry slots.
pub fn slots_mut(block: &mut crate::block::Block) -> &mut [Dirent] {
	let ptr = block.as_mut_ptr() as *mut Dirent;
	unsafe { std::slice::from_raw_parts_mut(ptr, crate::superblock::DIRENTS_PER_BLOCK as usize) }
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::block::zero_block;

	#[test]
	fn zeroed_block_is_all_unset() {
		let block = zero_block();
		for slot in slots(&block) {
			assert!(slot.is_unset());
			assert!(!slot.is_tombstone());
			assert!(!slot.is_live());
		}
	}

	#[test]
	fn tombstone_is_distinct_from_unset() {
		let mut entry = Dirent::new(5, b"a").unwrap();
		entry.tombstone();
		assert!(entry.is_tombstone());
		assert!(!entry.is_unset());
	}

	#[test]
	fn name_stops_at_first_null() {
		let entry = Dirent::new(1, b"abc").unwrap();
		assert_eq!(entry.name(), b"abc");
	}

	#[test]
	fn oversized_name_is_rejected() {
		let long = vec![b'a'; NAME_MAX + 1];
		assert!(Dirent::new(1, &long).is_none());
	}

	#[test]
	fn max_length_name_is_accepted() {
		let name = vec![b'a'; NAME_MAX];
		assert!(Dirent::new(1, &name).is_some());
	}
}
