//! Absolute-path resolution and parent/child path splitting.

use crate::dirent::NAME_MAX;
use crate::error::{Result, TfsError};
use crate::superblock::ROOT_INO;
use crate::Tfs;

/// Maximum length, in bytes, of an absolute path.
pub const PATH_MAX: usize = 252;

impl Tfs {
	/// Resolves an absolute path to an inode number, starting from the root.
	///
	/// The empty path (`/`) resolves to [`ROOT_INO`].
	pub fn resolve(&mut self, path: &str) -> Result<u16> {
		if path.len() > PATH_MAX {
			return Err(TfsError::NameTooLong);
		}
		let mut ino = ROOT_INO;
		for component in path.split('/').filter(|c| !c.is_empty()) {
			let bytes = component.as_bytes();
			if bytes.len() > NAME_MAX {
				return Err(TfsError::NameTooLong);
			}
			ino = self.dir_lookup(ino, bytes)?.ino;
		}
		Ok(ino)
	}
}

/// Splits an absolute path into its parent path and final component name.
///
/// `"/a/b"` splits into `("/a", "b")`; `"/a"` splits into `("", "a")` (parent is root).
pub fn split_parent_child(path: &str) -> Result<(&str, &str)> {
	let trimmed = path.strip_prefix('/').unwrap_or(path);
	match trimmed.rfind('/') {
		Some(i) => Ok((&path[..i + 1], &trimmed[i + 1..])),
		None => Ok(("", trimmed)),
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::test_support::fresh_fs;

	#[test]
	fn root_resolves_to_root_ino() {
		let mut fs = fresh_fs();
		assert_eq!(fs.resolve("/").unwrap(), ROOT_INO);
		assert_eq!(fs.resolve("").unwrap(), ROOT_INO);
	}

	#[test]
	fn missing_component_is_not_found() {
		let mut fs = fresh_fs();
		assert!(matches!(fs.resolve("/missing"), Err(TfsError::NotFound)));
	}

	#[test]
	fn multi_component_path_walks_each_directory() {
		let mut fs = fresh_fs();
		fs.mkdir("/a").unwrap();
		let b_ino = fs.mkdir("/a/b").unwrap();

		assert_eq!(fs.resolve("/a/b").unwrap(), b_ino);
	}

	#[test]
	fn split_parent_child_cases() {
		assert_eq!(split_parent_child("/a").unwrap(), ("", "a"));
		assert_eq!(split_parent_child("/a/b").unwrap(), ("/a", "b"));
		assert_eq!(split_parent_child("/a/b/c").unwrap(), ("/a/b", "c"));
	}

	#[test]
	fn path_length_boundary() {
		let mut fs = fresh_fs();
		let ok = format!("/{}", "a".repeat(PATH_MAX - 1));
		assert_eq!(ok.len(), PATH_MAX);
		// Resolution fails with NotFound (no such entry), not NameTooLong, at the boundary.
		assert!(matches!(fs.resolve(&ok), Err(TfsError::NotFound)));

		let too_long = format!("/{}", "a".repeat(PATH_MAX));
		assert!(matches!(fs.resolve(&too_long), Err(TfsError::NameTooLong)));
	}
}
