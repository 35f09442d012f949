//! Shared helpers for module unit tests.

use tempfile::NamedTempFile;

use crate::Tfs;

/// Formats and mounts a fresh image backed by a temporary file, leaking the temp-file handle so
/// the backing file outlives the returned [`Tfs`].
pub fn fresh_fs() -> Tfs {
	let tmp = NamedTempFile::new().unwrap();
	let path = tmp.path().to_owned();
	std::fs::remove_file(&path).ok();
	Tfs::mkfs(&path).unwrap();
	let fs = Tfs::mount(&path).unwrap();
	std::mem::forget(tmp);
	fs
}
