//! Error taxonomy shared by every operation in the filesystem core.
//!
//! Every fallible operation returns a [`TfsError`]; [`TfsError::to_errno`] maps it to the
//! negative `errno` value the host callback dispatcher expects.

use std::io;

/// An error produced by a filesystem operation.
#[derive(Debug, thiserror::Error)]
pub enum TfsError {
	/// A path component does not exist.
	#[error("no such file or directory")]
	NotFound,
	/// A directory already contains a live entry with the requested name.
	#[error("entry already exists")]
	Duplicate,
	/// The inode bitmap, data bitmap, or a directory's direct pointer slots are exhausted.
	#[error("no space left on device")]
	NoSpace,
	/// A write would extend a file past the last direct pointer's block.
	#[error("file too large")]
	FileTooBig,
	/// `rmdir` was called on a directory that still has live entries.
	#[error("directory not empty")]
	NotEmpty,
	/// A directory operation was attempted on a regular file.
	#[error("not a directory")]
	NotADirectory,
	/// A file operation was attempted on a directory.
	#[error("is a directory")]
	IsADirectory,
	/// A path component or absolute path exceeds the on-disk length limit.
	#[error("name too long")]
	NameTooLong,
	/// The superblock magic does not match; the image is not (or no longer) a valid TFS image.
	#[error("corrupt image")]
	CorruptImage,
	/// The backing block device failed.
	#[error("I/O error: {0}")]
	Io(#[from] io::Error),
}

impl TfsError {
	/// Maps this error to the negative `errno` value returned to the host dispatcher.
	pub fn to_errno(&self) -> i32 {
		match self {
			Self::NotFound => -libc::ENOENT,
			Self::Duplicate => -libc::EEXIST,
			Self::NoSpace => -libc::ENOSPC,
			Self::FileTooBig => -libc::EFBIG,
			Self::NotEmpty => -libc::ENOTEMPTY,
			Self::NotADirectory => -libc::ENOTDIR,
			Self::IsADirectory => -libc::EISDIR,
			Self::NameTooLong => -libc::ENAMETOOLONG,
			Self::CorruptImage | Self::Io(_) => -libc::EIO,
		}
	}
}

/// Convenience alias used throughout the core.
pub type Result<T> = std::result::Result<T, TfsError>;
