//! Wires the host callback dispatcher (a FUSE session, via the `fuser` crate) to the
//! path-oriented operations in [`crate::dirops`] and [`crate::fileops`].
//!
//! FUSE addresses files by inode number, but every core operation in this crate resolves an
//! absolute path. [`FuseTfs`] bridges the two by remembering, for every inode FUSE has looked up,
//! the absolute path it resolves to. This cache holds only path strings for protocol bookkeeping,
//! never inode content or bitmap state, which are always reread from the backing file.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::time::{Duration, SystemTime};

use fuser::{
	FileAttr, FileType, Filesystem, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory,
	ReplyEmpty, ReplyEntry, ReplyOpen, ReplyWrite, Request,
};
use log::debug;

use crate::inode::Vstat;
use crate::Tfs;

/// Attributes are never cached by the kernel across calls for longer than this.
const TTL: Duration = Duration::from_secs(1);
/// FUSE reserves inode `0`; inode `1` is the filesystem root by convention.
const FUSE_ROOT: u64 = 1;

/// Adapts [`Tfs`] to `fuser::Filesystem`, translating FUSE's inode-addressed calls into the
/// crate's path-addressed operations.
pub struct FuseTfs {
	fs: Tfs,
	paths: HashMap<u64, String>,
}

impl FuseTfs {
	/// Wraps an already-mounted filesystem for serving over FUSE.
	pub fn new(fs: Tfs) -> Self {
		let mut paths = HashMap::new();
		paths.insert(FUSE_ROOT, "/".to_owned());
		Self {
			fs,
			paths,
		}
	}

	fn path_of(&self, ino: u64) -> Option<&str> {
		self.paths.get(&ino).map(String::as_str)
	}

	fn join(parent: &str, name: &OsStr) -> Option<String> {
		let name = name.to_str()?;
		if parent == "/" {
			Some(format!("/{name}"))
		} else {
			Some(format!("{parent}/{name}"))
		}
	}

	fn remember(&mut self, path: String, ino: u64) {
		self.paths.insert(ino, path);
	}

	fn attr_of(ino: u64, vstat: Vstat) -> FileAttr {
		let kind = if vstat.mode & libc::S_IFMT == libc::S_IFDIR {
			FileType::Directory
		} else {
			FileType::RegularFile
		};
		let now = SystemTime::now();
		FileAttr {
			ino,
			size: vstat.size,
			blocks: vstat.blocks,
			atime: now,
			mtime: now,
			ctime: now,
			crtime: now,
			kind,
			perm: (vstat.mode & 0o7777) as u16,
			nlink: if kind == FileType::Directory { 2 } else { 1 },
			uid: unsafe { libc::getuid() },
			gid: unsafe { libc::getgid() },
			rdev: 0,
			blksize: vstat.blksize,
			flags: 0,
		}
	}
}

impl Filesystem for FuseTfs {
	fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
		let Some(parent_path) = self.path_of(parent).map(str::to_owned) else {
			reply.error(libc::ENOENT);
			return;
		};
		let Some(child_path) = Self::join(&parent_path, name) else {
			reply.error(libc::EINVAL);
			return;
		};
		match self.fs.getattr(&child_path) {
			Ok(vstat) => {
				let ino = vstat.ino + 1;
				self.remember(child_path, ino);
				reply.entry(&TTL, &Self::attr_of(ino, vstat), 0);
			}
			Err(e) => reply.error(-e.to_errno()),
		}
	}

	fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
		let Some(path) = self.path_of(ino).map(str::to_owned) else {
			reply.error(libc::ENOENT);
			return;
		};
		match self.fs.getattr(&path) {
			Ok(vstat) => reply.attr(&TTL, &Self::attr_of(ino, vstat)),
			Err(e) => reply.error(-e.to_errno()),
		}
	}

	#[allow(clippy::too_many_arguments)]
	fn setattr(
		&mut self,
		_req: &Request<'_>,
		ino: u64,
		_mode: Option<u32>,
		_uid: Option<u32>,
		_gid: Option<u32>,
		_size: Option<u64>,
		_atime: Option<fuser::TimeOrNow>,
		_mtime: Option<fuser::TimeOrNow>,
		_ctime: Option<std::time::SystemTime>,
		_fh: Option<u64>,
		_crtime: Option<std::time::SystemTime>,
		_chgtime: Option<std::time::SystemTime>,
		_bkuptime: Option<std::time::SystemTime>,
		_flags: Option<u32>,
		reply: ReplyAttr,
	) {
		let Some(path) = self.path_of(ino).map(str::to_owned) else {
			reply.error(libc::ENOENT);
			return;
		};
		match self.fs.getattr(&path) {
			Ok(vstat) => reply.attr(&TTL, &Self::attr_of(ino, vstat)),
			Err(e) => reply.error(-e.to_errno()),
		}
	}

	fn mkdir(
		&mut self,
		_req: &Request<'_>,
		parent: u64,
		name: &OsStr,
		_mode: u32,
		_umask: u32,
		reply: ReplyEntry,
	) {
		let Some(parent_path) = self.path_of(parent).map(str::to_owned) else {
			reply.error(libc::ENOENT);
			return;
		};
		let Some(child_path) = Self::join(&parent_path, name) else {
			reply.error(libc::EINVAL);
			return;
		};
		match self.fs.mkdir(&child_path) {
			Ok(child_ino) => {
				let ino = child_ino as u64 + 1;
				let vstat = self.fs.getattr(&child_path).unwrap_or_default_vstat(ino);
				self.remember(child_path, ino);
				reply.entry(&TTL, &Self::attr_of(ino, vstat), 0);
			}
			Err(e) => reply.error(-e.to_errno()),
		}
	}

	fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
		let Some(parent_path) = self.path_of(parent).map(str::to_owned) else {
			reply.error(libc::ENOENT);
			return;
		};
		let Some(child_path) = Self::join(&parent_path, name) else {
			reply.error(libc::EINVAL);
			return;
		};
		match self.fs.rmdir(&child_path) {
			Ok(()) => reply.ok(),
			Err(e) => reply.error(-e.to_errno()),
		}
	}

	fn create(
		&mut self,
		_req: &Request<'_>,
		parent: u64,
		name: &OsStr,
		_mode: u32,
		_umask: u32,
		_flags: i32,
		reply: ReplyCreate,
	) {
		let Some(parent_path) = self.path_of(parent).map(str::to_owned) else {
			reply.error(libc::ENOENT);
			return;
		};
		let Some(child_path) = Self::join(&parent_path, name) else {
			reply.error(libc::EINVAL);
			return;
		};
		match self.fs.create(&child_path) {
			Ok(child_ino) => {
				let ino = child_ino as u64 + 1;
				let vstat = self.fs.getattr(&child_path).unwrap_or_default_vstat(ino);
				self.remember(child_path, ino);
				reply.created(&TTL, &Self::attr_of(ino, vstat), 0, 0, 0);
			}
			Err(e) => reply.error(-e.to_errno()),
		}
	}

	fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
		let Some(parent_path) = self.path_of(parent).map(str::to_owned) else {
			reply.error(libc::ENOENT);
			return;
		};
		let Some(child_path) = Self::join(&parent_path, name) else {
			reply.error(libc::EINVAL);
			return;
		};
		match self.fs.unlink(&child_path) {
			Ok(()) => reply.ok(),
			Err(e) => reply.error(-e.to_errno()),
		}
	}

	fn open(&mut self, _req: &Request<'_>, _ino: u64, _flags: i32, reply: ReplyOpen) {
		reply.opened(0, 0);
	}

	fn opendir(&mut self, _req: &Request<'_>, _ino: u64, _flags: i32, reply: ReplyOpen) {
		reply.opened(0, 0);
	}

	fn release(
		&mut self,
		_req: &Request<'_>,
		_ino: u64,
		_fh: u64,
		_flags: i32,
		_lock_owner: Option<u64>,
		_flush: bool,
		reply: ReplyEmpty,
	) {
		reply.ok();
	}

	fn releasedir(&mut self, _req: &Request<'_>, _ino: u64, _fh: u64, _flags: i32, reply: ReplyEmpty) {
		reply.ok();
	}

	fn flush(&mut self, _req: &Request<'_>, _ino: u64, _fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
		reply.ok();
	}

	fn read(
		&mut self,
		_req: &Request<'_>,
		ino: u64,
		_fh: u64,
		offset: i64,
		size: u32,
		_flags: i32,
		_lock_owner: Option<u64>,
		reply: ReplyData,
	) {
		let Some(path) = self.path_of(ino).map(str::to_owned) else {
			reply.error(libc::ENOENT);
			return;
		};
		let fs_ino = match self.fs.resolve(&path) {
			Ok(i) => i,
			Err(e) => {
				reply.error(-e.to_errno());
				return;
			}
		};
		match self.fs.read_file(fs_ino, size as usize, offset as u64) {
			Ok(data) => reply.data(&data),
			Err(e) => reply.error(-e.to_errno()),
		}
	}

	fn write(
		&mut self,
		_req: &Request<'_>,
		ino: u64,
		_fh: u64,
		offset: i64,
		data: &[u8],
		_write_flags: u32,
		_flags: i32,
		_lock_owner: Option<u64>,
		reply: ReplyWrite,
	) {
		let Some(path) = self.path_of(ino).map(str::to_owned) else {
			reply.error(libc::ENOENT);
			return;
		};
		let fs_ino = match self.fs.resolve(&path) {
			Ok(i) => i,
			Err(e) => {
				reply.error(-e.to_errno());
				return;
			}
		};
		match self.fs.write_file(fs_ino, data, offset as u64) {
			Ok(written) => reply.written(written as u32),
			Err(e) => reply.error(-e.to_errno()),
		}
	}

	fn readdir(&mut self, _req: &Request<'_>, ino: u64, _fh: u64, offset: i64, mut reply: ReplyDirectory) {
		let Some(path) = self.path_of(ino).map(str::to_owned) else {
			reply.error(libc::ENOENT);
			return;
		};
		let mut entries: Vec<(u16, Vec<u8>)> = Vec::new();
		if let Err(e) = self.fs.readdir(&path, |child_ino, name| {
			entries.push((child_ino, name.to_vec()));
		}) {
			reply.error(-e.to_errno());
			return;
		}

		let mut all = vec![(ino, FileType::Directory, ".".to_owned())];
		all.push((ino, FileType::Directory, "..".to_owned()));
		for (child_ino, name) in entries {
			let name = String::from_utf8_lossy(&name).into_owned();
			let child_path = Self::join(&path, OsStr::new(&name)).unwrap_or_default();
			let kind = match self.fs.getattr(&child_path) {
				Ok(v) if v.mode & libc::S_IFMT == libc::S_IFDIR => FileType::Directory,
				_ => FileType::RegularFile,
			};
			all.push((child_ino as u64 + 1, kind, name));
		}

		for (i, (child_ino, kind, name)) in all.into_iter().enumerate().skip(offset as usize) {
			if reply.add(child_ino, (i + 1) as i64, kind, &name) {
				break;
			}
		}
		reply.ok();
	}

	fn init(
		&mut self,
		_req: &Request<'_>,
		_config: &mut fuser::KernelConfig,
	) -> Result<(), std::os::raw::c_int> {
		debug!("mounted {}", self.fs.backing_path().display());
		Ok(())
	}

	fn destroy(&mut self) {
		debug!("unmounted {}", self.fs.backing_path().display());
	}
}

/// Helper trait so `mkdir`/`create` can fall back to a sensible [`Vstat`] if a racing removal
/// makes the immediate follow-up `getattr` fail (single-mount model: does not happen in
/// practice, but keeps the reply infallible).
trait OrDefaultVstat {
	fn unwrap_or_default_vstat(self, ino: u64) -> Vstat;
}

impl OrDefaultVstat for crate::error::Result<Vstat> {
	fn unwrap_or_default_vstat(self, ino: u64) -> Vstat {
		self.unwrap_or(Vstat {
			mode: libc::S_IFREG | 0o644,
			size: 0,
			blksize: crate::block::BLOCK_SIZE as u32,
			blocks: 0,
			ino,
		})
	}
}
