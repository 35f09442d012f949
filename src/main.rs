//! `tfs`: mounts a TFS image at a given mountpoint using FUSE.

use std::env;
use std::path::PathBuf;
use std::process::exit;

use fuser::MountOption;
use log::error;
use tfs::fuse_adapter::FuseTfs;
use tfs::Tfs;

/// Structure storing command line arguments.
#[derive(Default)]
struct Args {
	/// The name of the current program used in command line.
	prog: String,

	/// If true, print command line help.
	help: bool,
	/// If true, stay attached to the terminal instead of forking to the background.
	foreground: bool,

	/// The directory to mount the filesystem on.
	mountpoint: Option<PathBuf>,
	/// The backing disk image file. Defaults to `DISKFILE` in the current directory.
	diskfile: PathBuf,
}

fn parse_args() -> Args {
	let mut args = Args {
		diskfile: PathBuf::from("DISKFILE"),
		..Default::default()
	};
	let mut iter = env::args();
	args.prog = iter.next().unwrap_or("tfs".to_owned());

	while let Some(arg) = iter.next() {
		match arg.as_str() {
			"-h" | "--help" => args.help = true,
			"-f" | "--foreground" => args.foreground = true,
			"-d" | "--diskfile" => {
				args.diskfile = iter.next().map(PathBuf::from).unwrap_or_else(|| {
					eprintln!("{}: -d requires an argument", args.prog);
					exit(1);
				});
			}
			_ => {
				args.mountpoint = Some(PathBuf::from(arg));
			}
		}
	}

	args
}

fn print_help(prog: &str) {
	println!("Usage: {prog} [-f] [-d DISKFILE] MOUNTPOINT");
	println!();
	println!("  -f, --foreground       stay in the foreground instead of daemonizing");
	println!("  -d, --diskfile PATH    backing disk image (default: ./DISKFILE)");
	println!("  -h, --help             print this help and exit");
}

fn main() {
	env_logger::init();
	let args = parse_args();

	if args.help {
		print_help(&args.prog);
		return;
	}

	let mountpoint = args.mountpoint.unwrap_or_else(|| {
		eprintln!("{}: specify a mountpoint", args.prog);
		exit(1);
	});

	let fs = Tfs::mount(&args.diskfile).unwrap_or_else(|e| {
		eprintln!("{}: {}: {}", args.prog, args.diskfile.display(), e);
		exit(1);
	});

	let mut options = vec![MountOption::FSName("tfs".to_owned())];
	if args.foreground {
		options.push(MountOption::AutoUnmount);
	}

	if let Err(e) = fuser::mount2(FuseTfs::new(fs), &mountpoint, &options) {
		error!("{}: mount failed: {}", args.prog, e);
		exit(1);
	}
}
