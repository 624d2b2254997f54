use eyre::{Result, WrapErr};
use ips_patch::{backup, patch, show_patches, Decoder};
use log::{warn, LevelFilter};
use std::io::Write;
use std::path::PathBuf;
use structopt::StructOpt;

/// ips-patch: IPS patch tool
///
/// Applies IPS patches to ROM images in place, restores ROMs from their backups and lists the
/// contents of patches.
#[derive(StructOpt, Debug)]
#[structopt(name = "ips-patch")]
struct Opt {
    /// Log more (-v info, -vv debug, -vvv trace)
    #[structopt(short, long, parse(from_occurrences), global = true)]
    verbose: u8,

    /// Only log errors
    #[structopt(short, long, global = true)]
    quiet: bool,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(StructOpt, Debug)]
enum Command {
    /// Apply a patch to a ROM in place
    Patch {
        /// ROM to patch
        #[structopt(short, long, parse(from_os_str))]
        rom: PathBuf,

        /// Patch file, must end in .ips
        #[structopt(short, long, parse(from_os_str))]
        ips: PathBuf,

        /// Do not copy the ROM to <ROM>.bak first
        #[structopt(short = "B", long)]
        no_backup: bool,
    },

    /// Replace a ROM with its backup
    Restore {
        #[structopt(short, long, parse(from_os_str))]
        rom: PathBuf,
    },

    /// List the records of a patch
    Patches {
        #[structopt(short, long, parse(from_os_str))]
        ips: PathBuf,
    },
}

fn init_logging(verbose: u8, quiet: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));

    let level = match verbose {
        0 if quiet => Some(LevelFilter::Error),
        0 => None,
        1 => Some(LevelFilter::Info),
        2 => Some(LevelFilter::Debug),
        _ => Some(LevelFilter::Trace),
    };
    if let Some(level) = level {
        builder.filter_level(level);
    }

    builder.init();
}

fn run(cmd: Command) -> Result<()> {
    match cmd {
        Command::Patch {
            rom,
            ips,
            no_backup,
        } => {
            if no_backup {
                warn!(
                    "{} will be partly overwritten without a backup, this cannot be undone",
                    rom.display()
                );
            } else {
                backup::create(&rom)
                    .wrap_err_with(|| format!("Could not back up {}", rom.display()))?;
            }

            patch(&rom, &ips, |offset, len| {
                println!("{} bytes overwritten at offset {:#x}", len, offset)
            })
            .wrap_err_with(|| format!("Could not apply {} to {}", ips.display(), rom.display()))?;
            println!("Done.");
        }

        Command::Restore { rom } => {
            backup::restore(&rom)
                .wrap_err_with(|| format!("Could not restore {}", rom.display()))?;
            println!("Restored {} from backup.", rom.display());
        }

        Command::Patches { ips } => {
            let decoder = Decoder::open(&ips)
                .wrap_err_with(|| format!("Could not open {}", ips.display()))?;

            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            writeln!(out, "Patches for {}", ips.display())?;
            show_patches(decoder, &mut out)
                .wrap_err_with(|| format!("Could not read {}", ips.display()))?;
        }
    }

    Ok(())
}

fn main() {
    let args = Opt::from_args();
    init_logging(args.verbose, args.quiet);

    if let Err(e) = run(args.cmd) {
        eprintln!("{:?}", e);
        std::process::exit(1);
    }
}
