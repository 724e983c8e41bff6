//! wslpatch CLI - apply guest config patches through the host-visible distro root

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};

use wslpatch::ops::{apply_release, FailurePolicy, SetupOptions};
use wslpatch::{ApplyOptions, HostPath, PatchRegistry, RegistryConfig, WriteMode};

#[derive(Parser)]
#[command(name = "wslpatch")]
#[command(about = "patch WSL guest config files from the host side")]
#[command(version)]
struct Cli {
    /// more output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// print the host path of a guest path
    Translate {
        /// host-visible distro root
        prefix: String,

        /// absolute guest path
        guest_path: String,
    },

    /// list the patches for a release
    List {
        /// distro release
        #[arg(short, long, env = "WSLPATCH_RELEASE", default_value = "")]
        release: String,

        /// extra patches layered over the built-in ones
        #[arg(long, env = "WSLPATCH_REGISTRY")]
        registry: Option<PathBuf>,
    },

    /// apply the patches for a release
    Apply {
        /// host-visible distro root
        #[arg(short, long)]
        prefix: PathBuf,

        /// distro release
        #[arg(short, long, env = "WSLPATCH_RELEASE", default_value = "")]
        release: String,

        /// extra patches layered over the built-in ones
        #[arg(long, env = "WSLPATCH_REGISTRY")]
        registry: Option<PathBuf>,

        /// only show what would change
        #[arg(long)]
        dry_run: bool,

        /// write files in place instead of temp file + rename
        #[arg(long)]
        in_place: bool,

        /// keep applying after a patch fails
        #[arg(short, long)]
        keep_going: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn load_registry(extra: Option<PathBuf>) -> wslpatch::Result<PatchRegistry> {
    let builtin = PatchRegistry::builtin()?;
    match extra {
        Some(path) => {
            let overlay = RegistryConfig::load(&path)?.into_builder();
            builtin.to_builder().merge(overlay).build()
        }
        None => Ok(builtin),
    }
}

fn run(cli: Cli) -> wslpatch::Result<bool> {
    match cli.command {
        Commands::Translate { prefix, guest_path } => {
            let host = wslpatch::translate_str(&prefix, &guest_path)?;
            println!("{}", host);
        }

        Commands::List { release, registry } => {
            let registry = load_registry(registry)?;
            for spec in registry.effective_patches(&release) {
                let scope = if registry.is_release_agnostic(&spec) {
                    "all"
                } else {
                    release.as_str()
                };
                println!("{} {} [{}]", spec.path, spec.transformation.name(), scope);
            }
        }

        Commands::Apply {
            prefix,
            release,
            registry,
            dry_run,
            in_place,
            keep_going,
        } => {
            let registry = load_registry(registry)?;
            let prefix = HostPath::new(prefix);
            let options = SetupOptions {
                apply: ApplyOptions {
                    write_mode: if in_place {
                        WriteMode::InPlace
                    } else {
                        WriteMode::Atomic
                    },
                    dry_run,
                },
                on_failure: if keep_going {
                    FailurePolicy::Continue
                } else {
                    FailurePolicy::Abort
                },
            };

            let report = apply_release(&registry, &release, &prefix, &options)?;

            for outcome in &report.applied {
                println!("{} {}", outcome.status.as_str(), outcome.path);
            }
            for failure in &report.failed {
                eprintln!("failed {}: {}", failure.path, failure.error);
            }
            println!(
                "{}{} created, {} rewritten, {} unchanged, {} failed",
                if dry_run { "dry run: " } else { "" },
                report.created(),
                report.rewritten(),
                report.unchanged(),
                report.failed.len()
            );

            return Ok(report.is_success());
        }
    }

    Ok(true)
}
