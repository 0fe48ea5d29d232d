use abi_facts::commands::{
    generate_command, init_config_command, inspect_command, version_command, GenerateArgs,
    DEFAULT_CONFIG_FILE,
};
use abi_facts::{init_logging, LogFormat, LogLevel};
use anyhow::Result;
use clap::{Parser, Subcommand};

/// ABI fact generator CLI.
///
/// This CLI is a thin wrapper around `abi-facts-core` (exposed in code as `abi_facts_core`).
/// All substantive logic lives in the library so it can be tested thoroughly
/// and reused from other frontends.
#[derive(Parser, Debug)]
#[command(
    name = "abi-facts",
    version,
    about = "Generate ABI compatibility facts from ELF binaries",
    long_about = None
)]
struct Cli {
    /// Log level (error, warn, info, debug, trace). `RUST_LOG` takes precedence.
    #[arg(long, global = true, default_value = "warn")]
    log_level: LogLevel,

    /// Log format (pretty or json). Defaults to `ABI_FACTS_LOG_FORMAT`, then pretty.
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print version information.
    Version,

    /// Generate one fact file per main binary.
    ///
    /// This will:
    /// - Load every main, library and compiler binary.
    /// - Query the dynamic linker for libraries the mains need (unless `--no-ldd`).
    /// - Write `<out-dir>/<main>.lp` files and `<out-dir>/run-summary.json`.
    Generate {
        /// Main binary under assessment (repeatable).
        #[arg(long = "main")]
        mains: Vec<String>,

        /// Dependency library providing context (repeatable).
        #[arg(long = "lib")]
        libraries: Vec<String>,

        /// Compiler or toolchain binary providing context (repeatable).
        #[arg(long = "compiler")]
        compilers: Vec<String>,

        /// YAML or JSON run manifest listing `main`, `libraries`, `compilers`, `output_dir`.
        #[arg(long)]
        manifest: Option<String>,

        /// Output directory. Defaults to the manifest's `output_dir`, then `./facts`.
        #[arg(long)]
        out_dir: Option<String>,

        /// Generator config JSON (see `init-config`).
        #[arg(long)]
        config: Option<String>,

        /// Do not ask `ldd` for the runtime libraries of main binaries.
        #[arg(long, default_value_t = false)]
        no_ldd: bool,
    },

    /// Load a single binary and show its header, dependencies and counts.
    Inspect {
        /// Path to the binary.
        #[arg(long)]
        path: String,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Write the default generator config.
    InitConfig {
        /// Destination file.
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        path: String,

        /// Overwrite an existing file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level, cli.log_format.unwrap_or_else(LogFormat::from_env))?;

    // Default to the Version command if none is provided.
    match cli.command.unwrap_or(Command::Version) {
        Command::Version => version_command()?,
        Command::Generate { mains, libraries, compilers, manifest, out_dir, config, no_ldd } => {
            generate_command(&GenerateArgs {
                mains,
                libraries,
                compilers,
                manifest,
                out_dir,
                config,
                no_ldd,
            })?
        }
        Command::Inspect { path, json } => inspect_command(&path, json)?,
        Command::InitConfig { path, force } => init_config_command(&path, force)?,
    }

    Ok(())
}
