use std::path::PathBuf;

use clap::{Parser, Subcommand, builder::{Styles, styling::{AnsiColor, Effects}}, crate_description, crate_name, crate_version};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = crate_name!(),
    version = crate_version!(),
    about = crate_description!(),
    styles = Styles::styled()
        .header(AnsiColor::BrightGreen.on_default() | Effects::BOLD | Effects::UNDERLINE)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightCyan.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Cyan.on_default()))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<TopLevel>,
}

#[derive(Subcommand)]
pub enum TopLevel {
    /// Decompiles a Hermes bytecode module to JavaScript-like source
    Decompile {
        #[command(subcommand)]
        command: DecompileCommand,
    },
    /// Disassembles a Hermes bytecode module
    Disasm {
        #[command(subcommand)]
        command: DisasmCommand,
    },
    /// Generate shell completion
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum DecompileCommand {
    /// Decompiles a loader-produced module description
    File {
        /// Path to the module JSON produced by the loader
        path: PathBuf,

        /// Leave the explicit `global` qualifier out of module-scope accesses
        #[arg(long, default_value_t = false)]
        omit_explicit_global: bool,
    },
}

#[derive(Subcommand)]
pub enum DisasmCommand {
    /// Disassembles a loader-produced module description
    File {
        /// Path to the module JSON produced by the loader
        path: PathBuf,

        /// Annotate data sections with offsets and referencing sites
        #[arg(long, default_value_t = false)]
        verbose: bool,
    },
}
