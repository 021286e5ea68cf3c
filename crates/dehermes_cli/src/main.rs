use std::path::Path;

use clap::{CommandFactory, Parser};

use crate::cli::{Cli, DecompileCommand, DisasmCommand, TopLevel};

mod cli;

fn read_module(path: &Path) -> dehermes_lib::BytecodeModule {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("failed to read {path:?}: {e}");
            std::process::exit(1);
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(module) => module,
        Err(e) => {
            eprintln!("failed to parse module {path:?}: {e}");
            std::process::exit(1);
        }
    }
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(TopLevel::Decompile { command }) => match command {
            DecompileCommand::File { path, omit_explicit_global } => {
                let module = read_module(&path);
                match dehermes_lib::decompile_with_options(
                    &module,
                    dehermes_lib::DecompilerOptions { omit_explicit_global },
                ) {
                    Ok(out) => {
                        print!("{out}");
                    }
                    Err(e) => {
                        eprintln!("decompile error: {e}");
                        std::process::exit(1);
                    }
                }
            }
        },
        Some(TopLevel::Disasm { command }) => match command {
            DisasmCommand::File { path, verbose } => {
                let module = read_module(&path);
                match dehermes_lib::disassemble(
                    &module,
                    dehermes_lib::DisassemblerOptions { verbose },
                ) {
                    Ok(out) => {
                        print!("{out}");
                    }
                    Err(e) => {
                        eprintln!("disassembly error: {e}");
                        std::process::exit(1);
                    }
                }
            }
        },
        Some(TopLevel::Completion { shell }) => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, bin_name, &mut std::io::stdout());
        }
        None => {
            Cli::command().print_help().unwrap();
        }
    }
}
