//! CLI entry point for the `psx-run` binary.

use std::env;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;

use log as _;
use psx_core as _;
use psx_runner::{disassemble_file, run_session, SessionOptions, SessionReport};
#[cfg(test)]
use tempfile as _;
use thiserror as _;

const DEFAULT_RUN_TICKS: u64 = 1_000_000;
const DEFAULT_DISASM_BASE: u32 = 0xBFC0_0000;
const DEFAULT_DISASM_COUNT: usize = 64;

const USAGE_TEXT: &str = "\
Usage: psx-run <command> [options]

Commands:
  run --bios <file> [options]  Boot a BIOS image and run the machine
  disasm <file> [options]      Disassemble a raw little-endian binary

Run options:
  --bios <file>          BIOS image, exactly 512 KiB (required)
  --disc <file>          Raw disc image with 2352-byte sectors
  --exe <file>           PS-X EXE sideloaded once the BIOS reaches the shell
  --ticks <n>            Ticks to run (default: 1000000)
  --boot-ticks <n>       Tick budget for reaching the shell (default: 60000000)
  --load-state <file>    Restore a save state before running
  --save-state <file>    Write a save state after running
  --vblank-ticks <n>     Ticks between VBLANK interrupts
  --suppress-bus-faults  Read unmapped addresses as zero instead of faulting
  --trace                Print every executed instruction
  -v, --verbose          Print the code around the final pc

Disasm options:
  --base <addr>          Address of the first word (default: 0xbfc00000)
  --count <n>            Words to disassemble (default: 64)

Options:
  -h, --help             Show this help message

Numbers accept decimal or 0x-prefixed hex.

Examples:
  psx-run run --bios scph1001.bin --ticks 50000000 --save-state boot.state
  psx-run run --bios scph1001.bin --load-state boot.state --ticks 1000 --trace
  psx-run disasm scph1001.bin --count 16
";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Run(RunArgs),
    Disasm(DisasmArgs),
}

#[derive(Debug, PartialEq, Eq)]
struct RunArgs {
    options: SessionOptions,
    verbose: bool,
}

#[derive(Debug, PartialEq, Eq)]
struct DisasmArgs {
    input: PathBuf,
    base: u32,
    count: usize,
}

#[derive(Debug)]
enum ParseResult {
    Command(Command),
    Help,
}

fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let first = args.next().ok_or_else(|| "missing command".to_string())?;

    if first == "--help" || first == "-h" {
        return Ok(ParseResult::Help);
    }

    let command_str = first.to_string_lossy().to_string();

    match command_str.as_str() {
        "run" => parse_run_args(args)
            .map(Command::Run)
            .map(ParseResult::Command),
        "disasm" => parse_disasm_args(args)
            .map(Command::Disasm)
            .map(ParseResult::Command),
        other => Err(format!("unknown command: {other}")),
    }
}

fn parse_number(flag: &str, value: Option<OsString>) -> Result<u64, String> {
    let value = value.ok_or_else(|| format!("missing value for {flag}"))?;
    let text = value.to_string_lossy();
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|_| format!("invalid number for {flag}: {text}"))
}

fn parse_path(flag: &str, value: Option<OsString>) -> Result<PathBuf, String> {
    value
        .map(PathBuf::from)
        .ok_or_else(|| format!("missing value for {flag}"))
}

#[allow(clippy::while_let_on_iterator)]
fn parse_run_args(mut args: impl Iterator<Item = OsString>) -> Result<RunArgs, String> {
    let mut bios: Option<PathBuf> = None;
    let mut options = SessionOptions::new(PathBuf::new(), DEFAULT_RUN_TICKS);
    let mut verbose = false;

    while let Some(arg) = args.next() {
        let flag = arg.to_string_lossy().to_string();
        match flag.as_str() {
            "--help" | "-h" => return Err(USAGE_TEXT.to_string()),
            "--verbose" | "-v" => verbose = true,
            "--trace" => options.trace = true,
            "--suppress-bus-faults" => options.config.suppress_bus_faults = true,
            "--bios" => bios = Some(parse_path(&flag, args.next())?),
            "--disc" => options.disc = Some(parse_path(&flag, args.next())?),
            "--exe" => options.exe = Some(parse_path(&flag, args.next())?),
            "--load-state" => options.load_state = Some(parse_path(&flag, args.next())?),
            "--save-state" => options.save_state = Some(parse_path(&flag, args.next())?),
            "--ticks" => options.ticks = parse_number(&flag, args.next())?,
            "--boot-ticks" => options.boot_ticks = parse_number(&flag, args.next())?,
            "--vblank-ticks" => {
                let ticks = parse_number(&flag, args.next())?;
                options.config.vblank_interval_ticks = u32::try_from(ticks)
                    .ok()
                    .filter(|&ticks| ticks > 0)
                    .ok_or_else(|| format!("invalid number for {flag}: {ticks}"))?;
            }
            other if other.starts_with('-') => return Err(format!("unknown option: {other}")),
            other => return Err(format!("unexpected argument: {other}")),
        }
    }

    options.bios = bios.ok_or_else(|| "missing --bios".to_string())?;
    Ok(RunArgs { options, verbose })
}

#[allow(clippy::while_let_on_iterator)]
fn parse_disasm_args(mut args: impl Iterator<Item = OsString>) -> Result<DisasmArgs, String> {
    let mut input: Option<PathBuf> = None;
    let mut base = DEFAULT_DISASM_BASE;
    let mut count = DEFAULT_DISASM_COUNT;

    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }

        if arg == "--base" {
            let value = parse_number("--base", args.next())?;
            base = u32::try_from(value).map_err(|_| format!("address out of range: {value:#x}"))?;
            continue;
        }

        if arg == "--count" {
            let value = parse_number("--count", args.next())?;
            count = usize::try_from(value).map_err(|_| format!("count out of range: {value}"))?;
            continue;
        }

        if arg.to_string_lossy().starts_with('-') {
            return Err(format!("unknown option: {}", arg.to_string_lossy()));
        }

        if input.is_some() {
            return Err("multiple input paths provided".to_string());
        }
        input = Some(PathBuf::from(arg));
    }

    let input = input.ok_or_else(|| "missing input path".to_string())?;
    Ok(DisasmArgs { input, base, count })
}

fn print_context(report: &SessionReport) {
    for row in &report.context {
        let marker = if row.addr == report.pc { '>' } else { ' ' };
        println!("{marker} {row}");
    }
}

fn run_machine(args: &RunArgs) -> Result<(), i32> {
    let report = {
        let mut out = io::stdout().lock();
        run_session(&args.options, &mut out)
    };
    let report = match report {
        Ok(report) => report,
        Err(e) => {
            eprintln!("error: {e}");
            return Err(1);
        }
    };

    if report.shell_reached == Some(false) {
        eprintln!("warning: BIOS did not reach the shell before the executable was loaded");
    }
    println!("{report}");
    if args.verbose {
        print_context(&report);
    }
    Ok(())
}

fn run_disasm(args: &DisasmArgs) -> Result<(), i32> {
    let rows = match disassemble_file(&args.input, args.base, args.count) {
        Ok(rows) => rows,
        Err(e) => {
            eprintln!("error: {e}");
            return Err(1);
        }
    };

    for row in &rows {
        println!("{row}");
    }
    Ok(())
}

fn main() {
    env_logger::init();

    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Command(Command::Run(args))) => match run_machine(&args) {
            Ok(()) => 0,
            Err(code) => code,
        },
        Ok(ParseResult::Command(Command::Disasm(args))) => match run_disasm(&args) {
            Ok(()) => 0,
            Err(code) => code,
        },
        Err(error) => {
            if error.starts_with("Usage:") {
                println!("{error}");
            } else {
                eprintln!("error: {error}");
                eprintln!("{USAGE_TEXT}");
            }
            1
        }
    };

    std::process::exit(exit_code);
}
