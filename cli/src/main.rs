//! Exercise the paging unit from the command line.
//!
//! A machine of the chosen generation is given one-to-one page tables
//! (see [`tables`]) and each address named on the command line is
//! translated, or probed with MAP, in turn.
#![deny(unsafe_code)]

use std::error::Error;

use clap::ArgAction::{Append, Set, SetTrue};
use clap::Parser;
use tracing::{event, span, Level};
use tracing_subscriber::prelude::*;

use base::prelude::*;
use pager::{AccessKind, CoreMemory, Generation, Mode, PagerConfig, PagingUnit, StandaloneContext};

mod report;
mod tables;

use report::{Outcome, Reporter};

const ABOUT: &str = "Translate addresses through an emulated KS10/KL10 paging unit";

fn parse_octal(s: &str) -> Result<u64, String> {
    let digits = s.strip_prefix("0o").unwrap_or(s);
    u64::from_str_radix(digits, 8).map_err(|e| format!("'{s}' is not an octal number: {e}"))
}

fn parse_address(s: &str) -> Result<VirtualAddress, String> {
    let n = parse_octal(s)?;
    VirtualAddress::try_from(n).map_err(|e| format!("{s} is not a virtual address: {e}"))
}

fn parse_page(s: &str) -> Result<u32, String> {
    let n = parse_octal(s)?;
    match u32::try_from(n) {
        Ok(page) if page < PAGES_PER_SECTION => Ok(page),
        _ => Err(format!("{s} is not a page number in section 0")),
    }
}

fn parse_generation(s: &str) -> Result<Generation, String> {
    Generation::try_from(s).map_err(|e| e.to_string())
}

fn parse_mode(s: &str) -> Result<Mode, String> {
    match s {
        "exec" => Ok(Mode::Exec),
        "user" => Ok(Mode::User),
        _ => Err(format!("unknown mode '{s}' (expected exec or user)")),
    }
}

fn parse_access(s: &str) -> Result<AccessKind, String> {
    match s {
        "fetch" => Ok(AccessKind::Fetch),
        "read" => Ok(AccessKind::Read),
        "write" => Ok(AccessKind::Write),
        _ => Err(format!(
            "unknown reference kind '{s}' (expected fetch, read or write)"
        )),
    }
}

#[derive(Parser, Debug)]
#[clap(version, about = ABOUT, long_about = None)]
struct Cli {
    /// Hardware generation: its, tops10 or tops20
    #[clap(long, action = Set, default_value = "tops20", value_parser = parse_generation)]
    generation: Generation,

    /// Enable extended (multi-section) addressing (tops20 only)
    #[clap(long, action = SetTrue)]
    extended: bool,

    /// Size of physical memory, in 512-word pages (octal)
    #[clap(long, action = Set, default_value = "100", value_parser = parse_octal)]
    memory_pages: u64,

    /// Privilege mode of the references: exec or user
    #[clap(long, action = Set, default_value = "user", value_parser = parse_mode)]
    mode: Mode,

    /// Kind of reference: fetch, read or write
    #[clap(long, action = Set, default_value = "read", value_parser = parse_access)]
    access: AccessKind,

    /// Pages (octal) to map without write access
    #[clap(long = "read-only", action = Append, value_parser = parse_page)]
    read_only: Vec<u32>,

    /// Probe each address with MAP instead of translating it
    #[clap(long, action = SetTrue)]
    probe: bool,

    /// Print the final state of the paging unit as JSON
    #[clap(long, action = SetTrue)]
    json: bool,

    /// Virtual addresses (octal) to look up
    #[clap(action = Append, value_parser = parse_address)]
    addresses: Vec<VirtualAddress>,
}

fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let memory_words = usize::try_from(cli.memory_pages)?
        .checked_mul(PAGE_SIZE as usize)
        .ok_or("memory size is too large")?;
    let config = PagerConfig {
        extended_addressing: cli.extended,
        ..PagerConfig::new(cli.generation, memory_words)
    };
    let mut unit = PagingUnit::new(config)?;
    let mut mem = CoreMemory::new(memory_words);
    tables::build(&mut unit, &mut mem, &cli.read_only)?;

    let flags = match cli.mode {
        Mode::User => PcFlags::empty().with(PcFlags::USER),
        Mode::Exec => PcFlags::empty(),
    };
    let mut reporter = Reporter::new();
    for va in cli.addresses.iter().copied() {
        let span = span!(Level::INFO, "reference", address = %va);
        let _enter = span.enter();
        let outcome = if cli.probe {
            let ctx = StandaloneContext::new(VirtualAddress::default(), flags);
            Outcome::Probed(unit.probe(&ctx, &mut mem, cli.mode, va))
        } else {
            let mut ctx = StandaloneContext::new(VirtualAddress::default(), flags);
            match unit.translate(&mut ctx, &mut mem, cli.mode, va, cli.access) {
                Ok(pa) => Outcome::Translated(pa),
                Err(unwind) => {
                    event!(
                        Level::DEBUG,
                        "after the trap PC is {} with flags {:?}",
                        ctx.pc,
                        ctx.flags
                    );
                    Outcome::Failed(unwind)
                }
            }
        };
        reporter.write(cli.mode, cli.access, va, &outcome)?;
    }
    reporter.disconnect();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&unit.status())?);
    }
    Ok(())
}

fn run_cli() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    // See
    // https://docs.rs/tracing-subscriber/0.3/tracing_subscriber/fmt/index.html#filtering-events-with-environment-variables
    // for instructions on how to select which trace messages get
    // printed.
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);
    let filter_layer = match tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info"))
    {
        Err(e) => {
            return Err(Box::new(e));
        }
        Ok(layer) => layer,
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    run(&cli)
}

fn main() {
    match run_cli() {
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
        Ok(()) => {
            std::process::exit(0);
        }
    }
}
