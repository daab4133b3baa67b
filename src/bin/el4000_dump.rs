//! Print the block layout of one EL4000 logger file.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;

use el4000log::parsers::{El4000, HeaderPolicy};

/// Print the record blocks of an EL3500/EL4000 .BIN file
#[derive(Debug, Parser)]
#[command(name = "el4000_dump", version)]
struct DumpArgs {
    /// Logger file to inspect
    file: PathBuf,

    /// Skip block headers that are not valid dates instead of stopping
    #[arg(long)]
    skip_bad_headers: bool,
}

impl DumpArgs {
    fn policy(&self) -> HeaderPolicy {
        if self.skip_bad_headers {
            HeaderPolicy::SkipBlock
        } else {
            HeaderPolicy::Abort
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = DumpArgs::parse();
    let path = &args.file;

    let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    println!("{}: {} bytes", path.display(), data.len());
    if !El4000::detect(&data) {
        println!("No record blocks found");
        return Ok(());
    }

    let mut scanner = El4000::new(args.policy()).blocks(&data);
    let mut blocks = 0usize;
    let mut samples = 0usize;
    for block in scanner.by_ref() {
        let block = block?;
        let first = block.rows().next();
        println!(
            "  [{:>4}] offset {:#08x}  base {}  {:>5} samples  first {:.1} W",
            blocks,
            block.header.magic_offset,
            block.header.base_timestamp,
            block.samples.len(),
            first.map(|r| r.real_power).unwrap_or_default()
        );
        blocks += 1;
        samples += block.samples.len();
    }

    println!(
        "{} blocks, {} samples, {} headers skipped",
        blocks,
        samples,
        scanner.skipped_headers()
    );
    Ok(())
}
