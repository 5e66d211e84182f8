// crates/changelist-tools/src/bin/changelist-disasm.rs
//! Désassembleur de change-lists.
//!
//! Exemples :
//!   changelist-disasm dump.bin --start 64 --len 128
//!   changelist-disasm prog.clasm --asm
//!   cat dump.bin | changelist-disasm - --json | jq
//!
//! Options utiles :
//!   --start/--len : plage d'instructions dans un buffer brut
//!   --asm         : l'entrée est du texte assemblé (la plage est calculée)
//!   --json        : vue JSON structurée
//!   --emit <f>    : écrit la sortie dans un fichier au lieu de stdout

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::Parser;
use tracing::debug;

use changelist_core::disasm::disassemble;
use changelist_tools::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "changelist-disasm", version, about = "Désassembleur de change-lists (binaire ou texte -> listing/JSON)")]
struct Cli {
    /// Fichier d'entrée ('-' pour stdin)
    input: String,

    /// L'entrée est une source assemblée
    #[arg(long)]
    asm: bool,

    /// Offset de la première instruction (octets, multiple de 4)
    #[arg(long, default_value_t = 0)]
    start: u32,

    /// Longueur de la plage (octets) ; par défaut jusqu'à la fin
    #[arg(long)]
    len: Option<u32>,

    /// Sortie JSON
    #[arg(long)]
    json: bool,

    /// Fichier de sortie
    #[arg(long)]
    emit: Option<Utf8PathBuf>,

    /// Verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    if let Err(e) = real_main() {
        eprintln!("❌ {e:#}");
        std::process::exit(1);
    }
}

fn real_main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    debug!("{}", version_banner("changelist-disasm"));

    let bytes = read_input(&cli.input)?;
    let program = load_program(bytes, cli.asm, cli.start, cli.len)?;
    let (start, len) = program.range();

    let text = if cli.json {
        serde_json::to_string_pretty(&disasm_json(&program.buffer, start, len)?)?
    } else {
        disassemble(&program.buffer, start, len).with_context(|| format!("plage @{start}+{len}"))?
    };

    match &cli.emit {
        Some(out) => {
            write_text(out, &text)?;
            eprintln!("📝 Disasm → {out}");
        }
        None => println!("{}", text.trim_end()),
    }
    Ok(())
}
