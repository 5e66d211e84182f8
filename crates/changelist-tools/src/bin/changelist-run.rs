// crates/changelist-tools/src/bin/changelist-run.rs
//! Exécute une change-list sur un DOM mémoire et affiche l'arbre obtenu.
//!
//! Exemples :
//!   changelist-run prog.clasm
//!   changelist-run prog.clasm --seed section --repeat 2
//!   changelist-run dump.bin --raw --start 64 --len 128 --json
//!
//! Le conteneur est un `<body>` dont l'unique enfant `<seed>` sert de nœud
//! de départ. La configuration part de l'environnement (`CHANGELIST_*`),
//! surchargée par les options.

use anyhow::Result;
use clap::Parser;
use tracing::info;

use changelist_tools::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "changelist-run", version, about = "Applique une change-list sur un DOM mémoire")]
struct Cli {
    /// Programme ('-' pour stdin) : source assemblée, ou buffer brut avec --raw
    input: String,

    /// L'entrée est un buffer binaire brut
    #[arg(long)]
    raw: bool,

    /// Offset de la première instruction (avec --raw)
    #[arg(long, default_value_t = 0, requires = "raw")]
    start: u32,

    /// Longueur de la plage (avec --raw)
    #[arg(long, requires = "raw")]
    len: Option<u32>,

    /// Balise du nœud de départ
    #[arg(long, default_value = "div")]
    seed: String,

    /// Nombre d'applications successives du même flux
    #[arg(long, default_value_t = 1)]
    repeat: u32,

    /// Tolère une pile non vidée en fin d'application
    #[arg(long)]
    relaxed_stack: bool,

    /// Trace chaque instruction (niveau trace)
    #[arg(long)]
    trace_ops: bool,

    /// Profondeur maximale de la pile
    #[arg(long)]
    max_depth: Option<usize>,

    /// Sortie JSON
    #[arg(long)]
    json: bool,

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
    init_logging(if cli.trace_ops { cli.verbose.max(3) } else { cli.verbose });
    info!("{}", version_banner("changelist-run"));

    let mut config = VmConfig::from_env();
    if cli.relaxed_stack {
        config = config.strict_stack(false);
    }
    if cli.trace_ops {
        config = config.trace_ops(true);
    }
    if cli.max_depth.is_some() {
        config = config.max_stack_depth(cli.max_depth);
    }

    let bytes = read_input(&cli.input)?;
    let program = load_program(bytes, !cli.raw, cli.start, cli.len)?;
    let report = run_program(&program, &cli.seed, cli.repeat, config)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.html);
        eprintln!("✅ {} application(s), {} listener(s), {} chaîne(s)", report.applied, report.listeners, report.strings);
    }
    Ok(())
}
