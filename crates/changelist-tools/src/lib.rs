//! changelist-tools — Bibliothèque commune des outils CLI change-list.
//!
//! - I/O       : `read_input`, `read_text`, `read_bytes`, `write_text`
//! - Logs      : `init_logging` (subscriber `tracing`, `RUST_LOG` prioritaire)
//! - Programme : `load_program` (texte assemblé ou binaire brut)
//! - Exécution : `run_program` → `RunReport` (DOM mémoire, HTML sérialisé)
//! - Disasm    : `disasm_json` (vue structurée)
//!
//! Les fonctions renvoient `anyhow::Result`.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms, unused_must_use)]
#![cfg_attr(not(debug_assertions), warn(missing_docs))]

use std::fs;
use std::io::{self, Read};

use anyhow::{anyhow, Context, Result};
use camino::Utf8Path;
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

use changelist_core::{asm, disasm, Assembled, Op};
use changelist_vm::{ChangeList, Host, MemDom, VmConfig};

/// Version lisible du crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Petite bannière de version utile pour logs/outils.
pub fn version_banner(tool: &str) -> String { format!("{tool} (changelist-tools {VERSION})") }

/* ------------------------------------------------------------------------- */
/* Logs                                                                      */
/* ------------------------------------------------------------------------- */

/// Installe le subscriber `tracing` sur stderr.
///
/// `RUST_LOG` l'emporte ; sinon le niveau suit `verbose`
/// (0 = warn, 1 = info, 2 = debug, 3+ = trace).
pub fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = fmt().with_env_filter(filter).with_target(false).with_writer(io::stderr).try_init();
}

/* ------------------------------------------------------------------------- */
/* I/O utils                                                                 */
/* ------------------------------------------------------------------------- */

/// Lis un fichier texte en UTF-8.
pub fn read_text(path: &Utf8Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("lecture {path}"))
}

/// Lis un fichier binaire.
pub fn read_bytes(path: &Utf8Path) -> Result<Vec<u8>> { fs::read(path).with_context(|| format!("lecture {path}")) }

/// Écrit un texte (UTF-8). Crée les dossiers au besoin.
pub fn write_text(path: &Utf8Path, s: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| format!("création {parent}"))?;
        }
    }
    fs::write(path, s).with_context(|| format!("écriture {path}"))
}

/// Lit une entrée CLI : `-` = stdin, sinon un chemin.
pub fn read_input(input: &str) -> Result<Vec<u8>> {
    if input == "-" {
        let mut v = Vec::new();
        io::stdin().read_to_end(&mut v).context("lecture stdin")?;
        return Ok(v);
    }
    read_bytes(Utf8Path::new(input))
}

/* ------------------------------------------------------------------------- */
/* Programmes                                                                */
/* ------------------------------------------------------------------------- */

/// Charge un programme : texte assemblé si `as_text`, sinon buffer brut dont
/// les instructions occupent `[start, start+len)` (par défaut : jusqu'à la fin).
pub fn load_program(bytes: Vec<u8>, as_text: bool, start: u32, len: Option<u32>) -> Result<Assembled> {
    if as_text {
        let src = String::from_utf8(bytes).map_err(|_| anyhow!("source non UTF-8"))?;
        let out = asm::assemble(&src).context("assemblage")?;
        debug!(bytes = out.buffer.len(), start = out.start, len = out.len, "programme assemblé");
        return Ok(out);
    }
    let size = u32::try_from(bytes.len()).map_err(|_| anyhow!("buffer trop grand ({} octets)", bytes.len()))?;
    let len = match len {
        Some(l) => l,
        None => size.checked_sub(start).ok_or_else(|| anyhow!("--start {start} au-delà du buffer ({size} octets)"))?,
    };
    Ok(Assembled { buffer: bytes, start, len })
}

/// Une instruction, pour les sorties JSON.
#[derive(Debug, Clone, Serialize)]
pub struct OpEntry {
    /// Offset en octets.
    pub at: usize,
    /// Instruction décodée.
    #[serde(flatten)]
    pub op: Op,
}

/// Vue structurée d'une plage.
pub fn disasm_json(mem: &[u8], start: u32, len: u32) -> Result<serde_json::Value> {
    let ops: Vec<OpEntry> = disasm::decode_range(mem, start, len)
        .context("décodage")?
        .into_iter()
        .map(|(at, op)| OpEntry { at, op })
        .collect();
    Ok(serde_json::json!({ "start": start, "len": len, "ops": ops }))
}

/// Résultat d'une exécution headless.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// HTML du nœud de départ après la dernière application.
    pub html: String,
    /// Nombre d'applications effectuées.
    pub applied: u32,
    /// Listeners vivants à la fin.
    pub listeners: usize,
    /// Entrées de la table de chaînes.
    pub strings: usize,
}

/// Applique `program` `repeat` fois sur un conteneur mémoire dont l'unique
/// enfant `<seed_tag>` sert de nœud de départ.
pub fn run_program(program: &Assembled, seed_tag: &str, repeat: u32, config: VmConfig) -> Result<RunReport> {
    let (mut dom, root) = MemDom::with_container("body");
    let seed = dom.create_element(seed_tag)?;
    dom.append_child(&root, &seed)?;

    let mut cl = ChangeList::with_config(dom, root, config);
    cl.init_events_trampoline(|ev, a, b| info!(event = %ev.event_type, a, b, "événement"))?;

    let (start, len) = program.range();
    for round in 1..=repeat {
        cl.add_change_list_range(start, len)?;
        cl.apply_changes(&program.buffer).with_context(|| format!("application #{round}"))?;
    }

    Ok(RunReport {
        html: cl.host().serialize(seed),
        applied: repeat,
        listeners: cl.listener_count(),
        strings: cl.string_count(),
    })
}

/* ------------------------------------------------------------------------- */
/* Prelude                                                                   */
/* ------------------------------------------------------------------------- */

/// Prelude pratique pour les bins.
pub mod prelude {
    pub use crate::{
        disasm_json, init_logging, load_program, read_input, read_text, run_program, version_banner, write_text,
        RunReport,
    };
    pub use anyhow::{anyhow, Context, Result};
    pub use camino::{Utf8Path, Utf8PathBuf};
    pub use changelist_vm::VmConfig;
}
