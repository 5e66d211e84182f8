//! Désassemblage textuel d'une plage d'instructions.

#[cfg(not(feature = "std"))]
use alloc::{collections::BTreeMap, format, string::String, vec::Vec};
#[cfg(feature = "std")]
use std::{collections::BTreeMap, format, string::String, vec::Vec};

use core::fmt::Write;

use crate::{decode_str, DecodeResult, Op, StringId, WordReader};

/// Décode toute la plage en `(offset, Op)`.
pub fn decode_range(mem: &[u8], start: u32, len: u32) -> DecodeResult<Vec<(usize, Op)>> {
    let mut r = WordReader::range(mem, start, len)?;
    let mut out = Vec::new();
    while !r.is_at_end() {
        let at = r.offset();
        out.push((at, Op::decode(&mut r)?));
    }
    Ok(out)
}

/// Listing lisible, une instruction par ligne.
///
/// Les ids de chaînes enregistrés par un `AddString` *de la même plage* sont
/// résolus en aperçu (`;; "class"="box"`) ; les autres s'affichent `?`.
pub fn disassemble(mem: &[u8], start: u32, len: u32) -> DecodeResult<String> {
    let ops = decode_range(mem, start, len)?;
    let mut strings: BTreeMap<StringId, String> = BTreeMap::new();
    let mut out = String::new();
    let _ = writeln!(out, "== change list @{start} (+{len} bytes) ==");

    for (at, op) in ops {
        let preview = match op {
            Op::SetText { ptr, len } | Op::CreateTextNode { ptr, len } => Some(quote(&decode_str(mem, ptr, len)?)),
            Op::AddString { ptr, len, id } => {
                let text = decode_str(mem, ptr, len)?.into_owned();
                let p = quote(&text);
                strings.insert(id, text);
                Some(p)
            }
            Op::SetAttribute { name, value } => Some(format!("{}={}", lookup(&strings, name), lookup(&strings, value))),
            Op::RemoveAttribute { name: id }
            | Op::CreateElement { tag: id }
            | Op::NewEventListener { event: id, .. }
            | Op::UpdateEventListener { event: id, .. }
            | Op::RemoveEventListener { event: id } => Some(lookup(&strings, id)),
            _ => None,
        };
        match preview {
            Some(p) => {
                let _ = writeln!(out, "{at:06} | {op} ;; {p}");
            }
            None => {
                let _ = writeln!(out, "{at:06} | {op}");
            }
        }
    }
    Ok(out)
}

fn lookup(strings: &BTreeMap<StringId, String>, id: StringId) -> String {
    strings.get(&id).map_or_else(|| "?".into(), |s| quote(s))
}

fn quote(s: &str) -> String {
    if s.chars().count() <= 64 {
        format!("{s:?}")
    } else {
        let head: String = s.chars().take(64).collect();
        format!("{head:?}…")
    }
}
