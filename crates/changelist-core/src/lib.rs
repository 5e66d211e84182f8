//! changelist-core — format binaire des change-lists (no_std-ready)
//!
//! Fournit :
//! - `WORD` + IO mémoire en mots 32 bits little-endian : `WordReader`, `WordWriter`
//! - Décodeur mémoire `decode_str` (bornes vérifiées, UTF-8 lossy)
//! - Table d'opcodes `OpCode` / `Op` (15 instructions), voir [`op`]
//! - `ChangeListBuilder` : encodeur côté producteur (ids de chaînes dédupliqués)
//! - Assembleur texte minimal ([`asm`]) et désassembleur ([`disasm`])
//! - Erreurs `DecodeError` + alias `DecodeResult<T>`
//!
//! Features :
//! - `std` (par défaut) : impl `std::error::Error`
//! - `serde` : derive (dé)sérialisation sur les opcodes et les erreurs

#![deny(missing_docs)]
#![cfg_attr(not(feature = "std"), no_std)]

/* ─────────────────────────── Imports ─────────────────────────── */

use core::fmt;

#[cfg(feature = "std")]
use std::{borrow::Cow, string::String, vec::Vec};

#[cfg(not(feature = "std"))]
use alloc::{borrow::Cow, string::String, vec::Vec};

#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/* ─────────────────────────── Modules publics ─────────────────────────── */

/// Table d'opcodes, décodage/encodage d'une instruction.
pub mod op;
/// Encodeur côté producteur (tests, outils).
pub mod builder;
/// Assembleur texte minimal (une instruction par ligne).
pub mod asm;
/// Désassembleur textuel d'une plage d'instructions.
pub mod disasm;

pub use builder::{Assembled, ChangeListBuilder};
pub use op::{Op, OpCode, StringId};

/* ─────────────────────────── Résultat commun ─────────────────────────── */

/// Alias résultat commun au décodage.
pub type DecodeResult<T> = core::result::Result<T, DecodeError>;

/// Taille d'un mot d'instruction, en octets.
pub const WORD: usize = 4;

/* ─────────────────────────── Décodeur mémoire ─────────────────────────── */

/// Vérifie que `[ptr, ptr+len)` tient dans `mem` et renvoie la tranche.
pub fn byte_slice(mem: &[u8], ptr: u32, len: u32) -> DecodeResult<&[u8]> {
    let start = ptr as usize;
    let end = start
        .checked_add(len as usize)
        .filter(|&end| end <= mem.len())
        .ok_or(DecodeError::OutOfBounds { ptr: u64::from(ptr), len: u64::from(len), size: mem.len() as u64 })?;
    Ok(&mem[start..end])
}

/// Lit le texte UTF-8 stocké à `mem[ptr..ptr+len]`.
///
/// Les séquences invalides sont remplacées par U+FFFD, comme le fait un
/// `TextDecoder` non strict ; seul un dépassement de bornes est une erreur.
pub fn decode_str(mem: &[u8], ptr: u32, len: u32) -> DecodeResult<Cow<'_, str>> {
    byte_slice(mem, ptr, len).map(String::from_utf8_lossy)
}

/// Valide une plage `(start, len)` : alignée sur `WORD` et contenue dans `size`.
/// Renvoie `(début, fin)` en octets.
pub fn check_range(size: usize, start: u32, len: u32) -> DecodeResult<(usize, usize)> {
    if start as usize % WORD != 0 || len as usize % WORD != 0 {
        return Err(DecodeError::Misaligned { start, len });
    }
    let begin = start as usize;
    let end = begin
        .checked_add(len as usize)
        .filter(|&end| end <= size)
        .ok_or(DecodeError::OutOfBounds { ptr: u64::from(start), len: u64::from(len), size: size as u64 })?;
    Ok((begin, end))
}

/* ─────────────────────────── Word Reader (LE) ─────────────────────────── */

/// Lecteur séquentiel de mots `u32` little-endian sur une plage d'un buffer.
///
/// Le buffer complet reste accessible via [`WordReader::memory`] : les
/// opérandes `(ptr, len)` pointent n'importe où dedans.
#[derive(Debug, Clone)]
pub struct WordReader<'a> {
    mem: &'a [u8],
    pos: usize,
    end: usize,
}

impl<'a> WordReader<'a> {
    /// Lecteur sur tout le buffer (les octets en trop après le dernier mot sont ignorés).
    pub fn new(mem: &'a [u8]) -> Self {
        Self { mem, pos: 0, end: mem.len() - mem.len() % WORD }
    }

    /// Lecteur sur la plage `[start, start+len)` (validée).
    pub fn range(mem: &'a [u8], start: u32, len: u32) -> DecodeResult<Self> {
        let (pos, end) = check_range(mem.len(), start, len)?;
        Ok(Self { mem, pos, end })
    }

    /// Offset courant (octets depuis le début du buffer).
    pub fn offset(&self) -> usize { self.pos }
    /// Octets restants dans la plage.
    pub fn remaining(&self) -> usize { self.end.saturating_sub(self.pos) }
    /// Vrai si la plage est consommée.
    pub fn is_at_end(&self) -> bool { self.pos >= self.end }
    /// Buffer complet (pour résoudre les opérandes `(ptr, len)`).
    pub fn memory(&self) -> &'a [u8] { self.mem }

    /// Lit un mot LE (ou erreur si la plage est épuisée).
    pub fn read_word(&mut self) -> DecodeResult<u32> {
        if self.remaining() < WORD {
            return Err(DecodeError::UnexpectedEof { at: self.pos as u64 });
        }
        let b = &self.mem[self.pos..self.pos + WORD];
        self.pos += WORD;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/* ─────────────────────────── Word Writer (LE) ─────────────────────────── */

/// Buffer d’écriture en mots (croît automatiquement).
#[derive(Debug, Default, Clone)]
pub struct WordWriter {
    buf: Vec<u8>,
}

impl WordWriter {
    /// Crée un writer vide.
    pub fn new() -> Self { Self { buf: Vec::new() } }
    /// Taille courante en octets (toujours multiple de `WORD`).
    pub fn len(&self) -> usize { self.buf.len() }
    /// Vrai si rien n'a été écrit.
    pub fn is_empty(&self) -> bool { self.buf.is_empty() }
    /// Accès en lecture au contenu.
    pub fn as_slice(&self) -> &[u8] { &self.buf }
    /// Récupère le buffer (consomme).
    pub fn into_vec(self) -> Vec<u8> { self.buf }
    /// Écrit un mot little-endian.
    pub fn write_word(&mut self, v: u32) { self.buf.extend_from_slice(&v.to_le_bytes()); }

    /// Ajoute des octets bruts, complétés par des zéros jusqu'au mot suivant.
    /// Renvoie l'offset où ils commencent.
    pub fn write_bytes_padded(&mut self, bytes: &[u8]) -> u32 {
        let at = self.buf.len() as u32;
        self.buf.extend_from_slice(bytes);
        let pad = (WORD - self.buf.len() % WORD) % WORD;
        self.buf.resize(self.buf.len() + pad, 0);
        at
    }
}

/* ─────────────────────────── Erreurs ─────────────────────────── */

/// Erreurs de décodage du flux d'instructions.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DecodeError {
    /// Plage d'instructions non alignée sur 4 octets.
    Misaligned {
        /// Offset de début.
        start: u32,
        /// Longueur en octets.
        len: u32,
    },
    /// Lecture hors du buffer.
    OutOfBounds {
        /// Début demandé.
        ptr: u64,
        /// Longueur demandée.
        len: u64,
        /// Taille du buffer.
        size: u64,
    },
    /// Instruction tronquée : opérande attendu après la fin de la plage.
    UnexpectedEof {
        /// Offset où le mot manquait.
        at: u64,
    },
    /// Opcode hors de la table 0–14.
    UnknownOp {
        /// Valeur brute lue.
        op: u32,
        /// Offset de l'opcode.
        at: u64,
    },
    /// Plus aucun id de chaîne automatique disponible (`u32::MAX` attribué).
    StringIdsExhausted,
    /// Source assembleur invalide.
    Asm {
        /// Ligne (1-based).
        line: u32,
        /// Message court.
        msg: Cow<'static, str>,
    },
}

impl DecodeError {
    /// Construit une erreur d'assemblage.
    pub fn asm(line: u32, msg: impl Into<Cow<'static, str>>) -> Self { DecodeError::Asm { line, msg: msg.into() } }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Misaligned { start, len } => write!(f, "misaligned change range: start={start} len={len}"),
            DecodeError::OutOfBounds { ptr, len, size } => {
                write!(f, "out of bounds read: {len} bytes at {ptr} (buffer is {size} bytes)")
            }
            DecodeError::UnexpectedEof { at } => write!(f, "truncated instruction: missing word at {at}"),
            DecodeError::UnknownOp { op, at } => write!(f, "unknown op {op} at {at}"),
            DecodeError::StringIdsExhausted => f.write_str("string id space exhausted"),
            DecodeError::Asm { line, msg } => write!(f, "asm line {line}: {msg}"),
        }
    }
}

/// Implémente `std::error::Error` uniquement avec la feature `std`.
#[cfg(feature = "std")]
impl std::error::Error for DecodeError {}

/* ─────────────────────────── Prélude (reexports utiles) ─────────────────────────── */

/// Prélude pratique pour importer les types/funcs clés du crate.
pub mod prelude {
    /// Réexports utiles pour une importation rapide.
    pub use super::{
        check_range, decode_str, Assembled, ChangeListBuilder, DecodeError, DecodeResult, Op, OpCode,
        StringId, WordReader, WordWriter, WORD,
    };
}

/* ─────────────────────────── Tests ─────────────────────────── */
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_str_in_bounds() -> DecodeResult<()> {
        let mem = b"xxhello";
        assert_eq!(decode_str(mem, 2, 5)?, "hello");
        assert_eq!(decode_str(mem, 7, 0)?, "");
        Ok(())
    }

    #[test]
    fn decode_str_out_of_bounds() {
        let mem = b"hello";
        assert_eq!(
            decode_str(mem, 3, 4),
            Err(DecodeError::OutOfBounds { ptr: 3, len: 4, size: 5 })
        );
        // pas de débordement arithmétique
        assert!(decode_str(mem, u32::MAX, u32::MAX).is_err());
    }

    #[test]
    fn decode_str_is_lossy() -> DecodeResult<()> {
        let mem = [b'a', 0xFF, b'b'];
        assert_eq!(decode_str(&mem, 0, 3)?, "a\u{FFFD}b");
        Ok(())
    }

    #[test]
    fn range_checks() {
        assert_eq!(check_range(16, 4, 8), Ok((4, 12)));
        assert_eq!(check_range(16, 2, 8), Err(DecodeError::Misaligned { start: 2, len: 8 }));
        assert!(matches!(check_range(16, 8, 12), Err(DecodeError::OutOfBounds { .. })));
    }

    #[test]
    fn writer_reader_words() -> DecodeResult<()> {
        let mut w = WordWriter::new();
        w.write_word(0xDEAD_BEEF);
        let at = w.write_bytes_padded(b"abcde");
        w.write_word(7);
        assert_eq!(at, 4);
        assert_eq!(w.len(), 16);

        let mut r = WordReader::new(w.as_slice());
        assert_eq!(r.read_word()?, 0xDEAD_BEEF);
        assert_eq!(decode_str(r.memory(), at, 5)?, "abcde");

        let mut r = WordReader::range(w.as_slice(), 12, 4)?;
        assert_eq!(r.read_word()?, 7);
        assert!(r.is_at_end());
        assert_eq!(r.read_word(), Err(DecodeError::UnexpectedEof { at: 16 }));
        Ok(())
    }
}
