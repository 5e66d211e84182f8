//! Table d'opcodes et décodage d'une instruction.
//!
//! Chaque instruction est un mot d'opcode suivi de 0 à 3 mots d'opérandes.
//! Les opérandes texte sont soit une paire `(ptr, len)` vers le même buffer,
//! soit un id de la table de chaînes ([`StringId`]).

use core::fmt;

use crate::{DecodeError, DecodeResult, WordReader, WordWriter, WORD};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Id d'une chaîne enregistrée par `AddString`.
pub type StringId = u32;

/// Code numérique d'une instruction, tel qu'il apparaît sur le fil.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u32)]
pub enum OpCode {
    /// `ptr, len` : texte du nœud au sommet.
    SetText = 0,
    /// Retire le nœud dépilé et tous ses frères suivants.
    RemoveSelfAndNextSiblings = 1,
    /// Remplace l'ancien nœud par le nouveau, ré-empile le nouveau.
    ReplaceWith = 2,
    /// `name_id, value_id`
    SetAttribute = 3,
    /// `name_id`
    RemoveAttribute = 4,
    /// Empile le premier enfant du sommet.
    PushFirstChild = 5,
    /// Dépile, empile le frère suivant.
    PopPushNextSibling = 6,
    /// Dépile.
    Pop = 7,
    /// Dépile l'enfant et l'ajoute au nouveau sommet.
    AppendChild = 8,
    /// `ptr, len`
    CreateTextNode = 9,
    /// `tag_id`
    CreateElement = 10,
    /// `event_id, a, b`
    NewEventListener = 11,
    /// `event_id, a, b`
    UpdateEventListener = 12,
    /// `event_id`
    RemoveEventListener = 13,
    /// `ptr, len, id`
    AddString = 14,
}

impl OpCode {
    /// Tous les opcodes, dans l'ordre numérique.
    pub const ALL: [OpCode; 15] = [
        OpCode::SetText,
        OpCode::RemoveSelfAndNextSiblings,
        OpCode::ReplaceWith,
        OpCode::SetAttribute,
        OpCode::RemoveAttribute,
        OpCode::PushFirstChild,
        OpCode::PopPushNextSibling,
        OpCode::Pop,
        OpCode::AppendChild,
        OpCode::CreateTextNode,
        OpCode::CreateElement,
        OpCode::NewEventListener,
        OpCode::UpdateEventListener,
        OpCode::RemoveEventListener,
        OpCode::AddString,
    ];

    /// Convertit un mot brut (None si hors table).
    pub const fn from_u32(raw: u32) -> Option<Self> {
        if raw < Self::ALL.len() as u32 { Some(Self::ALL[raw as usize]) } else { None }
    }

    /// Nombre de mots d'opérandes.
    pub const fn operands(self) -> usize {
        match self {
            OpCode::SetText | OpCode::SetAttribute | OpCode::CreateTextNode => 2,
            OpCode::RemoveAttribute | OpCode::CreateElement | OpCode::RemoveEventListener => 1,
            OpCode::NewEventListener | OpCode::UpdateEventListener | OpCode::AddString => 3,
            OpCode::RemoveSelfAndNextSiblings
            | OpCode::ReplaceWith
            | OpCode::PushFirstChild
            | OpCode::PopPushNextSibling
            | OpCode::Pop
            | OpCode::AppendChild => 0,
        }
    }

    /// Mnémonique (utilisé par l'assembleur et le désassembleur).
    pub const fn mnemonic(self) -> &'static str {
        match self {
            OpCode::SetText => "set_text",
            OpCode::RemoveSelfAndNextSiblings => "remove_self_and_next_siblings",
            OpCode::ReplaceWith => "replace_with",
            OpCode::SetAttribute => "set_attribute",
            OpCode::RemoveAttribute => "remove_attribute",
            OpCode::PushFirstChild => "push_first_child",
            OpCode::PopPushNextSibling => "pop_push_next_sibling",
            OpCode::Pop => "pop",
            OpCode::AppendChild => "append_child",
            OpCode::CreateTextNode => "create_text_node",
            OpCode::CreateElement => "create_element",
            OpCode::NewEventListener => "new_event_listener",
            OpCode::UpdateEventListener => "update_event_listener",
            OpCode::RemoveEventListener => "remove_event_listener",
            OpCode::AddString => "add_string",
        }
    }

    /// Inverse de [`OpCode::mnemonic`].
    pub fn from_mnemonic(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.mnemonic() == s)
    }
}

/// Une instruction décodée, opérandes compris.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "op", rename_all = "snake_case"))]
pub enum Op {
    /// Texte du nœud au sommet.
    SetText {
        /// Offset du texte.
        ptr: u32,
        /// Longueur en octets.
        len: u32,
    },
    /// Retire le nœud dépilé et ses frères suivants.
    RemoveSelfAndNextSiblings,
    /// Remplace l'avant-dernier par le dernier.
    ReplaceWith,
    /// Pose un attribut.
    SetAttribute {
        /// Nom.
        name: StringId,
        /// Valeur.
        value: StringId,
    },
    /// Retire un attribut.
    RemoveAttribute {
        /// Nom.
        name: StringId,
    },
    /// Empile le premier enfant.
    PushFirstChild,
    /// Dépile, empile le frère suivant.
    PopPushNextSibling,
    /// Dépile.
    Pop,
    /// Ajoute l'enfant dépilé au sommet.
    AppendChild,
    /// Empile un nouveau nœud texte.
    CreateTextNode {
        /// Offset du texte.
        ptr: u32,
        /// Longueur en octets.
        len: u32,
    },
    /// Empile un nouvel élément.
    CreateElement {
        /// Nom de balise.
        tag: StringId,
    },
    /// Attache un listener.
    NewEventListener {
        /// Type d'événement.
        event: StringId,
        /// Handle opaque `a`.
        a: u32,
        /// Handle opaque `b`.
        b: u32,
    },
    /// Remplace les handles d'un listener existant.
    UpdateEventListener {
        /// Type d'événement.
        event: StringId,
        /// Handle opaque `a`.
        a: u32,
        /// Handle opaque `b`.
        b: u32,
    },
    /// Détache un listener.
    RemoveEventListener {
        /// Type d'événement.
        event: StringId,
    },
    /// Enregistre une chaîne sous un id.
    AddString {
        /// Offset du texte.
        ptr: u32,
        /// Longueur en octets.
        len: u32,
        /// Id attribué.
        id: StringId,
    },
}

impl Op {
    /// Opcode de l'instruction.
    pub const fn code(&self) -> OpCode {
        match self {
            Op::SetText { .. } => OpCode::SetText,
            Op::RemoveSelfAndNextSiblings => OpCode::RemoveSelfAndNextSiblings,
            Op::ReplaceWith => OpCode::ReplaceWith,
            Op::SetAttribute { .. } => OpCode::SetAttribute,
            Op::RemoveAttribute { .. } => OpCode::RemoveAttribute,
            Op::PushFirstChild => OpCode::PushFirstChild,
            Op::PopPushNextSibling => OpCode::PopPushNextSibling,
            Op::Pop => OpCode::Pop,
            Op::AppendChild => OpCode::AppendChild,
            Op::CreateTextNode { .. } => OpCode::CreateTextNode,
            Op::CreateElement { .. } => OpCode::CreateElement,
            Op::NewEventListener { .. } => OpCode::NewEventListener,
            Op::UpdateEventListener { .. } => OpCode::UpdateEventListener,
            Op::RemoveEventListener { .. } => OpCode::RemoveEventListener,
            Op::AddString { .. } => OpCode::AddString,
        }
    }

    /// Taille encodée, en octets.
    pub const fn encoded_len(&self) -> usize { (1 + self.code().operands()) * WORD }

    /// Décode l'instruction suivante du lecteur.
    pub fn decode(r: &mut WordReader<'_>) -> DecodeResult<Op> {
        let at = r.offset() as u64;
        let raw = r.read_word()?;
        let code = OpCode::from_u32(raw).ok_or(DecodeError::UnknownOp { op: raw, at })?;
        let op = match code {
            OpCode::SetText => Op::SetText { ptr: r.read_word()?, len: r.read_word()? },
            OpCode::RemoveSelfAndNextSiblings => Op::RemoveSelfAndNextSiblings,
            OpCode::ReplaceWith => Op::ReplaceWith,
            OpCode::SetAttribute => Op::SetAttribute { name: r.read_word()?, value: r.read_word()? },
            OpCode::RemoveAttribute => Op::RemoveAttribute { name: r.read_word()? },
            OpCode::PushFirstChild => Op::PushFirstChild,
            OpCode::PopPushNextSibling => Op::PopPushNextSibling,
            OpCode::Pop => Op::Pop,
            OpCode::AppendChild => Op::AppendChild,
            OpCode::CreateTextNode => Op::CreateTextNode { ptr: r.read_word()?, len: r.read_word()? },
            OpCode::CreateElement => Op::CreateElement { tag: r.read_word()? },
            OpCode::NewEventListener => {
                Op::NewEventListener { event: r.read_word()?, a: r.read_word()?, b: r.read_word()? }
            }
            OpCode::UpdateEventListener => {
                Op::UpdateEventListener { event: r.read_word()?, a: r.read_word()?, b: r.read_word()? }
            }
            OpCode::RemoveEventListener => Op::RemoveEventListener { event: r.read_word()? },
            OpCode::AddString => Op::AddString { ptr: r.read_word()?, len: r.read_word()?, id: r.read_word()? },
        };
        Ok(op)
    }

    /// Encode l'instruction (opcode puis opérandes).
    pub fn encode(&self, w: &mut WordWriter) {
        w.write_word(self.code() as u32);
        match *self {
            Op::SetText { ptr, len } | Op::CreateTextNode { ptr, len } => {
                w.write_word(ptr);
                w.write_word(len);
            }
            Op::SetAttribute { name, value } => {
                w.write_word(name);
                w.write_word(value);
            }
            Op::RemoveAttribute { name: id } | Op::CreateElement { tag: id } | Op::RemoveEventListener { event: id } => {
                w.write_word(id);
            }
            Op::NewEventListener { event, a, b } | Op::UpdateEventListener { event, a, b } => {
                w.write_word(event);
                w.write_word(a);
                w.write_word(b);
            }
            Op::AddString { ptr, len, id } => {
                w.write_word(ptr);
                w.write_word(len);
                w.write_word(id);
            }
            Op::RemoveSelfAndNextSiblings
            | Op::ReplaceWith
            | Op::PushFirstChild
            | Op::PopPushNextSibling
            | Op::Pop
            | Op::AppendChild => {}
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.mnemonic()) }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.code().mnemonic();
        match *self {
            Op::SetText { ptr, len } | Op::CreateTextNode { ptr, len } => write!(f, "{name} @{ptr}+{len}"),
            Op::SetAttribute { name: n, value } => write!(f, "{name} #{n} #{value}"),
            Op::RemoveAttribute { name: id } | Op::CreateElement { tag: id } | Op::RemoveEventListener { event: id } => {
                write!(f, "{name} #{id}")
            }
            Op::NewEventListener { event, a, b } | Op::UpdateEventListener { event, a, b } => {
                write!(f, "{name} #{event} a={a} b={b}")
            }
            Op::AddString { ptr, len, id } => write!(f, "{name} @{ptr}+{len} #{id}"),
            _ => f.write_str(name),
        }
    }
}
