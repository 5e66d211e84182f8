//! Encodeur côté producteur.
//!
//! Le buffer produit a deux zones : les octets des chaînes d'abord (offset 0,
//! alignés sur 4), puis les instructions. Les pointeurs `(ptr, len)` sont donc
//! absolus dès l'écriture et la plage d'instructions est `(start, len)`.
//!
//! ```
//! use changelist_core::ChangeListBuilder;
//!
//! let mut b = ChangeListBuilder::new();
//! b.create_element("div")?.set_attribute("class", "box")?.append_child();
//! let out = b.finish();
//! assert_eq!(out.start % 4, 0);
//! # Ok::<(), changelist_core::DecodeError>(())
//! ```
//!
//! Les ids automatiques croissent à partir de `with_first_id` ; un id explicite
//! au-delà les repousse. Une fois `u32::MAX` attribué, plus aucun id
//! automatique n'est disponible (`StringIdsExhausted`).

#[cfg(feature = "std")]
use std::{collections::BTreeMap, string::String, vec::Vec};

#[cfg(not(feature = "std"))]
use alloc::{collections::BTreeMap, string::String, vec::Vec};

use crate::{DecodeError, DecodeResult, Op, StringId, WordWriter};

/// Résultat de [`ChangeListBuilder::finish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembled {
    /// Buffer complet (chaînes puis instructions).
    pub buffer: Vec<u8>,
    /// Offset de la première instruction.
    pub start: u32,
    /// Longueur de la plage d'instructions, en octets.
    pub len: u32,
}

impl Assembled {
    /// Plage `(start, len)` à passer à `add_change_list_range`.
    pub const fn range(&self) -> (u32, u32) { (self.start, self.len) }
}

/// Construit un flux d'instructions.
///
/// Les méthodes « texte » (`create_element("div")`…) passent par
/// [`ChangeListBuilder::string_id`] : la première occurrence d'une chaîne émet
/// un `AddString`, les suivantes réutilisent l'id.
#[derive(Debug, Clone)]
pub struct ChangeListBuilder {
    data: WordWriter,
    ops: WordWriter,
    ids: BTreeMap<String, StringId>,
    /// `None` : espace d'ids épuisé.
    next_id: Option<StringId>,
    count: usize,
}

impl Default for ChangeListBuilder {
    fn default() -> Self { Self::with_first_id(0) }
}

impl ChangeListBuilder {
    /// Builder vide, ids alloués à partir de 0.
    pub fn new() -> Self { Self::default() }

    /// Builder dont les ids automatiques commencent à `first` (utile quand la
    /// table côté interpréteur contient déjà des entrées).
    pub fn with_first_id(first: StringId) -> Self {
        Self { data: WordWriter::new(), ops: WordWriter::new(), ids: BTreeMap::new(), next_id: Some(first), count: 0 }
    }

    /// Nombre d'instructions émises (mots bruts compris).
    pub fn op_count(&self) -> usize { self.count }

    /// Copie `text` dans la zone de données, renvoie `(ptr, len)`.
    pub fn intern_bytes(&mut self, text: &str) -> (u32, u32) {
        let ptr = self.data.write_bytes_padded(text.as_bytes());
        (ptr, text.len() as u32)
    }

    /// Id de `text`, émis via `AddString` à la première demande.
    pub fn string_id(&mut self, text: &str) -> DecodeResult<StringId> {
        if let Some(&id) = self.ids.get(text) {
            return Ok(id);
        }
        let id = self.next_id.ok_or(DecodeError::StringIdsExhausted)?;
        self.add_string(text, id);
        Ok(id)
    }

    /// Émet une instruction déjà construite.
    pub fn op(&mut self, op: Op) -> &mut Self {
        op.encode(&mut self.ops);
        self.count += 1;
        self
    }

    /// Émet un mot brut (flux volontairement mal formés, tests).
    pub fn raw_word(&mut self, word: u32) -> &mut Self {
        self.ops.write_word(word);
        self.count += 1;
        self
    }

    /// `AddString` explicite sous `id` ; l'association est mémorisée.
    ///
    /// Un id déjà attribué à un autre texte est réaffecté : l'ancien texte
    /// repassera par un nouvel `AddString` à sa prochaine demande.
    pub fn add_string(&mut self, text: &str, id: StringId) -> &mut Self {
        let (ptr, len) = self.intern_bytes(text);
        self.ids.retain(|_, v| *v != id);
        self.ids.insert(text.into(), id);
        if let Some(next) = self.next_id {
            if id >= next {
                self.next_id = id.checked_add(1);
            }
        }
        self.op(Op::AddString { ptr, len, id })
    }

    /// `SetText`.
    pub fn set_text(&mut self, text: &str) -> &mut Self {
        let (ptr, len) = self.intern_bytes(text);
        self.op(Op::SetText { ptr, len })
    }

    /// `RemoveSelfAndNextSiblings`.
    pub fn remove_self_and_next_siblings(&mut self) -> &mut Self { self.op(Op::RemoveSelfAndNextSiblings) }

    /// `ReplaceWith`.
    pub fn replace_with(&mut self) -> &mut Self { self.op(Op::ReplaceWith) }

    /// `SetAttribute` (noms et valeurs passés par la table de chaînes).
    pub fn set_attribute(&mut self, name: &str, value: &str) -> DecodeResult<&mut Self> {
        let name = self.string_id(name)?;
        let value = self.string_id(value)?;
        Ok(self.op(Op::SetAttribute { name, value }))
    }

    /// `RemoveAttribute`.
    pub fn remove_attribute(&mut self, name: &str) -> DecodeResult<&mut Self> {
        let name = self.string_id(name)?;
        Ok(self.op(Op::RemoveAttribute { name }))
    }

    /// `PushFirstChild`.
    pub fn push_first_child(&mut self) -> &mut Self { self.op(Op::PushFirstChild) }

    /// `PopPushNextSibling`.
    pub fn pop_push_next_sibling(&mut self) -> &mut Self { self.op(Op::PopPushNextSibling) }

    /// `Pop`.
    pub fn pop(&mut self) -> &mut Self { self.op(Op::Pop) }

    /// `AppendChild`.
    pub fn append_child(&mut self) -> &mut Self { self.op(Op::AppendChild) }

    /// `CreateTextNode`.
    pub fn create_text_node(&mut self, text: &str) -> &mut Self {
        let (ptr, len) = self.intern_bytes(text);
        self.op(Op::CreateTextNode { ptr, len })
    }

    /// `CreateElement`.
    pub fn create_element(&mut self, tag: &str) -> DecodeResult<&mut Self> {
        let tag = self.string_id(tag)?;
        Ok(self.op(Op::CreateElement { tag }))
    }

    /// `NewEventListener`.
    pub fn new_event_listener(&mut self, event: &str, a: u32, b: u32) -> DecodeResult<&mut Self> {
        let event = self.string_id(event)?;
        Ok(self.op(Op::NewEventListener { event, a, b }))
    }

    /// `UpdateEventListener`.
    pub fn update_event_listener(&mut self, event: &str, a: u32, b: u32) -> DecodeResult<&mut Self> {
        let event = self.string_id(event)?;
        Ok(self.op(Op::UpdateEventListener { event, a, b }))
    }

    /// `RemoveEventListener`.
    pub fn remove_event_listener(&mut self, event: &str) -> DecodeResult<&mut Self> {
        let event = self.string_id(event)?;
        Ok(self.op(Op::RemoveEventListener { event }))
    }

    /// Assemble le buffer final.
    pub fn finish(self) -> Assembled {
        let start = self.data.len() as u32;
        let len = self.ops.len() as u32;
        let mut buffer = self.data.into_vec();
        buffer.extend_from_slice(self.ops.as_slice());
        Assembled { buffer, start, len }
    }
}
