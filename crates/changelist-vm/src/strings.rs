//! Table de chaînes : id → texte, alimentée par `AddString`.
//!
//! Jamais purgée pendant la vie de l'interpréteur ; un id réutilisé écrase
//! simplement l'entrée précédente.

use std::collections::HashMap;

use changelist_core::StringId;

use crate::error::{Error, VmResult};

/// Cache des chaînes répétées (balises, attributs, types d'événements).
#[derive(Debug, Default, Clone)]
pub struct StringTable {
    entries: HashMap<StringId, String>,
}

impl StringTable {
    /// Table vide.
    pub fn new() -> Self { Self::default() }

    /// Enregistre `text` sous `id` (écrase l'éventuelle valeur précédente).
    pub fn add(&mut self, text: impl Into<String>, id: StringId) { self.entries.insert(id, text.into()); }

    /// Texte enregistré sous `id`.
    pub fn get(&self, id: StringId) -> VmResult<&str> {
        self.entries.get(&id).map(String::as_str).ok_or(Error::MissingString { id })
    }

    /// Nombre d'entrées.
    pub fn len(&self) -> usize { self.entries.len() }
    /// Vrai si la table est vide.
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
    /// Vide la table (démontage).
    pub fn clear(&mut self) { self.entries.clear(); }
}
