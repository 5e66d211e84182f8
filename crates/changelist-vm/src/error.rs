//! Erreurs de l'interpréteur.

use changelist_core::{DecodeError, OpCode, StringId};
use thiserror::Error;

/// Erreurs de l'interpréteur.
///
/// Toutes sont fatales pour l'appel `apply_changes` en cours : les
/// instructions suivantes ne sont pas exécutées et rien n'est annulé.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Flux mal formé (bornes, alignement, opcode inconnu…).
    #[error("décodage: {0}")]
    Decode(#[from] DecodeError),

    /// Id absent de la table de chaînes.
    #[error("chaîne inconnue: id {id}")]
    MissingString {
        /// Id demandé.
        id: StringId,
    },

    /// `pop`/`top` sur pile vide.
    #[error("pile vide pendant {op}")]
    StackUnderflow {
        /// Instruction fautive.
        op: OpCode,
    },

    /// Le slot consulté ne contient pas de nœud (premier enfant ou frère absent).
    #[error("nœud absent sur la pile pendant {op}")]
    AbsentNode {
        /// Instruction fautive.
        op: OpCode,
    },

    /// Profondeur maximale configurée dépassée.
    #[error("pile pleine: limite {limit}")]
    StackOverflow {
        /// Limite configurée.
        limit: usize,
    },

    /// Pile non vidée en fin d'application (producteur et interpréteur désaccordés).
    #[error("pile déséquilibrée en fin d'application: profondeur {depth}")]
    UnbalancedStack {
        /// Profondeur restante.
        depth: usize,
    },

    /// Aucun listener pour ce `(nœud, type)`.
    #[error("aucun listener `{event_type}` sur ce nœud")]
    MissingListener {
        /// Type d'événement.
        event_type: String,
    },

    /// Listener déclenché après son retrait ou après `unmount`.
    #[error("listener `{event_type}` invoqué après son retrait")]
    ListenerRevoked {
        /// Type d'événement.
        event_type: String,
    },

    /// Événement reçu avant `init_events_trampoline`.
    #[error("aucun trampoline d'événements installé")]
    NoTrampoline,

    /// Opération publique après `unmount`.
    #[error("change-list démontée")]
    Unmounted,

    /// Échec côté document hôte.
    #[error("hôte: {0}")]
    Host(String),
}

impl Error {
    /// Construit une erreur hôte.
    pub fn host(msg: impl Into<String>) -> Self { Error::Host(msg.into()) }
}

/// Résultat de l'interpréteur.
pub type VmResult<T> = std::result::Result<T, Error>;
