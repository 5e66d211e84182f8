//! changelist-vm — Interpréteur de change-lists
//!
//! Applique un flux d'instructions binaires (mots `u32` LE, voir
//! `changelist-core`) à un document vivant :
//!
//! - [`ChangeList`] : contrôleur (file de plages, `apply_changes`, `unmount`)
//! - [`Host`] : abstraction du document ; [`MemDom`] en est l'implémentation mémoire
//! - [`StringTable`], [`ExecStack`] : état d'exécution
//! - [`ListenerRegistry`] : listeners `(nœud, type) → (a, b)` + trampoline
//! - [`VmConfig`] : réglages (équilibre de pile, trace, profondeur max)
//!
//! ```
//! use changelist_core::ChangeListBuilder;
//! use changelist_vm::{ChangeList, Host, MemDom};
//!
//! let (mut dom, root) = MemDom::with_container("body");
//! let app = dom.create_element("div")?;
//! dom.append_child(&root, &app)?;
//!
//! let mut b = ChangeListBuilder::new();
//! b.create_element("p")?.set_text("bonjour").append_child();
//! let out = b.finish();
//!
//! let mut cl = ChangeList::new(dom, root);
//! cl.add_change_list_range(out.start, out.len)?;
//! cl.apply_changes(&out.buffer)?;
//! assert_eq!(cl.host().serialize(app), "<div><p>bonjour</p></div>");
//! # Ok::<(), changelist_vm::Error>(())
//! ```
//!
//! Mono-thread : les listeners partagent leur état avec les callbacks natifs
//! via `Rc`, `ChangeList` n'est donc pas `Send`.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms, unused_must_use)]
#![cfg_attr(not(debug_assertions), warn(missing_docs))]

pub mod change_list;
pub mod config;
pub mod error;
pub mod host;
mod interp;
pub mod listener;
pub mod mem_dom;
pub mod stack;
pub mod strings;

pub use change_list::{ChangeList, Lifecycle};
pub use config::VmConfig;
pub use error::{Error, VmResult};
pub use host::{EventCallback, Host, NodeKey, Volatile};
pub use listener::{Listener, ListenerRegistry, Trampoline, TrampolineSlot};
pub use mem_dom::{MemDom, MemEvent, NodeId, Props};
pub use stack::ExecStack;
pub use strings::StringTable;

/// Version du crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude pratique.
pub mod prelude {
    pub use crate::{ChangeList, Error, Host, MemDom, MemEvent, NodeId, VmConfig, VmResult};
    pub use changelist_core::{ChangeListBuilder, Op, OpCode};
}
