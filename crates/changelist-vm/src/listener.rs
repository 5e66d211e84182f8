//! listener.rs — Registre des listeners et pont trampoline
//!
//! Rôle :
//! - Garder, pour chaque `(nœud, type d'événement)` vivant, la paire de handles
//!   `(a, b)` courante (opaque, propre au renderer externe)
//! - Attacher/détacher le callback natif auprès de l'hôte
//! - Traduire un événement natif en `trampoline(event, a, b)`
//!
//! Un seul registre sert à la fois à la recherche O(1) (clé `(NodeKey, type)`)
//! et au démontage global ; l'ordre d'insertion est conservé (`IndexMap`).
//!
//! Après retrait ou `unmount`, un listener est *révoqué* : si un callback
//! natif traîne encore, `fire` renvoie `ListenerRevoked` au lieu de livrer
//! des handles périmés.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::warn;

use crate::error::{Error, VmResult};
use crate::host::{EventCallback, Host, NodeKey};

/// Fonction installée par `init_events_trampoline` : `(event, a, b)`.
pub type Trampoline<E> = Rc<dyn Fn(&E, u32, u32)>;

/// Emplacement partagé du trampoline : le réinstaller vaut pour tous les listeners.
pub struct TrampolineSlot<E>(Rc<RefCell<Option<Trampoline<E>>>>);

impl<E> Clone for TrampolineSlot<E> {
    fn clone(&self) -> Self { Self(Rc::clone(&self.0)) }
}

impl<E> Default for TrampolineSlot<E> {
    fn default() -> Self { Self(Rc::new(RefCell::new(None))) }
}

impl<E> TrampolineSlot<E> {
    /// Installe (ou remplace) le trampoline.
    pub fn install(&self, trampoline: Trampoline<E>) { *self.0.borrow_mut() = Some(trampoline); }
    /// Retire le trampoline.
    pub fn clear(&self) { self.0.borrow_mut().take(); }
    /// Trampoline courant.
    pub fn get(&self) -> Option<Trampoline<E>> { self.0.borrow().clone() }
    /// Vrai si un trampoline est installé.
    pub fn is_installed(&self) -> bool { self.0.borrow().is_some() }
}

/// Liaison `(nœud, type, a, b)`.
pub struct Listener<E> {
    event_type: String,
    node: NodeKey,
    handles: Cell<(u32, u32)>,
    revoked: Cell<bool>,
    trampoline: TrampolineSlot<E>,
}

impl<E> fmt::Debug for Listener<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("event_type", &self.event_type)
            .field("node", &self.node)
            .field("handles", &self.handles.get())
            .field("revoked", &self.revoked.get())
            .finish()
    }
}

impl<E> Listener<E> {
    fn new(event_type: &str, node: NodeKey, a: u32, b: u32, trampoline: TrampolineSlot<E>) -> Self {
        Self {
            event_type: event_type.to_owned(),
            node,
            handles: Cell::new((a, b)),
            revoked: Cell::new(false),
            trampoline,
        }
    }

    /// Type d'événement.
    pub fn event_type(&self) -> &str { &self.event_type }
    /// Nœud lié.
    pub fn node_key(&self) -> NodeKey { self.node }
    /// Handles courants `(a, b)`.
    pub fn handles(&self) -> (u32, u32) { self.handles.get() }
    /// Vrai après retrait ou démontage.
    pub fn is_revoked(&self) -> bool { self.revoked.get() }

    /// Livre l'événement au trampoline avec les handles courants.
    pub fn fire(&self, event: &E) -> VmResult<()> {
        if self.revoked.get() {
            return Err(Error::ListenerRevoked { event_type: self.event_type.clone() });
        }
        let trampoline = self.trampoline.get().ok_or(Error::NoTrampoline)?;
        let (a, b) = self.handles.get();
        trampoline(event, a, b);
        Ok(())
    }

    fn revoke(&self) {
        self.revoked.set(true);
        self.handles.set((0, 0));
    }
}

struct Entry<H: Host> {
    listener: Rc<Listener<H::Event>>,
    node: H::Node,
    binding: H::Binding,
}

/// Registre `(NodeKey, type) → listener`.
pub struct ListenerRegistry<H: Host> {
    entries: IndexMap<(NodeKey, String), Entry<H>>,
    trampoline: TrampolineSlot<H::Event>,
}

impl<H: Host> Default for ListenerRegistry<H> {
    fn default() -> Self { Self { entries: IndexMap::new(), trampoline: TrampolineSlot::default() } }
}

impl<H: Host> ListenerRegistry<H> {
    /// Registre vide.
    pub fn new() -> Self { Self::default() }

    /// Emplacement du trampoline partagé par tous les listeners.
    pub fn trampoline(&self) -> &TrampolineSlot<H::Event> { &self.trampoline }

    /// Nombre de listeners vivants.
    pub fn len(&self) -> usize { self.entries.len() }
    /// Vrai si aucun listener.
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Listener vivant pour `(node, event_type)`.
    pub fn get(&self, node: NodeKey, event_type: &str) -> Option<Rc<Listener<H::Event>>> {
        self.entries.get(&(node, event_type.to_owned())).map(|e| Rc::clone(&e.listener))
    }

    /// Crée le listener et attache le callback natif.
    ///
    /// Si la paire a déjà un listener, l'ancien est détaché et révoqué.
    pub fn attach(&mut self, host: &mut H, node: &H::Node, event_type: &str, a: u32, b: u32) -> VmResult<()> {
        let key = host.node_key(node);
        if let Some(old) = self.entries.shift_remove(&(key, event_type.to_owned())) {
            warn!(%key, event_type, "listener déjà présent, remplacé");
            old.listener.revoke();
            host.remove_event_listener(&old.node, event_type, old.binding)?;
        }

        let listener = Rc::new(Listener::new(event_type, key, a, b, self.trampoline.clone()));
        let callback: EventCallback<H::Event> = {
            let listener = Rc::clone(&listener);
            Rc::new(move |event: &H::Event| listener.fire(event))
        };
        let binding = host.add_event_listener(node, event_type, callback)?;
        self.entries.insert((key, event_type.to_owned()), Entry { listener, node: node.clone(), binding });
        Ok(())
    }

    /// Remplace les handles d'un listener existant (pas de ré-attache).
    pub fn update(&mut self, node: NodeKey, event_type: &str, a: u32, b: u32) -> VmResult<()> {
        let entry = self
            .entries
            .get(&(node, event_type.to_owned()))
            .ok_or_else(|| Error::MissingListener { event_type: event_type.to_owned() })?;
        entry.listener.handles.set((a, b));
        Ok(())
    }

    /// Détache et révoque le listener.
    pub fn detach(&mut self, host: &mut H, node: &H::Node, event_type: &str) -> VmResult<()> {
        let key = host.node_key(node);
        let entry = self
            .entries
            .shift_remove(&(key, event_type.to_owned()))
            .ok_or_else(|| Error::MissingListener { event_type: event_type.to_owned() })?;
        entry.listener.revoke();
        host.remove_event_listener(&entry.node, event_type, entry.binding)
    }

    /// Démontage : détache tout, révoque tout, oublie le trampoline.
    ///
    /// Continue malgré une erreur hôte et renvoie la première rencontrée.
    pub fn teardown(&mut self, host: &mut H) -> VmResult<()> {
        let mut first_err = None;
        for ((_, event_type), entry) in self.entries.drain(..) {
            entry.listener.revoke();
            if let Err(e) = host.remove_event_listener(&entry.node, &event_type, entry.binding) {
                first_err.get_or_insert(e);
            }
        }
        self.trampoline.clear();
        first_err.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem_dom::{MemDom, MemEvent};
    use pretty_assertions::assert_eq;

    type Calls = Rc<RefCell<Vec<(String, u32, u32)>>>;

    fn recording(reg: &ListenerRegistry<MemDom>) -> Calls {
        let calls: Calls = Rc::default();
        let sink = Rc::clone(&calls);
        reg.trampoline().install(Rc::new(move |ev: &MemEvent, a, b| {
            sink.borrow_mut().push((ev.event_type.clone(), a, b));
        }));
        calls
    }

    #[test]
    fn attach_update_detach() -> VmResult<()> {
        let mut dom = MemDom::new();
        let button = dom.create_element("button")?;
        let mut reg = ListenerRegistry::new();
        let calls = recording(&reg);

        reg.attach(&mut dom, &button, "click", 1, 2)?;
        assert_eq!(dom.dispatch_event(&button, "click")?, 1);

        reg.update(dom.node_key(&button), "click", 5, 6)?;
        dom.dispatch_event(&button, "click")?;

        reg.detach(&mut dom, &button, "click")?;
        assert_eq!(dom.dispatch_event(&button, "click")?, 0);

        assert_eq!(*calls.borrow(), vec![("click".to_owned(), 1, 2), ("click".to_owned(), 5, 6)]);
        assert!(reg.is_empty());
        Ok(())
    }

    #[test]
    fn missing_listener_errors() -> VmResult<()> {
        let mut dom = MemDom::new();
        let div = dom.create_element("div")?;
        let mut reg: ListenerRegistry<MemDom> = ListenerRegistry::new();
        let key = dom.node_key(&div);
        assert_eq!(
            reg.update(key, "input", 1, 1),
            Err(Error::MissingListener { event_type: "input".into() })
        );
        assert!(matches!(reg.detach(&mut dom, &div, "input"), Err(Error::MissingListener { .. })));
        Ok(())
    }

    #[test]
    fn duplicate_attach_replaces_binding() -> VmResult<()> {
        let mut dom = MemDom::new();
        let div = dom.create_element("div")?;
        let mut reg = ListenerRegistry::new();
        let calls = recording(&reg);

        reg.attach(&mut dom, &div, "click", 1, 1)?;
        let first = reg.get(dom.node_key(&div), "click").expect("listener");
        reg.attach(&mut dom, &div, "click", 2, 2)?;

        assert!(first.is_revoked());
        assert_eq!(reg.len(), 1);
        assert_eq!(dom.dispatch_event(&div, "click")?, 1);
        assert_eq!(*calls.borrow(), vec![("click".to_owned(), 2, 2)]);
        Ok(())
    }

    #[test]
    fn fire_without_trampoline() -> VmResult<()> {
        let mut dom = MemDom::new();
        let div = dom.create_element("div")?;
        let mut reg = ListenerRegistry::new();
        reg.attach(&mut dom, &div, "click", 1, 1)?;
        assert_eq!(dom.dispatch_event(&div, "click"), Err(Error::NoTrampoline));
        Ok(())
    }

    #[test]
    fn teardown_revokes_everything() -> VmResult<()> {
        let mut dom = MemDom::new();
        let a = dom.create_element("a")?;
        let b = dom.create_element("b")?;
        let mut reg = ListenerRegistry::new();
        let _calls = recording(&reg);
        reg.attach(&mut dom, &a, "click", 1, 1)?;
        reg.attach(&mut dom, &b, "input", 2, 2)?;
        let stale = reg.get(dom.node_key(&b), "input").expect("listener");

        reg.teardown(&mut dom)?;
        assert!(reg.is_empty());
        assert!(!reg.trampoline().is_installed());
        assert_eq!(dom.dispatch_event(&a, "click")?, 0);
        assert_eq!(
            stale.fire(&MemEvent::new("input", dom.node_key(&b))),
            Err(Error::ListenerRevoked { event_type: "input".into() })
        );
        Ok(())
    }
}
