//! mem_dom.rs — Document en mémoire (arène de nœuds)
//!
//! Hôte headless pour les tests et les outils : éléments, nœuds texte,
//! attributs ordonnés, propriétés vivantes (`value`, `checked`, `selected`)
//! et handlers d'événements. `dispatch_event` livre un événement synthétique
//! aux handlers de la cible (pas de propagation).
//!
//! Les nœuds ne sont jamais libérés : un nœud retiré reste dans l'arène,
//! simplement détaché.

use std::fmt::Write as _;

use indexmap::IndexMap;

use crate::error::{Error, VmResult};
use crate::host::{EventCallback, Host, NodeKey, Volatile};

/// Index d'un nœud dans l'arène.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Index dans l'arène.
    #[inline]
    pub fn index(self) -> usize { self.0 as usize }
}

/// Événement synthétique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemEvent {
    /// Type (`click`, `input`…).
    pub event_type: String,
    /// Nœud cible.
    pub target: NodeKey,
}

impl MemEvent {
    /// Nouvel événement.
    pub fn new(event_type: impl Into<String>, target: NodeKey) -> Self {
        Self { event_type: event_type.into(), target }
    }
}

/// État vivant d'un contrôle de formulaire.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Props {
    /// `node.value`
    pub value: Option<String>,
    /// `node.checked`
    pub checked: bool,
    /// `node.selected`
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    Element { tag: String, attrs: IndexMap<String, String>, props: Props },
    Text(String),
}

struct Handler {
    event_type: String,
    binding: u64,
    callback: EventCallback<MemEvent>,
}

struct NodeData {
    kind: Kind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    handlers: Vec<Handler>,
}

/// Document en mémoire.
#[derive(Default)]
pub struct MemDom {
    nodes: Vec<NodeData>,
    next_binding: u64,
}

impl std::fmt::Debug for MemDom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemDom").field("nodes", &self.nodes.len()).finish()
    }
}

impl MemDom {
    /// Document vide.
    pub fn new() -> Self { Self::default() }

    /// Document contenant un conteneur `<tag>` vide ; renvoie aussi son id.
    pub fn with_container(tag: &str) -> (Self, NodeId) {
        let mut dom = Self::new();
        let root = dom.alloc(Kind::Element { tag: tag.to_owned(), attrs: IndexMap::new(), props: Props::default() });
        (dom, root)
    }

    /// Nombre de nœuds alloués (détachés compris).
    pub fn len(&self) -> usize { self.nodes.len() }
    /// Vrai si aucun nœud.
    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }

    fn alloc(&mut self, kind: Kind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData { kind, parent: None, children: Vec::new(), handlers: Vec::new() });
        id
    }

    fn data(&self, id: NodeId) -> VmResult<&NodeData> {
        self.nodes.get(id.index()).ok_or_else(|| Error::host(format!("nœud inconnu: {}", id.0)))
    }

    fn data_mut(&mut self, id: NodeId) -> VmResult<&mut NodeData> {
        self.nodes.get_mut(id.index()).ok_or_else(|| Error::host(format!("nœud inconnu: {}", id.0)))
    }

    fn element_mut(&mut self, id: NodeId) -> VmResult<(&mut IndexMap<String, String>, &mut Props)> {
        match &mut self.data_mut(id)?.kind {
            Kind::Element { attrs, props, .. } => Ok((attrs, props)),
            Kind::Text(_) => Err(Error::host(format!("nœud texte {} : pas d'attributs", id.0))),
        }
    }

    fn detach(&mut self, id: NodeId) -> VmResult<()> {
        if let Some(parent) = self.data_mut(id)?.parent.take() {
            self.data_mut(parent)?.children.retain(|&c| c != id);
        }
        Ok(())
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.nodes.get(node.index()).and_then(|d| d.parent) {
                Some(p) => node = p,
                None => return false,
            }
        }
    }

    /* ─────────────── Inspection ─────────────── */

    /// Balise d'un élément.
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.nodes.get(id.index())?.kind {
            Kind::Element { tag, .. } => Some(tag),
            Kind::Text(_) => None,
        }
    }

    /// Valeur d'un attribut.
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.nodes.get(id.index())?.kind {
            Kind::Element { attrs, .. } => attrs.get(name).map(String::as_str),
            Kind::Text(_) => None,
        }
    }

    fn props(&self, id: NodeId) -> Option<&Props> {
        match &self.nodes.get(id.index())?.kind {
            Kind::Element { props, .. } => Some(props),
            Kind::Text(_) => None,
        }
    }

    /// Propriété vivante `value`.
    pub fn value(&self, id: NodeId) -> Option<&str> { self.props(id)?.value.as_deref() }
    /// Propriété vivante `checked`.
    pub fn checked(&self, id: NodeId) -> bool { self.props(id).is_some_and(|p| p.checked) }
    /// Propriété vivante `selected`.
    pub fn selected(&self, id: NodeId) -> bool { self.props(id).is_some_and(|p| p.selected) }

    /// Enfants, dans l'ordre.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id.index()).map(|d| d.children.as_slice()).unwrap_or(&[])
    }

    /// Parent éventuel.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> { self.nodes.get(id.index())?.parent }

    /// Nombre de handlers attachés au nœud.
    pub fn handler_count(&self, id: NodeId) -> usize { self.nodes.get(id.index()).map_or(0, |d| d.handlers.len()) }

    /// Concaténation des textes descendants.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let Some(d) = self.nodes.get(id.index()) else { return };
        match &d.kind {
            Kind::Text(t) => out.push_str(t),
            Kind::Element { .. } => {
                for &c in &d.children {
                    self.collect_text(c, out);
                }
            }
        }
    }

    /// Sérialisation HTML du sous-arbre (attributs dans l'ordre de pose).
    pub fn serialize(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        let Some(d) = self.nodes.get(id.index()) else { return };
        match &d.kind {
            Kind::Text(t) => escape_into(t, false, out),
            Kind::Element { tag, attrs, .. } => {
                let _ = write!(out, "<{tag}");
                for (name, value) in attrs {
                    let _ = write!(out, " {name}=\"");
                    escape_into(value, true, out);
                    out.push('"');
                }
                out.push('>');
                for &c in &d.children {
                    self.write_node(c, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }

    /* ─────────────── Événements ─────────────── */

    /// Déclenche `event_type` sur `node` ; renvoie le nombre de handlers appelés.
    ///
    /// La première erreur d'un handler (listener révoqué, trampoline absent)
    /// est remontée telle quelle.
    pub fn dispatch_event(&self, node: &NodeId, event_type: &str) -> VmResult<usize> {
        let event = MemEvent::new(event_type, self.node_key(node));
        let callbacks: Vec<EventCallback<MemEvent>> = self
            .data(*node)?
            .handlers
            .iter()
            .filter(|h| h.event_type == event_type)
            .map(|h| h.callback.clone())
            .collect();
        for cb in &callbacks {
            cb(&event)?;
        }
        Ok(callbacks.len())
    }
}

fn escape_into(s: &str, attr: bool, out: &mut String) {
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attr => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}

impl Host for MemDom {
    type Node = NodeId;
    type Event = MemEvent;
    type Binding = u64;

    fn node_key(&self, node: &NodeId) -> NodeKey { NodeKey(u64::from(node.0)) }

    fn first_child(&self, node: &NodeId) -> Option<NodeId> { self.children(*node).first().copied() }

    fn next_sibling(&self, node: &NodeId) -> Option<NodeId> {
        let parent = self.parent(*node)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|c| c == node)?;
        siblings.get(pos + 1).copied()
    }

    fn set_text_content(&mut self, node: &NodeId, text: &str) -> VmResult<()> {
        if let Kind::Text(t) = &mut self.data_mut(*node)?.kind {
            *t = text.to_owned();
            return Ok(());
        }
        let old = std::mem::take(&mut self.data_mut(*node)?.children);
        for c in old {
            self.data_mut(c)?.parent = None;
        }
        if !text.is_empty() {
            let t = self.alloc(Kind::Text(text.to_owned()));
            self.append_child(node, &t)?;
        }
        Ok(())
    }

    fn remove(&mut self, node: &NodeId) -> VmResult<()> { self.detach(*node) }

    fn replace_with(&mut self, old: &NodeId, new: &NodeId) -> VmResult<()> {
        let Some(parent) = self.data(*old)?.parent else { return Ok(()) };
        if old == new {
            return Ok(());
        }
        if self.is_inclusive_ancestor(*new, parent) {
            return Err(Error::host("replace_with: cycle dans l'arbre"));
        }
        self.detach(*new)?;
        let siblings = &mut self.data_mut(parent)?.children;
        let pos = siblings
            .iter()
            .position(|c| c == old)
            .ok_or_else(|| Error::host("replace_with: arbre incohérent"))?;
        siblings[pos] = *new;
        self.data_mut(*old)?.parent = None;
        self.data_mut(*new)?.parent = Some(parent);
        Ok(())
    }

    fn append_child(&mut self, parent: &NodeId, child: &NodeId) -> VmResult<()> {
        if matches!(self.data(*parent)?.kind, Kind::Text(_)) {
            return Err(Error::host("append_child: un nœud texte n'a pas d'enfants"));
        }
        if self.is_inclusive_ancestor(*child, *parent) {
            return Err(Error::host("append_child: cycle dans l'arbre"));
        }
        self.detach(*child)?;
        self.data_mut(*parent)?.children.push(*child);
        self.data_mut(*child)?.parent = Some(*parent);
        Ok(())
    }

    fn set_attribute(&mut self, node: &NodeId, name: &str, value: &str) -> VmResult<()> {
        let (attrs, _) = self.element_mut(*node)?;
        attrs.insert(name.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove_attribute(&mut self, node: &NodeId, name: &str) -> VmResult<()> {
        let (attrs, _) = self.element_mut(*node)?;
        attrs.shift_remove(name);
        Ok(())
    }

    fn set_volatile(&mut self, node: &NodeId, prop: Volatile<'_>) -> VmResult<()> {
        let (_, props) = self.element_mut(*node)?;
        match prop {
            Volatile::Value(v) => props.value = v.map(str::to_owned),
            Volatile::Checked(on) => props.checked = on,
            Volatile::Selected(on) => props.selected = on,
        }
        Ok(())
    }

    fn create_text_node(&mut self, text: &str) -> VmResult<NodeId> { Ok(self.alloc(Kind::Text(text.to_owned()))) }

    fn create_element(&mut self, tag: &str) -> VmResult<NodeId> {
        Ok(self.alloc(Kind::Element { tag: tag.to_owned(), attrs: IndexMap::new(), props: Props::default() }))
    }

    fn add_event_listener(
        &mut self,
        node: &NodeId,
        event_type: &str,
        callback: EventCallback<MemEvent>,
    ) -> VmResult<u64> {
        self.next_binding += 1;
        let binding = self.next_binding;
        self.data_mut(*node)?.handlers.push(Handler { event_type: event_type.to_owned(), binding, callback });
        Ok(binding)
    }

    fn remove_event_listener(&mut self, node: &NodeId, _event_type: &str, binding: u64) -> VmResult<()> {
        self.data_mut(*node)?.handlers.retain(|h| h.binding != binding);
        Ok(())
    }
}
