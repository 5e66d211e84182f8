//! host.rs — Abstraction du document manipulé par l'interpréteur
//!
//! L'interpréteur ne connaît aucune API de document : il passe par [`Host`].
//! Deux implémentations existent :
//!   - [`crate::MemDom`] : arbre en mémoire (headless, tests, outils),
//!   - `changelist_wasm::WebHost` : le DOM du navigateur via `web-sys`.
//!
//! Identité des nœuds : [`Host::node_key`] doit renvoyer la même clé pour le
//! même nœud tant qu'il vit. Le registre de listeners s'indexe dessus.

use std::fmt;
use std::rc::Rc;

use crate::error::VmResult;

/// Identité stable d'un nœud, fournie par l'hôte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(pub u64);

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "node#{}", self.0) }
}

/// Callback natif installé sur un nœud. Renvoie une erreur si le listener
/// derrière a été révoqué : l'hôte doit la remonter bruyamment.
pub type EventCallback<E> = Rc<dyn Fn(&E) -> VmResult<()>>;

/// Propriétés « volatiles » : l'attribut seul ne change pas l'état vivant
/// d'un contrôle de formulaire, il faut aussi écrire la propriété.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Volatile<'a> {
    /// `node.value = …` (`None` ⇒ `null`).
    Value(Option<&'a str>),
    /// `node.checked = …`
    Checked(bool),
    /// `node.selected = …`
    Selected(bool),
}

impl<'a> Volatile<'a> {
    /// Propriété à refléter après `SetAttribute(name, value)`.
    pub fn on_set(name: &str, value: &'a str) -> Option<Self> {
        match name {
            "value" => Some(Volatile::Value(Some(value))),
            "checked" => Some(Volatile::Checked(true)),
            "selected" => Some(Volatile::Selected(true)),
            _ => None,
        }
    }

    /// Propriété à remettre à zéro après `RemoveAttribute(name)`.
    pub fn on_remove(name: &str) -> Option<Volatile<'static>> {
        match name {
            "value" => Some(Volatile::Value(None)),
            "checked" => Some(Volatile::Checked(false)),
            "selected" => Some(Volatile::Selected(false)),
            _ => None,
        }
    }
}

/// Document hôte.
///
/// Les méthodes de mutation peuvent échouer (API web qui lève) : l'erreur
/// remonte telle quelle et interrompt l'application en cours.
pub trait Host {
    /// Référence à un nœud (clonable, bon marché).
    type Node: Clone + fmt::Debug + 'static;
    /// Événement natif transmis au trampoline.
    type Event: 'static;
    /// Jeton renvoyé à l'attache d'un callback, rendu au détachement.
    type Binding;

    /// Identité stable du nœud.
    fn node_key(&self, node: &Self::Node) -> NodeKey;

    /// Nœud racine de l'exécution : par défaut le premier enfant du conteneur.
    fn root_seed(&self, container: &Self::Node) -> Option<Self::Node> { self.first_child(container) }

    /// Premier enfant.
    fn first_child(&self, node: &Self::Node) -> Option<Self::Node>;
    /// Frère suivant.
    fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Remplace le contenu texte du nœud.
    fn set_text_content(&mut self, node: &Self::Node, text: &str) -> VmResult<()>;
    /// Détache le nœud de son parent (sans effet s'il n'en a pas).
    fn remove(&mut self, node: &Self::Node) -> VmResult<()>;
    /// Met `new` à la place de `old` dans l'arbre.
    fn replace_with(&mut self, old: &Self::Node, new: &Self::Node) -> VmResult<()>;
    /// Ajoute `child` en dernier enfant de `parent`.
    fn append_child(&mut self, parent: &Self::Node, child: &Self::Node) -> VmResult<()>;

    /// Pose un attribut.
    fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str) -> VmResult<()>;
    /// Retire un attribut.
    fn remove_attribute(&mut self, node: &Self::Node, name: &str) -> VmResult<()>;
    /// Écrit une propriété volatile.
    fn set_volatile(&mut self, node: &Self::Node, prop: Volatile<'_>) -> VmResult<()>;

    /// Crée un nœud texte détaché.
    fn create_text_node(&mut self, text: &str) -> VmResult<Self::Node>;
    /// Crée un élément détaché.
    fn create_element(&mut self, tag: &str) -> VmResult<Self::Node>;

    /// Attache un callback natif pour `event_type`.
    fn add_event_listener(
        &mut self,
        node: &Self::Node,
        event_type: &str,
        callback: EventCallback<Self::Event>,
    ) -> VmResult<Self::Binding>;

    /// Détache un callback précédemment attaché.
    fn remove_event_listener(&mut self, node: &Self::Node, event_type: &str, binding: Self::Binding) -> VmResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volatile_mapping() {
        assert_eq!(Volatile::on_set("value", "x"), Some(Volatile::Value(Some("x"))));
        assert_eq!(Volatile::on_set("checked", ""), Some(Volatile::Checked(true)));
        assert_eq!(Volatile::on_set("selected", "false"), Some(Volatile::Selected(true)));
        assert_eq!(Volatile::on_set("class", "box"), None);

        assert_eq!(Volatile::on_remove("value"), Some(Volatile::Value(None)));
        assert_eq!(Volatile::on_remove("checked"), Some(Volatile::Checked(false)));
        assert_eq!(Volatile::on_remove("selected"), Some(Volatile::Selected(false)));
        assert_eq!(Volatile::on_remove("id"), None);
    }
}
