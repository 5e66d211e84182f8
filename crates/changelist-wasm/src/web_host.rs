//! Hôte DOM du navigateur (`web-sys`).
//!
//! Identité des nœuds : un `WeakMap` JS associe à chaque nœud rencontré un
//! numéro croissant ; la table ne retient pas les nœuds (GC libre).

use std::cell::Cell;

use changelist_vm::{Error, EventCallback, Host, NodeKey, Volatile, VmResult};
use js_sys::{Reflect, WeakMap};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, Event, Node};

/// Callback natif attaché à un nœud ; le garder vivant tant qu'il est attaché.
pub type NativeBinding = Closure<dyn FnMut(Event)>;

fn js_host(e: JsValue) -> Error {
    let msg = e
        .as_string()
        .or_else(|| e.dyn_ref::<js_sys::Error>().map(|err| String::from(err.message())))
        .unwrap_or_else(|| format!("{e:?}"));
    Error::host(msg)
}

/// Document du navigateur.
#[derive(Debug)]
pub struct WebHost {
    document: Document,
    keys: WeakMap,
    next_key: Cell<u64>,
}

impl WebHost {
    /// Hôte sur le document propriétaire de `container`.
    pub fn for_node(container: &Node) -> VmResult<Self> {
        let document = match container.dyn_ref::<Document>() {
            Some(doc) => doc.clone(),
            None => container.owner_document().ok_or_else(|| Error::host("nœud sans document"))?,
        };
        Ok(Self { document, keys: WeakMap::new(), next_key: Cell::new(0) })
    }

    /// Document manipulé.
    pub fn document(&self) -> &Document { &self.document }

    fn element<'n>(node: &'n Node, what: &str) -> VmResult<&'n Element> {
        node.dyn_ref::<Element>().ok_or_else(|| Error::host(format!("{what}: pas un élément")))
    }
}

impl Host for WebHost {
    type Node = Node;
    type Event = Event;
    type Binding = NativeBinding;

    fn node_key(&self, node: &Node) -> NodeKey {
        let obj = node.unchecked_ref::<js_sys::Object>();
        if let Some(k) = self.keys.get(obj).as_f64() {
            return NodeKey(k as u64);
        }
        let k = self.next_key.get() + 1;
        self.next_key.set(k);
        self.keys.set(obj, &JsValue::from_f64(k as f64));
        NodeKey(k)
    }

    fn first_child(&self, node: &Node) -> Option<Node> { node.first_child() }

    fn next_sibling(&self, node: &Node) -> Option<Node> { node.next_sibling() }

    fn set_text_content(&mut self, node: &Node, text: &str) -> VmResult<()> {
        node.set_text_content(Some(text));
        Ok(())
    }

    fn remove(&mut self, node: &Node) -> VmResult<()> {
        match node.parent_node() {
            Some(parent) => parent.remove_child(node).map(drop).map_err(js_host),
            None => Ok(()),
        }
    }

    fn replace_with(&mut self, old: &Node, new: &Node) -> VmResult<()> {
        match old.parent_node() {
            Some(parent) => parent.replace_child(new, old).map(drop).map_err(js_host),
            None => Ok(()),
        }
    }

    fn append_child(&mut self, parent: &Node, child: &Node) -> VmResult<()> {
        parent.append_child(child).map(drop).map_err(js_host)
    }

    fn set_attribute(&mut self, node: &Node, name: &str, value: &str) -> VmResult<()> {
        Self::element(node, "set_attribute")?.set_attribute(name, value).map_err(js_host)
    }

    fn remove_attribute(&mut self, node: &Node, name: &str) -> VmResult<()> {
        Self::element(node, "remove_attribute")?.remove_attribute(name).map_err(js_host)
    }

    fn set_volatile(&mut self, node: &Node, prop: Volatile<'_>) -> VmResult<()> {
        let (key, value) = match prop {
            Volatile::Value(v) => ("value", v.map_or(JsValue::NULL, JsValue::from_str)),
            Volatile::Checked(on) => ("checked", JsValue::from_bool(on)),
            Volatile::Selected(on) => ("selected", JsValue::from_bool(on)),
        };
        Reflect::set(node, &JsValue::from_str(key), &value).map(drop).map_err(js_host)
    }

    fn create_text_node(&mut self, text: &str) -> VmResult<Node> { Ok(self.document.create_text_node(text).into()) }

    fn create_element(&mut self, tag: &str) -> VmResult<Node> {
        self.document.create_element(tag).map(Node::from).map_err(js_host)
    }

    fn add_event_listener(&mut self, node: &Node, event_type: &str, callback: EventCallback<Event>) -> VmResult<NativeBinding> {
        let closure = Closure::wrap(Box::new(move |ev: Event| {
            if let Err(e) = callback(&ev) {
                wasm_bindgen::throw_str(&e.to_string());
            }
        }) as Box<dyn FnMut(Event)>);
        node.add_event_listener_with_callback(event_type, closure.as_ref().unchecked_ref()).map_err(js_host)?;
        Ok(closure)
    }

    fn remove_event_listener(&mut self, node: &Node, event_type: &str, binding: NativeBinding) -> VmResult<()> {
        node.remove_event_listener_with_callback(event_type, binding.as_ref().unchecked_ref()).map_err(js_host)
    }
}
