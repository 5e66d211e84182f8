//! changelist-wasm — bindings WebAssembly/JS de l'interpréteur de change-lists.
//!
//! Exports (JS/TS) :
//! - init() / version()
//! - class ChangeList
//!   - new ChangeList(container)
//!   - ChangeList.withConfig(container, config)     (feature `serde`)
//!   - addChangeListRange(start, len)
//!   - applyChanges(memory: WebAssembly.Memory)
//!   - applyChangesFromBytes(bytes: Uint8Array)
//!   - addString(text, id) / getString(id)
//!   - initEventsTrampoline(fn(event, a, b))
//!   - unmount()
//!
//! Toute erreur remonte en exception JS (`Error` dont le message est celui
//! de `changelist_vm::Error`).
//!
//! Build :
//!   rustup target add wasm32-unknown-unknown
//!   cargo build -p changelist-wasm --target wasm32-unknown-unknown --release
//!   wasm-bindgen --target web --out-dir dist target/wasm32-unknown-unknown/release/changelist_wasm.wasm

#![deny(missing_docs)]

use std::fmt;

use changelist_vm::{ChangeList, VmConfig};
use js_sys::{Function, Uint8Array};
use wasm_bindgen::prelude::*;
use web_sys::{Event, Node};

mod web_host;

pub use web_host::{NativeBinding, WebHost};

/* ─────────────────────────── JS utils ─────────────────────────── */

fn js_err(msg: impl fmt::Display) -> JsValue { js_sys::Error::new(&msg.to_string()).into() }

/* ─────────────────────────── Exports ─────────────────────────── */

/// Initialise le runtime WASM (panic hook + logs console si feature `console`).
#[wasm_bindgen]
pub fn init() {
    #[cfg(feature = "console")]
    {
        console_error_panic_hook::set_once();
        let _ = console_log::init_with_level(log::Level::Info);
        log::info!("changelist-wasm: init()");
    }
}

/// Version du crate.
#[wasm_bindgen]
pub fn version() -> String { env!("CARGO_PKG_VERSION").to_string() }

/// Interpréteur lié à un conteneur du DOM.
#[wasm_bindgen(js_name = ChangeList)]
pub struct JsChangeList {
    inner: ChangeList<WebHost>,
    /// Copie de la mémoire du producteur, réutilisée d'un appel à l'autre.
    scratch: Vec<u8>,
}

#[wasm_bindgen(js_class = ChangeList)]
impl JsChangeList {
    /// Interpréteur sur `container` ; le nœud de départ est son premier enfant.
    #[wasm_bindgen(constructor)]
    pub fn new(container: Node) -> Result<JsChangeList, JsValue> {
        Self::build(container, VmConfig::default())
    }

    /// Met en file la plage `[start, start+len)` (octets).
    #[wasm_bindgen(js_name = addChangeListRange)]
    pub fn add_change_list_range(&mut self, start: u32, len: u32) -> Result<(), JsValue> {
        self.inner.add_change_list_range(start, len).map_err(js_err)
    }

    /// Applique les plages en file en lisant la mémoire linéaire du producteur.
    ///
    /// Coût : la mémoire entière est recopiée (une fois par appel, dans un
    /// tampon réutilisé), les opérandes `(ptr, len)` pouvant viser n'importe
    /// quel octet. Sans plage en file, rien n'est copié. Quand le producteur
    /// connaît la zone utile, `applyChangesFromBytes` sur une vue
    /// `Uint8Array` restreinte évite la copie intégrale.
    #[wasm_bindgen(js_name = applyChanges)]
    pub fn apply_changes(&mut self, memory: &js_sys::WebAssembly::Memory) -> Result<(), JsValue> {
        if self.inner.pending_ranges() == 0 {
            return self.inner.apply_changes(&[]).map_err(js_err);
        }
        let view = Uint8Array::new(&memory.buffer());
        self.scratch.resize(view.length() as usize, 0);
        view.copy_to(&mut self.scratch);
        self.inner.apply_changes(&self.scratch).map_err(js_err)
    }

    /// Applique les plages en file sur un buffer d'octets.
    #[wasm_bindgen(js_name = applyChangesFromBytes)]
    pub fn apply_changes_from_bytes(&mut self, bytes: &[u8]) -> Result<(), JsValue> {
        self.inner.apply_changes(bytes).map_err(js_err)
    }

    /// Enregistre `text` sous `id`.
    #[wasm_bindgen(js_name = addString)]
    pub fn add_string(&mut self, text: &str, id: u32) -> Result<(), JsValue> {
        self.inner.add_string(text, id).map_err(js_err)
    }

    /// Texte enregistré sous `id`.
    #[wasm_bindgen(js_name = getString)]
    pub fn get_string(&self, id: u32) -> Result<String, JsValue> {
        self.inner.get_string(id).map(str::to_owned).map_err(js_err)
    }

    /// Installe `fn(event, a, b)`. Une exception levée par `fn` est relancée
    /// depuis le handler natif.
    #[wasm_bindgen(js_name = initEventsTrampoline)]
    pub fn init_events_trampoline(&mut self, trampoline: Function) -> Result<(), JsValue> {
        self.inner
            .init_events_trampoline(move |event: &Event, a, b| {
                if let Err(e) = trampoline.call3(&JsValue::NULL, event, &JsValue::from(a), &JsValue::from(b)) {
                    wasm_bindgen::throw_val(e);
                }
            })
            .map_err(js_err)
    }

    /// Démonte : détache tous les listeners ; toute opération ultérieure lève.
    pub fn unmount(&mut self) -> Result<(), JsValue> { self.inner.unmount().map_err(js_err) }

    /// Nombre de listeners vivants.
    #[wasm_bindgen(getter, js_name = listenerCount)]
    pub fn listener_count(&self) -> usize { self.inner.listener_count() }

    /// `false` après `unmount()`.
    #[wasm_bindgen(getter, js_name = isMounted)]
    pub fn is_mounted(&self) -> bool { self.inner.is_mounted() }
}

#[cfg(feature = "serde")]
#[wasm_bindgen(js_class = ChangeList)]
impl JsChangeList {
    /// Variante configurée : `{ strict_stack, trace_ops, max_stack_depth }`
    /// (champs optionnels).
    #[wasm_bindgen(js_name = withConfig)]
    pub fn with_config(container: Node, config: JsValue) -> Result<JsChangeList, JsValue> {
        let config: VmConfig = if config.is_undefined() || config.is_null() {
            VmConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config).map_err(js_err)?
        };
        Self::build(container, config)
    }
}

impl JsChangeList {
    fn build(container: Node, config: VmConfig) -> Result<JsChangeList, JsValue> {
        let host = WebHost::for_node(&container).map_err(js_err)?;
        Ok(Self { inner: ChangeList::with_config(host, container, config), scratch: Vec::new() })
    }

    /// Interpréteur Rust sous-jacent.
    pub fn inner(&self) -> &ChangeList<WebHost> { &self.inner }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use changelist_core::ChangeListBuilder;
    use std::cell::RefCell;
    use std::rc::Rc;
    use wasm_bindgen::JsCast;
    use wasm_bindgen_test::*;
    use web_sys::{Element, HtmlInputElement};

    wasm_bindgen_test_configure!(run_in_browser);

    fn container() -> (Element, Element) {
        let doc = web_sys::window().and_then(|w| w.document()).expect("document");
        let root = doc.create_element("div").expect("div");
        let seed = doc.create_element("section").expect("section");
        root.append_child(&seed).expect("append");
        (root, seed)
    }

    fn run(cl: &mut JsChangeList, b: ChangeListBuilder) -> Result<(), JsValue> {
        let out = b.finish();
        cl.add_change_list_range(out.start, out.len)?;
        cl.apply_changes_from_bytes(&out.buffer)
    }

    #[wasm_bindgen_test]
    fn builds_real_dom() {
        let (root, seed) = container();
        let mut cl = JsChangeList::new(root.into()).expect("new");
        let mut b = ChangeListBuilder::new();
        b.create_element("div").and_then(|b| b.set_attribute("class", "box")).expect("builder").append_child();
        run(&mut cl, b).expect("apply");
        assert_eq!(seed.inner_html(), r#"<div class="box"></div>"#);
    }

    #[wasm_bindgen_test]
    fn checked_property_follows_attribute() {
        let doc = web_sys::window().and_then(|w| w.document()).expect("document");
        let root = doc.create_element("div").expect("div");
        let input: HtmlInputElement = doc.create_element("input").expect("input").unchecked_into();
        input.set_type("checkbox");
        root.append_child(&input).expect("append");

        let mut cl = JsChangeList::new(root.into()).expect("new");
        let mut b = ChangeListBuilder::new();
        b.set_attribute("checked", "").expect("builder");
        run(&mut cl, b).expect("apply");
        assert!(input.checked());

        let mut b = ChangeListBuilder::with_first_id(10);
        b.remove_attribute("checked").expect("builder");
        run(&mut cl, b).expect("apply");
        assert!(!input.checked());
    }

    fn memory_with(bytes: &[u8]) -> js_sys::WebAssembly::Memory {
        let desc = js_sys::Object::new();
        js_sys::Reflect::set(&desc, &"initial".into(), &JsValue::from(1)).expect("descriptor");
        let memory = js_sys::WebAssembly::Memory::new(&desc).expect("memory");
        Uint8Array::new(&memory.buffer()).subarray(0, bytes.len() as u32).copy_from(bytes);
        memory
    }

    #[wasm_bindgen_test]
    fn apply_changes_reads_linear_memory_repeatedly() {
        let (root, seed) = container();
        let mut cl = JsChangeList::new(root.into()).expect("new");

        let mut b = ChangeListBuilder::new();
        b.create_text_node("x").append_child();
        let out = b.finish();
        let memory = memory_with(&out.buffer);

        for _ in 0..2 {
            cl.add_change_list_range(out.start, out.len).expect("range");
            cl.apply_changes(&memory).expect("apply");
        }
        assert_eq!(seed.text_content().as_deref(), Some("xx"));
        assert_eq!(cl.scratch.len(), 65536);
    }

    #[wasm_bindgen_test]
    fn click_reaches_trampoline_then_unmount() {
        let (root, seed) = container();
        let mut cl = JsChangeList::new(root.into()).expect("new");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        cl.inner
            .init_events_trampoline(move |_: &Event, a, b| sink.borrow_mut().push((a, b)))
            .expect("trampoline");

        let mut b = ChangeListBuilder::new();
        b.new_event_listener("click", 1, 2).expect("builder");
        run(&mut cl, b).expect("apply");

        let click = Event::new("click").expect("event");
        seed.dispatch_event(&click).expect("dispatch");
        assert_eq!(*seen.borrow(), vec![(1, 2)]);

        cl.unmount().expect("unmount");
        seed.dispatch_event(&click).expect("dispatch");
        assert_eq!(seen.borrow().len(), 1);
        assert!(cl.add_change_list_range(0, 4).is_err());
    }
}
