//! interp.rs — Boucle de décodage + dispatch des 15 instructions
//!
//! Une plage `[start, start+len)` est lue mot à mot ; chaque instruction est
//! décodée en [`Op`] puis exécutée par un unique `match`. La première erreur
//! interrompt la plage (et, côté contrôleur, toutes les plages suivantes).

use changelist_core::{decode_str, Op, WordReader};
use tracing::trace;

use crate::error::VmResult;
use crate::host::{Host, Volatile};
use crate::listener::ListenerRegistry;
use crate::stack::ExecStack;
use crate::strings::StringTable;

/// Vue mutable sur l'état du contrôleur pendant une application.
pub(crate) struct Machine<'a, H: Host> {
    pub(crate) host: &'a mut H,
    pub(crate) stack: &'a mut ExecStack<H::Node>,
    pub(crate) strings: &'a mut StringTable,
    pub(crate) listeners: &'a mut ListenerRegistry<H>,
    pub(crate) trace_ops: bool,
}

impl<H: Host> Machine<'_, H> {
    /// Exécute une plage ; renvoie le nombre d'instructions exécutées.
    pub(crate) fn run_range(&mut self, mem: &[u8], start: u32, len: u32) -> VmResult<usize> {
        let mut r = WordReader::range(mem, start, len)?;
        let mut executed = 0usize;
        while !r.is_at_end() {
            let at = r.offset();
            let op = Op::decode(&mut r)?;
            if self.trace_ops {
                trace!(at, %op, depth = self.stack.depth(), "op");
            }
            self.exec(mem, op)?;
            executed += 1;
        }
        Ok(executed)
    }

    /// Exécute une instruction décodée.
    pub(crate) fn exec(&mut self, mem: &[u8], op: Op) -> VmResult<()> {
        let code = op.code();
        match op {
            Op::SetText { ptr, len } => {
                let text = decode_str(mem, ptr, len)?;
                let node = self.stack.top_node(code)?.clone();
                self.host.set_text_content(&node, &text)
            }
            Op::RemoveSelfAndNextSiblings => {
                let mut cur = Some(self.stack.pop_node(code)?);
                while let Some(node) = cur {
                    cur = self.host.next_sibling(&node);
                    self.host.remove(&node)?;
                }
                Ok(())
            }
            Op::ReplaceWith => {
                let new = self.stack.pop_node(code)?;
                let old = self.stack.pop_node(code)?;
                self.host.replace_with(&old, &new)?;
                self.stack.push(Some(new))
            }
            Op::SetAttribute { name, value } => {
                let node = self.stack.top_node(code)?.clone();
                let name = self.strings.get(name)?;
                let value = self.strings.get(value)?;
                self.host.set_attribute(&node, name, value)?;
                match Volatile::on_set(name, value) {
                    Some(prop) => self.host.set_volatile(&node, prop),
                    None => Ok(()),
                }
            }
            Op::RemoveAttribute { name } => {
                let node = self.stack.top_node(code)?.clone();
                let name = self.strings.get(name)?;
                self.host.remove_attribute(&node, name)?;
                match Volatile::on_remove(name) {
                    Some(prop) => self.host.set_volatile(&node, prop),
                    None => Ok(()),
                }
            }
            Op::PushFirstChild => {
                let child = self.host.first_child(self.stack.top_node(code)?);
                self.stack.push(child)
            }
            Op::PopPushNextSibling => {
                let node = self.stack.pop_node(code)?;
                let next = self.host.next_sibling(&node);
                self.stack.push(next)
            }
            Op::Pop => self.stack.pop(code).map(drop),
            Op::AppendChild => {
                let child = self.stack.pop_node(code)?;
                let parent = self.stack.top_node(code)?.clone();
                self.host.append_child(&parent, &child)
            }
            Op::CreateTextNode { ptr, len } => {
                let text = decode_str(mem, ptr, len)?;
                let node = self.host.create_text_node(&text)?;
                self.stack.push(Some(node))
            }
            Op::CreateElement { tag } => {
                let tag = self.strings.get(tag)?;
                let node = self.host.create_element(tag)?;
                self.stack.push(Some(node))
            }
            Op::NewEventListener { event, a, b } => {
                let node = self.stack.top_node(code)?.clone();
                let event_type = self.strings.get(event)?;
                self.listeners.attach(self.host, &node, event_type, a, b)
            }
            Op::UpdateEventListener { event, a, b } => {
                let key = self.host.node_key(self.stack.top_node(code)?);
                let event_type = self.strings.get(event)?;
                self.listeners.update(key, event_type, a, b)
            }
            Op::RemoveEventListener { event } => {
                let node = self.stack.top_node(code)?.clone();
                let event_type = self.strings.get(event)?;
                self.listeners.detach(self.host, &node, event_type)
            }
            Op::AddString { ptr, len, id } => {
                let text = decode_str(mem, ptr, len)?;
                self.strings.add(text.into_owned(), id);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::mem_dom::MemDom;
    use changelist_core::{ChangeListBuilder, DecodeError, OpCode};
    use pretty_assertions::assert_eq;

    struct Fixture {
        dom: MemDom,
        stack: ExecStack<crate::mem_dom::NodeId>,
        strings: StringTable,
        listeners: ListenerRegistry<MemDom>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dom: MemDom::new(),
                stack: ExecStack::new(),
                strings: StringTable::new(),
                listeners: ListenerRegistry::new(),
            }
        }

        fn run(&mut self, b: ChangeListBuilder) -> VmResult<usize> {
            let out = b.finish();
            let mut m = Machine {
                host: &mut self.dom,
                stack: &mut self.stack,
                strings: &mut self.strings,
                listeners: &mut self.listeners,
                trace_ops: true,
            };
            m.run_range(&out.buffer, out.start, out.len)
        }
    }

    #[test]
    fn create_and_append() -> VmResult<()> {
        let mut f = Fixture::new();
        let root = f.dom.create_element("main")?;
        f.stack.push(Some(root))?;

        let mut b = ChangeListBuilder::new();
        b.create_element("p")?.create_text_node("salut").append_child().append_child();
        assert_eq!(f.run(b)?, 5);

        assert_eq!(f.dom.serialize(root), "<main><p>salut</p></main>");
        assert_eq!(f.stack.depth(), 1);
        Ok(())
    }

    #[test]
    fn replace_pushes_new_node_back() -> VmResult<()> {
        let mut f = Fixture::new();
        let root = f.dom.create_element("div")?;
        let old = f.dom.create_element("span")?;
        f.dom.append_child(&root, &old)?;
        f.stack.push(Some(root))?;

        let mut b = ChangeListBuilder::new();
        b.push_first_child().create_element("em")?.replace_with();
        f.run(b)?;

        assert_eq!(f.dom.serialize(root), "<div><em></em></div>");
        let top = *f.stack.top_node(OpCode::Pop)?;
        assert_eq!(f.dom.tag(top), Some("em"));
        Ok(())
    }

    #[test]
    fn remove_self_and_next_siblings() -> VmResult<()> {
        let mut f = Fixture::new();
        let root = f.dom.create_element("ul")?;
        for _ in 0..3 {
            let li = f.dom.create_element("li")?;
            f.dom.append_child(&root, &li)?;
        }
        f.stack.push(Some(root))?;

        let mut b = ChangeListBuilder::new();
        b.push_first_child().pop_push_next_sibling().remove_self_and_next_siblings();
        f.run(b)?;

        assert_eq!(f.dom.serialize(root), "<ul><li></li></ul>");
        assert_eq!(f.stack.depth(), 1);
        Ok(())
    }

    #[test]
    fn set_text_and_attributes() -> VmResult<()> {
        let mut f = Fixture::new();
        let input = f.dom.create_element("input")?;
        f.stack.push(Some(input))?;

        let mut b = ChangeListBuilder::new();
        b.set_attribute("value", "abc")?.set_attribute("id", "x")?.remove_attribute("id")?;
        f.run(b)?;

        assert_eq!(f.dom.value(input), Some("abc"));
        assert_eq!(f.dom.attribute(input, "value"), Some("abc"));
        assert_eq!(f.dom.attribute(input, "id"), None);

        let mut b = ChangeListBuilder::with_first_id(100);
        b.remove_attribute("value")?.set_text("t");
        f.run(b)?;
        assert_eq!(f.dom.value(input), None);
        assert_eq!(f.dom.text_content(input), "t");
        Ok(())
    }

    #[test]
    fn missing_string_is_fatal() -> VmResult<()> {
        let mut f = Fixture::new();
        let root = f.dom.create_element("div")?;
        f.stack.push(Some(root))?;

        let mut b = ChangeListBuilder::new();
        b.op(Op::CreateElement { tag: 42 });
        assert_eq!(f.run(b), Err(Error::MissingString { id: 42 }));
        Ok(())
    }

    #[test]
    fn absent_slot_rejected() -> VmResult<()> {
        let mut f = Fixture::new();
        let empty = f.dom.create_element("div")?;
        f.stack.push(Some(empty))?;

        let mut b = ChangeListBuilder::new();
        b.push_first_child().set_text("x");
        assert_eq!(f.run(b), Err(Error::AbsentNode { op: OpCode::SetText }));
        Ok(())
    }

    #[test]
    fn truncated_operands() {
        let mut f = Fixture::new();
        // opcode SetText sans ses deux opérandes
        let mem = 0u32.to_le_bytes();
        let mut m = Machine {
            host: &mut f.dom,
            stack: &mut f.stack,
            strings: &mut f.strings,
            listeners: &mut f.listeners,
            trace_ops: false,
        };
        assert_eq!(m.run_range(&mem, 0, 4), Err(Error::Decode(DecodeError::UnexpectedEof { at: 4 })));
    }
}
