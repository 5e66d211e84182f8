//! Propriétés de bout en bout : flux construits avec `ChangeListBuilder`,
//! appliqués sur un `MemDom`.

use std::cell::RefCell;
use std::rc::Rc;

use changelist_core::{ChangeListBuilder, DecodeError, Op};
use changelist_vm::{ChangeList, Error, Host, MemDom, MemEvent, NodeId, VmResult};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

type Calls = Rc<RefCell<Vec<(String, u32, u32)>>>;

/// Conteneur `<body>` avec un unique enfant `<tag>` (le nœud de départ).
fn mounted(tag: &str) -> VmResult<(ChangeList<MemDom>, NodeId)> {
    let (mut dom, root) = MemDom::with_container("body");
    let seed = dom.create_element(tag)?;
    dom.append_child(&root, &seed)?;
    Ok((ChangeList::new(dom, root), seed))
}

fn apply(cl: &mut ChangeList<MemDom>, b: ChangeListBuilder) -> VmResult<()> {
    let out = b.finish();
    cl.add_change_list_range(out.start, out.len)?;
    cl.apply_changes(&out.buffer)
}

fn record(cl: &mut ChangeList<MemDom>) -> VmResult<Calls> {
    let calls: Calls = Rc::default();
    let sink = Rc::clone(&calls);
    cl.init_events_trampoline(move |ev: &MemEvent, a, b| sink.borrow_mut().push((ev.event_type.clone(), a, b)))?;
    Ok(calls)
}

#[test]
fn class_attribute_on_new_div() -> VmResult<()> {
    let (mut cl, seed) = mounted("main")?;
    let mut b = ChangeListBuilder::new();
    b.create_element("div")?
        .add_string("class", 2)
        .add_string("box", 3)
        .op(Op::SetAttribute { name: 2, value: 3 })
        .append_child();
    apply(&mut cl, b)?;

    let dom = cl.host();
    let first = dom.first_child(&seed).expect("div ajouté");
    assert_eq!(dom.serialize(first), r#"<div class="box"></div>"#);
    assert_eq!(cl.stack_depth(), 0);
    Ok(())
}

#[test]
fn identical_stream_twice_gives_same_shape() -> VmResult<()> {
    let (mut cl, seed) = mounted("main")?;
    let old = cl.host_mut().create_element("span")?;
    cl.host_mut().append_child(&seed, &old)?;

    let mut b = ChangeListBuilder::new();
    b.push_first_child()
        .create_element("div")?
        .set_attribute("class", "box")?
        .create_text_node("x")
        .append_child()
        .replace_with()
        .pop();
    let out = b.finish();

    cl.add_change_list_range(out.start, out.len)?;
    cl.apply_changes(&out.buffer)?;
    let once = cl.host().serialize(seed);

    cl.add_change_list_range(out.start, out.len)?;
    cl.apply_changes(&out.buffer)?;
    assert_eq!(cl.host().serialize(seed), once);
    assert_eq!(once, r#"<main><div class="box">x</div></main>"#);
    Ok(())
}

#[test]
fn checked_mirrors_into_live_property() -> VmResult<()> {
    let (mut cl, input) = mounted("input")?;

    let mut b = ChangeListBuilder::new();
    b.set_attribute("checked", "")?.set_attribute("selected", "")?.set_attribute("value", "42")?;
    apply(&mut cl, b)?;
    assert!(cl.host().checked(input));
    assert!(cl.host().selected(input));
    assert_eq!(cl.host().value(input), Some("42"));

    // ids déjà connus de l'interpréteur : 0 = "checked", 3 = "value"
    let mut b = ChangeListBuilder::new();
    b.op(Op::RemoveAttribute { name: 0 }).op(Op::RemoveAttribute { name: 3 });
    apply(&mut cl, b)?;
    assert!(!cl.host().checked(input));
    assert!(cl.host().selected(input));
    assert_eq!(cl.host().value(input), None);
    assert_eq!(cl.host().attribute(input, "checked"), None);
    Ok(())
}

#[test]
fn listener_handles_follow_updates() -> VmResult<()> {
    let (mut cl, button) = mounted("button")?;
    let calls = record(&mut cl)?;

    let mut b = ChangeListBuilder::new();
    b.new_event_listener("click", 1, 2)?;
    apply(&mut cl, b)?;
    assert_eq!(cl.host().dispatch_event(&button, "click")?, 1);

    let mut b = ChangeListBuilder::new();
    b.update_event_listener("click", 5, 6)?;
    apply(&mut cl, b)?;
    cl.host().dispatch_event(&button, "click")?;
    assert_eq!(cl.listener(&button, "click").map(|l| l.handles()), Some((5, 6)));

    let mut b = ChangeListBuilder::new();
    b.remove_event_listener("click")?;
    apply(&mut cl, b)?;
    assert_eq!(cl.host().dispatch_event(&button, "click")?, 0);
    assert_eq!(cl.listener_count(), 0);

    assert_eq!(*calls.borrow(), vec![("click".to_owned(), 1, 2), ("click".to_owned(), 5, 6)]);
    Ok(())
}

#[test]
fn trampoline_installed_late_still_reaches_listeners() -> VmResult<()> {
    let (mut cl, button) = mounted("button")?;
    let mut b = ChangeListBuilder::new();
    b.new_event_listener("input", 7, 8)?;
    apply(&mut cl, b)?;

    assert_eq!(cl.host().dispatch_event(&button, "input"), Err(Error::NoTrampoline));
    let calls = record(&mut cl)?;
    cl.host().dispatch_event(&button, "input")?;
    assert_eq!(*calls.borrow(), vec![("input".to_owned(), 7, 8)]);
    Ok(())
}

#[test]
fn update_without_listener_is_fatal() -> VmResult<()> {
    let (mut cl, _) = mounted("button")?;
    let mut b = ChangeListBuilder::new();
    b.update_event_listener("click", 1, 1)?;
    assert_eq!(apply(&mut cl, b), Err(Error::MissingListener { event_type: "click".into() }));
    assert_eq!(cl.stack_depth(), 0);
    Ok(())
}

#[test]
fn unmount_is_terminal() -> VmResult<()> {
    let (mut cl, button) = mounted("button")?;
    let calls = record(&mut cl)?;
    let mut b = ChangeListBuilder::new();
    b.new_event_listener("click", 1, 2)?;
    apply(&mut cl, b)?;
    let stale = cl.listener(&button, "click").expect("listener");

    cl.unmount()?;
    assert!(!cl.is_mounted());
    assert_eq!(cl.host().handler_count(button), 0);

    assert_eq!(cl.add_change_list_range(0, 4), Err(Error::Unmounted));
    assert_eq!(cl.apply_changes(&[0; 4]), Err(Error::Unmounted));
    assert_eq!(cl.add_string("x", 1), Err(Error::Unmounted));
    assert_eq!(cl.get_string(0), Err(Error::Unmounted));
    assert_eq!(cl.init_events_trampoline(|_: &MemEvent, _, _| {}), Err(Error::Unmounted));
    assert_eq!(cl.unmount(), Err(Error::Unmounted));

    let event = MemEvent::new("click", cl.host().node_key(&button));
    assert_eq!(stale.fire(&event), Err(Error::ListenerRevoked { event_type: "click".into() }));
    assert!(calls.borrow().is_empty());
    Ok(())
}

#[test]
fn unknown_opcode_stops_everything() -> VmResult<()> {
    let (mut cl, seed) = mounted("ul")?;

    let mut b = ChangeListBuilder::new();
    b.create_text_node("a").append_child();
    let bad_at = 16;
    b.raw_word(99).create_text_node("b").append_child();
    let out = b.finish();

    cl.add_change_list_range(out.start, out.len)?;
    // une seconde plage valide, jamais atteinte
    cl.add_change_list_range(out.start, 16)?;
    let err = cl.apply_changes(&out.buffer);

    assert_eq!(err, Err(Error::Decode(DecodeError::UnknownOp { op: 99, at: u64::from(out.start) + bad_at })));
    assert_eq!(cl.host().text_content(seed), "a");
    assert_eq!(cl.stack_depth(), 0);
    assert_eq!(cl.pending_ranges(), 0);
    Ok(())
}

#[test]
fn malformed_ranges_are_decode_errors() -> VmResult<()> {
    let (mut cl, _) = mounted("p")?;
    let buf = [0u8; 16];

    cl.add_change_list_range(2, 4)?;
    assert_eq!(cl.apply_changes(&buf), Err(Error::Decode(DecodeError::Misaligned { start: 2, len: 4 })));

    cl.add_change_list_range(8, 16)?;
    assert!(matches!(cl.apply_changes(&buf), Err(Error::Decode(DecodeError::OutOfBounds { .. }))));

    // SetText dont le texte déborde du buffer
    let mut b = ChangeListBuilder::new();
    b.op(Op::SetText { ptr: 1000, len: 4 });
    assert!(matches!(apply(&mut cl, b), Err(Error::Decode(DecodeError::OutOfBounds { ptr: 1000, .. }))));
    Ok(())
}

#[test]
fn strings_primed_out_of_band() -> VmResult<()> {
    let (mut cl, seed) = mounted("div")?;
    cl.add_string("em", 40)?;
    assert_eq!(cl.get_string(40)?, "em");

    let mut b = ChangeListBuilder::new();
    b.op(Op::CreateElement { tag: 40 }).append_child();
    apply(&mut cl, b)?;
    assert_eq!(cl.host().serialize(seed), "<div><em></em></div>");
    assert_eq!(cl.get_string(41), Err(Error::MissingString { id: 41 }));
    Ok(())
}

#[test]
fn reassigned_string_id_keeps_tags_right() -> VmResult<()> {
    let (mut cl, seed) = mounted("div")?;
    let mut b = ChangeListBuilder::new();
    b.create_element("p")?.append_child();
    b.add_string("span", 0);
    b.create_element("p")?.append_child();
    apply(&mut cl, b)?;
    assert_eq!(cl.host().serialize(seed), "<div><p></p><p></p></div>");
    assert_eq!(cl.get_string(0)?, "span");
    Ok(())
}

/* ─────────────── Flux équilibrés aléatoires ─────────────── */

#[derive(Debug, Clone)]
enum Block {
    Elem(String, Vec<Block>),
    Text(String),
    Attr(String, String),
    Visit,
}

fn block() -> impl Strategy<Value = Block> {
    let leaf = prop_oneof![
        "[a-z ]{0,8}".prop_map(Block::Text),
        ("[a-z]{1,6}", "[a-z0-9]{0,6}").prop_map(|(n, v)| Block::Attr(n, v)),
        Just(Block::Visit),
    ];
    leaf.prop_recursive(4, 32, 4, |inner| {
        ("[a-z]{1,6}", prop::collection::vec(inner, 0..4)).prop_map(|(tag, kids)| Block::Elem(tag, kids))
    })
}

fn emit(b: &mut ChangeListBuilder, block: &Block) -> Result<(), DecodeError> {
    match block {
        Block::Elem(tag, kids) => {
            b.create_element(tag)?;
            for k in kids {
                emit(b, k)?;
            }
            b.append_child();
        }
        Block::Text(t) => {
            b.create_text_node(t).append_child();
        }
        Block::Attr(n, v) => {
            b.set_attribute(n, v)?;
        }
        Block::Visit => {
            b.push_first_child().pop();
        }
    }
    Ok(())
}

proptest! {
    #[test]
    fn balanced_streams_leave_an_empty_stack(blocks in prop::collection::vec(block(), 0..8)) {
        let (mut cl, seed) = mounted("div").map_err(|e| TestCaseError::fail(e.to_string()))?;
        let mut b = ChangeListBuilder::new();
        for blk in &blocks {
            emit(&mut b, blk).map_err(|e| TestCaseError::fail(e.to_string()))?;
        }
        let out = b.finish();

        cl.add_change_list_range(out.start, out.len).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(cl.apply_changes(&out.buffer), Ok(()));
        prop_assert_eq!(cl.stack_depth(), 0);

        let appended = blocks.iter().filter(|b| matches!(b, Block::Elem(..) | Block::Text(_))).count();
        prop_assert_eq!(cl.host().children(seed).len(), appended);
    }
}
