//! Pile d'exécution : références de nœuds, LIFO, vidée à chaque application.
//!
//! Un slot peut être vide : `PushFirstChild` et `PopPushNextSibling` empilent
//! ce qu'ils trouvent, y compris rien. Seules les instructions qui ont besoin
//! d'un nœud échouent dessus (`AbsentNode`).

use changelist_core::OpCode;
use smallvec::SmallVec;

use crate::error::{Error, VmResult};

/// Pile LIFO de nœuds (éventuellement absents).
#[derive(Debug, Clone)]
pub struct ExecStack<N> {
    slots: SmallVec<[Option<N>; 16]>,
    limit: Option<usize>,
}

impl<N> Default for ExecStack<N> {
    fn default() -> Self { Self { slots: SmallVec::new(), limit: None } }
}

impl<N> ExecStack<N> {
    /// Pile vide, sans limite.
    pub fn new() -> Self { Self::default() }

    /// Pile vide bornée à `limit` slots.
    pub fn with_limit(limit: Option<usize>) -> Self { Self { slots: SmallVec::new(), limit } }

    /// Profondeur courante.
    pub fn depth(&self) -> usize { self.slots.len() }
    /// Vrai si vide.
    pub fn is_empty(&self) -> bool { self.slots.is_empty() }
    /// Vide la pile.
    pub fn clear(&mut self) { self.slots.clear(); }

    /// Empile un slot (nœud ou absence).
    pub fn push(&mut self, node: Option<N>) -> VmResult<()> {
        if let Some(limit) = self.limit {
            if self.slots.len() >= limit {
                return Err(Error::StackOverflow { limit });
            }
        }
        self.slots.push(node);
        Ok(())
    }

    /// Dépile un slot, absent ou non.
    pub fn pop(&mut self, op: OpCode) -> VmResult<Option<N>> { self.slots.pop().ok_or(Error::StackUnderflow { op }) }

    /// Dépile un nœud présent.
    pub fn pop_node(&mut self, op: OpCode) -> VmResult<N> { self.pop(op)?.ok_or(Error::AbsentNode { op }) }

    /// Consulte le sommet sans dépiler.
    pub fn top(&self, op: OpCode) -> VmResult<Option<&N>> {
        self.slots.last().map(Option::as_ref).ok_or(Error::StackUnderflow { op })
    }

    /// Consulte le nœud au sommet (doit être présent).
    pub fn top_node(&self, op: OpCode) -> VmResult<&N> { self.top(op)?.ok_or(Error::AbsentNode { op }) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifo_order() -> VmResult<()> {
        let mut s = ExecStack::new();
        s.push(Some(1))?;
        s.push(Some(2))?;
        assert_eq!(s.top_node(OpCode::Pop)?, &2);
        assert_eq!(s.pop_node(OpCode::Pop)?, 2);
        assert_eq!(s.pop_node(OpCode::Pop)?, 1);
        assert!(s.is_empty());
        Ok(())
    }

    #[test]
    fn underflow_and_absent() -> VmResult<()> {
        let mut s: ExecStack<u32> = ExecStack::new();
        assert_eq!(s.pop(OpCode::Pop), Err(Error::StackUnderflow { op: OpCode::Pop }));
        assert_eq!(
            s.top_node(OpCode::SetText).map(|_| ()),
            Err(Error::StackUnderflow { op: OpCode::SetText })
        );

        s.push(None)?;
        assert_eq!(
            s.top_node(OpCode::PushFirstChild).map(|_| ()),
            Err(Error::AbsentNode { op: OpCode::PushFirstChild })
        );
        // `Pop` tolère un slot vide
        assert_eq!(s.pop(OpCode::Pop), Ok(None));
        Ok(())
    }

    #[test]
    fn limit_is_enforced() -> VmResult<()> {
        let mut s = ExecStack::with_limit(Some(2));
        s.push(Some('a'))?;
        s.push(None)?;
        assert_eq!(s.push(Some('b')), Err(Error::StackOverflow { limit: 2 }));
        assert_eq!(s.depth(), 2);
        Ok(())
    }
}
