//! Réglages de l'interpréteur.
//!
//! Variables d'environnement reconnues par [`VmConfig::from_env`] :
//! - `CHANGELIST_STRICT_STACK`   (0/1, défaut 1)
//! - `CHANGELIST_TRACE_OPS`      (0/1, défaut 0)
//! - `CHANGELIST_MAX_STACK_DEPTH` (entier, 0 = illimité)

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration d'un [`crate::ChangeList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct VmConfig {
    /// Pile non vidée en fin d'application ⇒ `UnbalancedStack`.
    pub strict_stack: bool,
    /// Un événement `trace!` par instruction décodée.
    pub trace_ops: bool,
    /// Profondeur maximale de la pile d'exécution.
    pub max_stack_depth: Option<usize>,
}

impl Default for VmConfig {
    fn default() -> Self { Self { strict_stack: true, trace_ops: false, max_stack_depth: None } }
}

impl VmConfig {
    /// Lit la configuration depuis l'environnement (valeurs par défaut sinon).
    pub fn from_env() -> Self {
        let d = Self::default();
        let depth = env_usize("CHANGELIST_MAX_STACK_DEPTH", 0);
        Self {
            strict_stack: env_bool("CHANGELIST_STRICT_STACK", d.strict_stack),
            trace_ops: env_bool("CHANGELIST_TRACE_OPS", d.trace_ops),
            max_stack_depth: (depth > 0).then_some(depth),
        }
    }

    /// Active/désactive le contrôle d'équilibre de pile.
    pub fn strict_stack(mut self, on: bool) -> Self {
        self.strict_stack = on;
        self
    }

    /// Active/désactive la trace par instruction.
    pub fn trace_ops(mut self, on: bool) -> Self {
        self.trace_ops = on;
        self
    }

    /// Borne la profondeur de pile.
    pub fn max_stack_depth(mut self, limit: Option<usize>) -> Self {
        self.max_stack_depth = limit;
        self
    }
}

fn env_usize(k: &str, d: usize) -> usize { std::env::var(k).ok().and_then(|s| s.parse().ok()).unwrap_or(d) }

fn env_bool(k: &str, d: bool) -> bool {
    std::env::var(k).ok().and_then(|s| s.parse::<u8>().ok()).map(|v| v != 0).unwrap_or(d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = VmConfig::default();
        assert!(c.strict_stack);
        assert!(!c.trace_ops);
        assert_eq!(c.max_stack_depth, None);
    }

    #[test]
    fn builder_style() {
        let c = VmConfig::default().strict_stack(false).trace_ops(true).max_stack_depth(Some(8));
        assert_eq!(c, VmConfig { strict_stack: false, trace_ops: true, max_stack_depth: Some(8) });
    }

    #[cfg(feature = "serde")]
    #[test]
    fn partial_json_uses_defaults() {
        let c: VmConfig = serde_json::from_str(r#"{"trace_ops":true}"#).unwrap();
        assert_eq!(c, VmConfig { trace_ops: true, ..VmConfig::default() });
    }
}
