//! change_list.rs — Contrôleur : file de plages, application, cycle de vie
//!
//! Protocole côté producteur :
//! 1. écrire les instructions dans son buffer,
//! 2. `add_change_list_range(start, len)` (une ou plusieurs fois),
//! 3. `apply_changes(buffer)` : toutes les plages, dans l'ordre (FIFO).
//!
//! Après `unmount()`, toute opération publique renvoie [`Error::Unmounted`].

use std::collections::VecDeque;
use std::rc::Rc;

use changelist_core::StringId;
use tracing::{debug, error};

use crate::config::VmConfig;
use crate::error::{Error, VmResult};
use crate::host::Host;
use crate::interp::Machine;
use crate::listener::{Listener, ListenerRegistry};
use crate::stack::ExecStack;
use crate::strings::StringTable;

/// État du contrôleur.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Utilisable.
    Active,
    /// Terminal.
    Unmounted,
}

/// Interpréteur de change-lists lié à un conteneur.
pub struct ChangeList<H: Host> {
    host: H,
    root: H::Node,
    ranges: VecDeque<(u32, u32)>,
    stack: ExecStack<H::Node>,
    strings: StringTable,
    listeners: ListenerRegistry<H>,
    config: VmConfig,
    state: Lifecycle,
}

impl<H: Host> ChangeList<H> {
    /// Interpréteur sur `root`, configuration par défaut.
    pub fn new(host: H, root: H::Node) -> Self { Self::with_config(host, root, VmConfig::default()) }

    /// Interpréteur sur `root` avec `config`.
    pub fn with_config(host: H, root: H::Node, config: VmConfig) -> Self {
        Self {
            host,
            root,
            ranges: VecDeque::new(),
            stack: ExecStack::with_limit(config.max_stack_depth),
            strings: StringTable::new(),
            listeners: ListenerRegistry::new(),
            config,
            state: Lifecycle::Active,
        }
    }

    #[inline]
    fn ensure_active(&self) -> VmResult<()> {
        match self.state {
            Lifecycle::Active => Ok(()),
            Lifecycle::Unmounted => Err(Error::Unmounted),
        }
    }

    /// Met une plage d'instructions en file. Rien n'est exécuté.
    pub fn add_change_list_range(&mut self, start: u32, len: u32) -> VmResult<()> {
        self.ensure_active()?;
        self.ranges.push_back((start, len));
        Ok(())
    }

    /// Exécute toutes les plages en file sur `mem`, puis vide file et pile.
    ///
    /// Sans plage en file : ne fait rien. En cas d'erreur, les instructions
    /// restantes sont abandonnées, sans retour arrière : l'arbre peut être
    /// partiellement modifié et doit être reconstruit par l'appelant.
    pub fn apply_changes(&mut self, mem: &[u8]) -> VmResult<()> {
        self.ensure_active()?;
        if self.ranges.is_empty() {
            return Ok(());
        }
        let ranges = self.ranges.len();
        let result = self.run(mem);
        self.ranges.clear();
        self.stack.clear();
        match result {
            Ok(executed) => {
                debug!(ranges, executed, "change-list appliquée");
                Ok(())
            }
            Err(e) => {
                error!(ranges, error = %e, "application interrompue");
                Err(e)
            }
        }
    }

    fn run(&mut self, mem: &[u8]) -> VmResult<usize> {
        let seed = self.host.root_seed(&self.root);
        self.stack.push(seed)?;

        let mut machine = Machine {
            host: &mut self.host,
            stack: &mut self.stack,
            strings: &mut self.strings,
            listeners: &mut self.listeners,
            trace_ops: self.config.trace_ops,
        };
        let mut executed = 0;
        for &(start, len) in &self.ranges {
            executed += machine.run_range(mem, start, len)?;
        }

        // le slot de départ peut rester ; rien d'autre
        let depth = self.stack.depth();
        if self.config.strict_stack && depth > 1 {
            return Err(Error::UnbalancedStack { depth });
        }
        Ok(executed)
    }

    /// Enregistre `text` sous `id` (hors flux).
    pub fn add_string(&mut self, text: &str, id: StringId) -> VmResult<()> {
        self.ensure_active()?;
        self.strings.add(text, id);
        Ok(())
    }

    /// Texte enregistré sous `id`.
    pub fn get_string(&self, id: StringId) -> VmResult<&str> {
        self.ensure_active()?;
        self.strings.get(id)
    }

    /// Installe le trampoline `fn(event, a, b)` ; vaut pour tous les listeners,
    /// existants comme futurs.
    pub fn init_events_trampoline<F>(&mut self, trampoline: F) -> VmResult<()>
    where
        F: Fn(&H::Event, u32, u32) + 'static,
    {
        self.ensure_active()?;
        self.listeners.trampoline().install(Rc::new(trampoline));
        Ok(())
    }

    /// Démonte : détache et révoque tous les listeners, libère tout l'état.
    /// Irréversible.
    pub fn unmount(&mut self) -> VmResult<()> {
        self.ensure_active()?;
        self.state = Lifecycle::Unmounted;
        let listeners = self.listeners.len();
        let detached = self.listeners.teardown(&mut self.host);
        self.ranges.clear();
        self.stack.clear();
        self.strings.clear();
        debug!(listeners, "change-list démontée");
        detached
    }

    /* ─────────────── Accès ─────────────── */

    /// Document hôte.
    pub fn host(&self) -> &H { &self.host }
    /// Document hôte (mutable).
    pub fn host_mut(&mut self) -> &mut H { &mut self.host }
    /// Conteneur racine.
    pub fn root(&self) -> &H::Node { &self.root }
    /// État courant.
    pub fn lifecycle(&self) -> Lifecycle { self.state }
    /// Vrai tant que `unmount` n'a pas été appelé.
    pub fn is_mounted(&self) -> bool { self.state == Lifecycle::Active }
    /// Plages en attente.
    pub fn pending_ranges(&self) -> usize { self.ranges.len() }
    /// Profondeur de la pile d'exécution (0 hors application).
    pub fn stack_depth(&self) -> usize { self.stack.depth() }
    /// Nombre d'entrées de la table de chaînes.
    pub fn string_count(&self) -> usize { self.strings.len() }
    /// Configuration.
    pub fn config(&self) -> &VmConfig { &self.config }
    /// Nombre de listeners vivants.
    pub fn listener_count(&self) -> usize { self.listeners.len() }

    /// Listener vivant pour `(node, event_type)`.
    pub fn listener(&self, node: &H::Node, event_type: &str) -> Option<Rc<Listener<H::Event>>> {
        self.listeners.get(self.host.node_key(node), event_type)
    }
}
