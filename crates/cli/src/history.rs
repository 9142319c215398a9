//! Snapshot/undo storage (spec §1 "snapshot/undo storage", out of core scope).
//!
//! A stack of [`SimSnapshot`]s taken between ticks, the external counterpart
//! to `Simulator::snapshot`/`restore`. `specsim-core` only promises those two
//! pure, owned-state operations; keeping a history of them, and the
//! undo/redo bookkeeping around it, is a CLI concern.

use specsim_core::sim::SimSnapshot;
use specsim_core::Simulator;

/// An undo stack of simulator snapshots, taken one per tick.
#[derive(Default)]
pub struct History {
    past: Vec<SimSnapshot>,
}

impl History {
    /// An empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `sim`'s current state, to be restored by a later `undo`.
    pub fn record(&mut self, sim: &Simulator) {
        self.past.push(sim.snapshot());
    }

    /// Pops the most recent recorded state and restores it into `sim`.
    /// Returns `false` (leaving `sim` untouched) if the history is empty.
    pub fn undo(&mut self, sim: &mut Simulator) -> bool {
        match self.past.pop() {
            Some(snapshot) => {
                sim.restore(&snapshot);
                true
            }
            None => false,
        }
    }

    /// How many steps can currently be undone.
    #[must_use]
    pub fn len(&self) -> usize {
        self.past.len()
    }

    /// Whether there is nothing to undo.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.past.is_empty()
    }
}
