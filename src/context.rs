//! Per-plane context state
//!
//! Each plane of a slice carries one adaptive state record per context
//! number. The record type depends on the entropy backend chosen for the
//! stream: 32 probability cells for the range coder, or one [`RiceState`]
//! for Golomb-Rice mode. State is reset before every frame and adapts
//! freely within a slice.

use crate::golomb::RiceState;
use crate::rangecoder::CONTEXT_SIZE;

/// Planes a stream can carry: luma or green, two chroma, alpha.
pub const MAX_PLANES: usize = 4;

/// Neutral probability for a freshly reset range coder cell.
pub const NEUTRAL_STATE: u8 = 128;

/// Context table for one plane, in one of the two backend representations.
#[derive(Debug)]
pub enum ContextTable {
    Range(Vec<[u8; CONTEXT_SIZE]>),
    Rice(Vec<RiceState>),
}

/// Per-plane context state plus the quant table it is indexed by.
#[derive(Debug)]
pub struct PlaneContext {
    pub quant_table_index: usize,
    context_count: usize,
    pub table: ContextTable,
}

impl PlaneContext {
    /// Allocate a range coder context table. Contents are neutral until
    /// [`Self::clear`] runs, which happens before the first frame anyway.
    pub fn new_range(quant_table_index: usize, context_count: usize) -> Self {
        Self {
            quant_table_index,
            context_count,
            table: ContextTable::Range(vec![[NEUTRAL_STATE; CONTEXT_SIZE]; context_count]),
        }
    }

    /// Allocate a Golomb-Rice context table.
    pub fn new_rice(quant_table_index: usize, context_count: usize) -> Self {
        Self {
            quant_table_index,
            context_count,
            table: ContextTable::Rice(vec![RiceState::default(); context_count]),
        }
    }

    pub fn context_count(&self) -> usize {
        self.context_count
    }

    /// Range coder states, if this plane uses the range backend.
    pub fn range_states(&mut self) -> Option<&mut [[u8; CONTEXT_SIZE]]> {
        match &mut self.table {
            ContextTable::Range(states) => Some(states),
            ContextTable::Rice(_) => None,
        }
    }

    /// Rice states, if this plane uses the Golomb-Rice backend.
    pub fn rice_states(&mut self) -> Option<&mut [RiceState]> {
        match &mut self.table {
            ContextTable::Rice(states) => Some(states),
            ContextTable::Range(_) => None,
        }
    }

    /// Reset all contexts for a new frame.
    ///
    /// Range mode copies the per-quant-table initial state template when
    /// one is configured, otherwise fills with the neutral value. Rice
    /// mode always resets to the standard initial state.
    pub fn clear(&mut self, initial_states: Option<&[[u8; CONTEXT_SIZE]]>) {
        match &mut self.table {
            ContextTable::Range(states) => match initial_states {
                Some(template) => {
                    debug_assert_eq!(template.len(), states.len());
                    states.copy_from_slice(template);
                }
                None => {
                    for s in states.iter_mut() {
                        s.fill(NEUTRAL_STATE);
                    }
                }
            },
            ContextTable::Rice(states) => {
                for s in states.iter_mut() {
                    *s = RiceState::default();
                }
            }
        }
    }
}

/// Build the default initial state template for one quant table: every
/// cell at the neutral midpoint. Stream headers may override individual
/// entries for faster convergence.
pub fn neutral_initial_states(context_count: usize) -> Vec<[u8; CONTEXT_SIZE]> {
    vec![[NEUTRAL_STATE; CONTEXT_SIZE]; context_count]
}
