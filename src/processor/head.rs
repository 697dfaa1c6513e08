//! Chain head tracking shared between the block-processing path and the
//! background fetch loop.

use crate::primitives::Slot;
use std::sync::atomic::{AtomicU64, Ordering};

/// Latest head slot reported by the block-finalization path.
///
/// Zero means "not reported yet"; the value is not persisted, so it starts at
/// zero after every restart and window eviction stays off until the first
/// update.
#[derive(Debug, Default)]
pub struct HeadSlot {
    value: AtomicU64,
}

impl HeadSlot {
    pub fn update(&self, slot: Slot) {
        self.value.store(slot, Ordering::SeqCst);
    }

    pub fn current(&self) -> Slot {
        self.value.load(Ordering::SeqCst)
    }
}
