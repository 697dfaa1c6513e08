use super::ChainSpec;
use crate::primitives::Slot;

/// Availability window expressed in epochs, as configured by the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaWindow {
    slots_per_epoch: u64,
    min_epochs_for_blob_sidecars_requests: u64,
}

impl DaWindow {
    /// Mainnet-style parameters: 32 slots per epoch, 4096 epochs of blobs.
    pub const MAINNET: DaWindow = DaWindow {
        slots_per_epoch: 32,
        min_epochs_for_blob_sidecars_requests: 4096,
    };

    /// `slots_per_epoch` of zero is treated as one.
    pub fn new(slots_per_epoch: u64, min_epochs_for_blob_sidecars_requests: u64) -> Self {
        Self {
            slots_per_epoch: slots_per_epoch.max(1),
            min_epochs_for_blob_sidecars_requests,
        }
    }

    pub fn epoch(&self, slot: Slot) -> u64 {
        slot / self.slots_per_epoch
    }
}

impl ChainSpec for DaWindow {
    fn within_da_period(&self, block: Slot, current: Slot) -> bool {
        self.epoch(block)
            .saturating_add(self.min_epochs_for_blob_sidecars_requests)
            >= self.epoch(current)
    }
}
