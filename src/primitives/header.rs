use super::{hex_bytes, hex_quantity};
use super::Slot;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 32-byte SSZ hash tree root.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Root(#[serde(with = "hex_bytes")] pub [u8; 32]);

impl fmt::Debug for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// 48-byte KZG commitment to a single blob.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KzgCommitment(#[serde(with = "hex_bytes")] pub [u8; 48]);

impl Default for KzgCommitment {
    fn default() -> Self {
        Self([0u8; 48])
    }
}

impl fmt::Debug for KzgCommitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Beacon block header, enough to re-derive the slot and to hand to the
/// sidecar verifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconBlockHeader {
    #[serde(with = "hex_quantity")]
    pub slot: Slot,
    #[serde(with = "hex_quantity")]
    pub proposer_index: u64,
    pub parent_block_root: Root,
    pub state_root: Root,
    pub body_root: Root,
}

impl BeaconBlockHeader {
    pub fn new(slot: Slot) -> Self {
        Self {
            slot,
            ..Self::default()
        }
    }
}

/// Accepted beacon block as seen by the fetch pipeline: its header plus the
/// blob commitments carried in the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeaconBlock {
    header: BeaconBlockHeader,
    blob_kzg_commitments: Vec<KzgCommitment>,
}

impl BeaconBlock {
    pub fn new(header: BeaconBlockHeader, blob_kzg_commitments: Vec<KzgCommitment>) -> Self {
        Self {
            header,
            blob_kzg_commitments,
        }
    }

    pub fn slot(&self) -> Slot {
        self.header.slot
    }

    pub fn header(&self) -> &BeaconBlockHeader {
        &self.header
    }

    pub fn blob_kzg_commitments(&self) -> &[KzgCommitment] {
        &self.blob_kzg_commitments
    }
}
