use super::header::{BeaconBlockHeader, KzgCommitment};
use std::fmt;

/// 48-byte KZG opening proof.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct KzgProof(pub [u8; 48]);

impl Default for KzgProof {
    fn default() -> Self {
        Self([0u8; 48])
    }
}

impl fmt::Debug for KzgProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// One blob plus the material needed to check it against a block's
/// commitments.
#[derive(Clone, PartialEq, Eq)]
pub struct BlobSidecar {
    pub index: u64,
    pub blob: Vec<u8>,
    pub kzg_commitment: KzgCommitment,
    pub kzg_proof: KzgProof,
    pub block_header: BeaconBlockHeader,
}

impl BlobSidecar {
    pub fn slot(&self) -> u64 {
        self.block_header.slot
    }
}

impl fmt::Debug for BlobSidecar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobSidecar")
            .field("index", &self.index)
            .field("slot", &self.block_header.slot)
            .field("blob_len", &self.blob.len())
            .field("kzg_commitment", &self.kzg_commitment)
            .finish()
    }
}

pub type BlobSidecars = Vec<BlobSidecar>;
