//! Background processing: the fetch-and-verify executor, shared head-slot
//! state, run lifecycle, and the `BlobFetcher` orchestrator tying them to the
//! durable queue.

pub mod executor;
pub mod fetcher;
pub mod head;
pub(crate) mod lifecycle;
