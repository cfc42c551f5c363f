//! Unique identifier generation.
//!
//! - [`IdGenerator`]: local snowflake IDs, no coordination
//! - [`StoreSequence`]: dense counters shared through an [`AtomicStore`](crate::AtomicStore)

mod sequence;
mod snowflake;

pub use sequence::StoreSequence;
pub use snowflake::{
    decompose_with_epoch, IdGenerator, IdGeneratorConfig, IdParts, DEFAULT_EPOCH_MS,
    MACHINE_ID_BITS, MAX_MACHINE_ID, MAX_SEQUENCE, SEQUENCE_BITS, TIMESTAMP_BITS,
};
