//! Usage-driven secondary indexing.
//!
//! Indexes are never declared by callers. The [`IndexAdvisor`] watches
//! which fields queries filter and sort on; once a safe field is seen it
//! is materialized through the [`IndexEngine`] and maintained on every
//! mutation from then on.
//!
//! # Invariants
//!
//! - Index materialization is idempotent
//! - Index state is derivable from the stored documents
//! - Index failures never fail the originating request

mod advisor;
mod engine;
mod field;

pub use advisor::{is_safe_identifier, IndexAdvisor};
pub use engine::IndexEngine;
pub use field::{encode_index_value, FieldIndex};
