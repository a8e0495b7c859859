//! Deterministic structured artifacts derived from agent outputs and debate
//! transcripts: the evidence pack, memory snapshot, and report renderer.

pub mod evidence;
pub mod memory_snapshot;
pub mod report;

pub use evidence::build_evidence_pack;
pub use memory_snapshot::build_memory_snapshot;
pub use report::render_html;
