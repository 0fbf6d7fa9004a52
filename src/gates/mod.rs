//! Anti-flicker gates: cheap, pure decisions the pipeline consults before
//! and after dispatching a translation.

pub mod change_gate;
pub mod sentence_gate;
pub mod stability_gate;
