//! Compatibility primitives shared by the sequencer and the similarity search.
//! Each scorer applies them on its own scale.

pub mod energy;
pub mod key;
pub mod tempo;
