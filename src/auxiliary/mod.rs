//! Helper items describing crystals and bridging numerical libraries.

pub mod geometry;
pub(crate) mod misc;
pub mod structure;
#[cfg(test)]
pub(crate) mod template_structures;
