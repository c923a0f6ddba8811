//! Structural assembly of a music score representation.
//!
//! Source events come in document order and are folded into a tree of
//! parts, staves, voices, measures and notes, where every element knows
//! its exact position in its measure and in its voice.
//!
//! Entry points are [`dom::ScoreBuilder`] for whole documents, and the
//! methods of [`dom::Score`] for driving the assembly by hand.

pub mod config;
pub mod dom;
pub mod errors;
pub mod notation;
pub mod primitives;
