//! Core trait abstractions for the search pipeline.
//!
//! These traits define the seams between the strategy chain and the
//! concrete ways of getting ruling listings out of the archive.

pub mod strategy;
