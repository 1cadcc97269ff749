//! # SciTag
//!
//! Sequence labeling and text classification toolkit for scientific text.
//! This crate re-exports [`scitag_core`]; see its documentation for the
//! pipeline stages.

pub use scitag_core::*;
