//! Core (`v1`) group resource kinds

pub mod endpoints;

pub use endpoints::*;
