//! Outer adapters. The CSV replay is the only one shipped with the crate.

pub mod csv;
