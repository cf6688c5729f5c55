//! Estimates the width of bridges and other obstacles on German roads by
//! matching OpenStreetMap ways against the BASt bridge statistics, then
//! filling gaps with tag heuristics and a learned regressor.

pub mod config;
pub mod error;
pub mod estimate;
pub mod fetch;
pub mod io;
pub mod learned;
pub mod matcher;
pub mod model;
pub mod parsers;
pub mod pipeline;
