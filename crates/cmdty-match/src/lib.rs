//! Monthly return normalization and one-to-one matching of unlabeled
//! commodity index series against labeled reference factors.
//!
//! Data flows strictly forward: [`returns`] → [`alignment`] → [`similarity`]
//! → [`matcher`] → [`panel`], driven end to end by [`pipeline`].

pub mod alignment;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod io;
pub mod matcher;
pub mod panel;
pub mod parallel;
pub mod pipeline;
pub mod report;
pub mod returns;
pub mod series;
pub mod similarity;
