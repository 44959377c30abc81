#![forbid(unsafe_code)]

pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod export;
pub mod extract;
pub mod fetch;
pub mod formats;
pub mod harvest;
pub mod logging;
pub mod normalize;
pub mod pagination;
pub mod run;
pub mod session;
pub mod summary;
