#![allow(clippy::module_name_repetitions)]

pub mod analysis;
pub(crate) mod api;
pub mod app;
pub mod classification;
pub mod cli;
pub mod clients;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod evaluation;
pub mod observability;
pub mod pipeline;
pub mod schema;
pub mod store;
pub(crate) mod util;
