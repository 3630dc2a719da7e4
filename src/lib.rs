#![forbid(unsafe_code)]

pub mod bookmap;
pub mod cli;
pub mod collection;
pub mod copy;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod migrate;
pub mod model;
pub mod operator;
pub mod service;
pub mod settings;

pub use error::{Error, Result};
