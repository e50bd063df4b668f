//! Case files, defaults and the merge of both with the command line.

pub mod builder;
pub mod defaults;
pub mod file;
pub mod models;
