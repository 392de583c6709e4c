#[cfg(test)]
mod test;

pub mod builtin;
pub mod cache;
pub mod checker;
pub mod diagnostics;
pub mod driver;
pub mod error;
pub mod etc;
pub mod genscript;
pub mod matcher;
pub mod materializer;
pub mod package;
pub mod pio;
pub mod runner;
pub mod sandbox;
pub mod steps;
pub mod stress;
pub mod testcase;
pub mod walker;

pub use crate::etc::CONFIG;

#[macro_use]
extern crate lazy_static;
extern crate log;
