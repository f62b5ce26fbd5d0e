pub mod cache;
pub mod cli;
pub mod compare;
pub mod config;
pub mod error;
pub mod manage;
pub mod model;
pub mod repos;
pub mod setcmd;
pub mod show;
pub mod stats;
pub mod top;

pub use error::{Error, Result};
