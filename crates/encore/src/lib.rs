#![doc = include_str!("../README.md")]

mod assets;
pub mod config;
mod date;
pub mod gigs;
mod minify;
pub mod render;
mod serve;
mod site;
mod storage;
mod style;
mod watch;

pub use assets::*;
pub use config::*;
pub use serve::*;
pub use site::*;
pub use storage::*;
pub use style::*;
pub use watch::*;
