//! Line-oriented front end for Parley.
//!
//! Reads commands from stdin and prints snapshot changes to stdout. All sync
//! logic lives in [`parley_app::Runtime`]; this crate only parses input and
//! renders output.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod commands;
pub mod render;

pub use commands::{HELP, Input, InputError, parse};
pub use render::{Printer, conversation_list};
