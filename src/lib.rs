// License: MIT

pub mod cli;
pub mod layout;
pub mod logging;
pub mod shell;
pub mod warning;
