//! Server process supervision: launching, console commands, shutdown.

mod process;
mod supervisor;

pub use process::*;
pub use supervisor::*;
