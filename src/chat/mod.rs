//! Chat relay pipeline: classify server log lines, queue them, and deliver
//! them in pages.

mod classifier;
mod paginate;
mod queue;
mod reader;
mod sender;

pub use classifier::*;
pub use paginate::*;
pub use queue::*;
pub use reader::*;
pub use sender::*;
