pub mod common;
pub mod entry;
pub mod journal;
pub mod remote;
pub mod sync;
