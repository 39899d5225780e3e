pub mod catalog;
pub mod pos;
pub mod sync;
pub mod webhook;
