#![no_std]
extern crate alloc;

pub mod replay;

pub use replay::{ReplayVerdict, ReplayWindow};
