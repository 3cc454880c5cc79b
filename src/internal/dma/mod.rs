//! SLC DMA engines
//!
//! The SLC peripheral walks two descriptor chains, one per direction. Each
//! direction gets its own engine built on the shared descriptor type:
//!
//! - [`SendEngine`]: slave to host, a [`RingBuffer`] of slots cut into runs
//! - [`RecvEngine`]: host to slave, registered/active buffer lists
//!
//! All memory is statically allocated using const generics. Descriptors
//! link to each other by address, so the engines must not move once
//! initialized.

// Allow dead code in this internal module - inspection helpers are kept for tests
#![allow(dead_code)]

pub mod descriptor;
pub mod recv;
pub mod ring;
pub mod send;

pub use recv::{RecvCompletion, RecvEngine, RecvHandle};
pub use ring::{RingBuffer, SlotPermit, SlotRange};
pub use send::{SendEngine, SendState};
