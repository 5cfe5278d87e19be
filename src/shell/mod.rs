// License: MIT

pub mod engine;
pub mod panel;

pub(crate) mod gpu;
pub(crate) mod render;
pub(crate) mod shm;

pub use engine::Engine;
pub use panel::Slot;
