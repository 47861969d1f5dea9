//! "Internals" are thin RAII wrappers and helpers around raw Vulkan objects.
//! They know nothing about frames, passes or assets.

pub mod barrier;
pub mod buffer;
pub mod descriptor_set_layout_builder;
pub mod memory;
pub mod swapchain;
