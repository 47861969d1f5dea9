//! "Resources" are GPU objects built from the internals: images, samplers,
//! shaders and pipelines.

pub mod image;
pub mod pipeline;
pub mod shader;
pub mod vertex;
