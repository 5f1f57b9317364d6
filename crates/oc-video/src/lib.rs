//! Maxwell pipeline cache for oxidized-maxwell
//!
//! Turns guest 3D and compute engine state into Metal pipelines: programs
//! are found and hashed in guest memory, translated through `oc-shader`,
//! compiled by a [`backend::HostDevice`] and cached by key.

pub mod backend;
pub mod builder;
pub mod cache_key;
pub mod channel;
pub mod compute_pipeline;
pub mod environment;
pub mod fixed_state;
pub mod graphics_pipeline;
pub mod maxwell_to_mtl;
pub mod pipeline_cache;
pub mod regs;
pub mod shader_info;
pub mod worker;

pub use backend::null::NullDevice;
pub use backend::HostDevice;
pub use cache_key::{ComputePipelineCacheKey, GraphicsPipelineCacheKey};
pub use compute_pipeline::ComputePipeline;
pub use graphics_pipeline::{Framebuffer, GraphicsPipeline};
pub use pipeline_cache::{CacheStats, PipelineCache};
