//! Resource binding counters and Metal argument table layout
//!
//! One [`Bindings`] value is threaded through every stage of a pipeline so
//! that each stage's resources land on distinct slots.

/// Buffer slots handed to constant buffers
pub const MAX_UNIFORM_BUFFERS: u32 = 14;
/// First buffer slot of storage buffers
pub const STORAGE_BUFFER_SLOT_BASE: u32 = MAX_UNIFORM_BUFFERS;
/// Buffer slots handed to storage buffers
pub const MAX_STORAGE_BUFFERS: u32 = 8;
/// Buffer slot of the resolution scaling uniform
pub const SCALING_BUFFER_SLOT: u32 = STORAGE_BUFFER_SLOT_BASE + MAX_STORAGE_BUFFERS;
/// Buffer slot of the render area uniform
pub const RENDER_AREA_BUFFER_SLOT: u32 = SCALING_BUFFER_SLOT + 1;
/// First buffer slot of vertex streams
pub const VERTEX_BUFFER_SLOT_BASE: u32 = RENDER_AREA_BUFFER_SLOT + 1;
/// Metal argument table buffer limit
pub const MAX_BUFFER_SLOTS: u32 = 31;
/// Vertex streams that fit after the fixed slots
pub const MAX_VERTEX_BUFFERS: u32 = MAX_BUFFER_SLOTS - VERTEX_BUFFER_SLOT_BASE;

/// Texture slots for sampled textures; samplers share the index
pub const MAX_TEXTURES: u32 = 16;
/// First texture slot of storage images
pub const IMAGE_TEXTURE_SLOT_BASE: u32 = 64;
/// Texture slots handed to storage images
pub const MAX_IMAGES: u32 = 64;

/// Running slot counters shared by all stages of one pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bindings {
    pub uniform_buffer: u32,
    pub storage_buffer: u32,
    pub texture: u32,
    pub image: u32,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_layout_fits_argument_table() {
        assert_eq!(STORAGE_BUFFER_SLOT_BASE, 14);
        assert_eq!(SCALING_BUFFER_SLOT, 22);
        assert_eq!(RENDER_AREA_BUFFER_SLOT, 23);
        assert_eq!(VERTEX_BUFFER_SLOT_BASE, 24);
        assert_eq!(MAX_VERTEX_BUFFERS, 7);
        assert!(IMAGE_TEXTURE_SLOT_BASE >= MAX_TEXTURES);
    }
}
