//! Maxwell to Metal enum translation tables

use crate::regs::{PrimitiveTopology, VertexAttributeSize, VertexAttributeType};
use once_cell::sync::Lazy;

/// Metal vertex attribute formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MtlVertexFormat {
    Invalid,
    UChar,
    UChar2,
    UChar3,
    UChar4,
    Char,
    Char2,
    Char3,
    Char4,
    UCharNormalized,
    UChar2Normalized,
    UChar3Normalized,
    UChar4Normalized,
    CharNormalized,
    Char2Normalized,
    Char3Normalized,
    Char4Normalized,
    UShort,
    UShort2,
    UShort3,
    UShort4,
    Short,
    Short2,
    Short3,
    Short4,
    UShortNormalized,
    UShort2Normalized,
    UShort3Normalized,
    UShort4Normalized,
    ShortNormalized,
    Short2Normalized,
    Short3Normalized,
    Short4Normalized,
    Half,
    Half2,
    Half3,
    Half4,
    Float,
    Float2,
    Float3,
    Float4,
    Int,
    Int2,
    Int3,
    Int4,
    UInt,
    UInt2,
    UInt3,
    UInt4,
}

/// Metal pixel formats reachable from guest surfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MtlPixelFormat {
    Invalid,
    R8Unorm,
    R8Snorm,
    R8Uint,
    R8Sint,
    R16Unorm,
    R16Snorm,
    R16Uint,
    R16Sint,
    R16Float,
    RG8Unorm,
    RG8Snorm,
    RG8Uint,
    RG8Sint,
    B5G6R5Unorm,
    A1BGR5Unorm,
    ABGR4Unorm,
    R32Uint,
    R32Sint,
    R32Float,
    RG16Unorm,
    RG16Snorm,
    RG16Uint,
    RG16Sint,
    RG16Float,
    RGBA8Unorm,
    RGBA8UnormSrgb,
    RGBA8Snorm,
    RGBA8Uint,
    RGBA8Sint,
    BGRA8Unorm,
    BGRA8UnormSrgb,
    RGB10A2Unorm,
    RGB10A2Uint,
    RG11B10Float,
    RG32Uint,
    RG32Sint,
    RG32Float,
    RGBA16Unorm,
    RGBA16Snorm,
    RGBA16Uint,
    RGBA16Sint,
    RGBA16Float,
    RGBA32Uint,
    RGBA32Sint,
    RGBA32Float,
    BC1Rgba,
    BC2Rgba,
    BC3Rgba,
    BC4RUnorm,
    BC5RGUnorm,
    BC7RgbaUnorm,
    Depth16Unorm,
    Depth32Float,
    Stencil8,
    Depth24UnormStencil8,
    Depth32FloatStencil8,
}

impl MtlPixelFormat {
    pub fn is_depth_stencil(self) -> bool {
        matches!(
            self,
            MtlPixelFormat::Depth16Unorm
                | MtlPixelFormat::Depth32Float
                | MtlPixelFormat::Stencil8
                | MtlPixelFormat::Depth24UnormStencil8
                | MtlPixelFormat::Depth32FloatStencil8
        )
    }
}

/// Guest surface formats the table covers, in table order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    A8B8G8R8Unorm,
    A8B8G8R8Snorm,
    A8B8G8R8Sint,
    A8B8G8R8Uint,
    R5G6B5Unorm,
    B5G6R5Unorm,
    A1R5G5B5Unorm,
    A2B10G10R10Unorm,
    A2B10G10R10Uint,
    A1B5G5R5Unorm,
    R8Unorm,
    R8Snorm,
    R8Sint,
    R8Uint,
    R16G16B16A16Float,
    R16G16B16A16Unorm,
    R16G16B16A16Snorm,
    R16G16B16A16Sint,
    R16G16B16A16Uint,
    B10G11R11Float,
    R32G32B32A32Uint,
    Bc1RgbaUnorm,
    Bc2Unorm,
    Bc3Unorm,
    Bc4Unorm,
    Bc5Unorm,
    Bc7Unorm,
    B8G8R8A8Unorm,
    R32G32B32A32Float,
    R32G32B32A32Sint,
    R32G32Float,
    R32G32Sint,
    R32Float,
    R16Float,
    R16Unorm,
    R16Snorm,
    R16Uint,
    R16Sint,
    R16G16Unorm,
    R16G16Float,
    R16G16Uint,
    R16G16Sint,
    R16G16Snorm,
    A8B8G8R8Srgb,
    R8G8Unorm,
    R8G8Snorm,
    R8G8Sint,
    R8G8Uint,
    R32G32Uint,
    R32Uint,
    R32Sint,
    B8G8R8A8Srgb,
    A4B4G4R4Unorm,
    D32Float,
    D16Unorm,
    S8Uint,
    D24UnormS8Uint,
    S8UintD24Unorm,
    D32FloatS8Uint,
}

pub const NUM_PIXEL_FORMATS: usize = PixelFormat::D32FloatS8Uint as usize + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelFormatInfo {
    pub pixel_format: MtlPixelFormat,
    pub bytes_per_block: u32,
    /// Texel footprint of one block
    pub block_size: (u32, u32),
    pub can_be_render_target: bool,
}

impl PixelFormatInfo {
    const fn plain(pixel_format: MtlPixelFormat, bytes_per_block: u32) -> Self {
        Self {
            pixel_format,
            bytes_per_block,
            block_size: (1, 1),
            can_be_render_target: true,
        }
    }

    const fn compressed(pixel_format: MtlPixelFormat, bytes_per_block: u32) -> Self {
        Self {
            pixel_format,
            bytes_per_block,
            block_size: (4, 4),
            can_be_render_target: false,
        }
    }
}

/// Optional device features that change the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatCaps {
    pub packed_16bit_formats: bool,
    pub depth24_stencil8: bool,
}

impl Default for FormatCaps {
    fn default() -> Self {
        // Apple silicon
        Self {
            packed_16bit_formats: true,
            depth24_stencil8: false,
        }
    }
}

/// Guest surface format to Metal pixel format table for one device
#[derive(Debug, Clone)]
pub struct FormatTable {
    infos: [PixelFormatInfo; NUM_PIXEL_FORMATS],
}

impl FormatTable {
    pub fn new(caps: FormatCaps) -> Self {
        use MtlPixelFormat as M;
        use PixelFormatInfo as I;
        let mut infos = [
            I::plain(M::RGBA8Unorm, 4),          // A8B8G8R8_UNORM
            I::plain(M::RGBA8Snorm, 4),          // A8B8G8R8_SNORM
            I::plain(M::RGBA8Sint, 4),           // A8B8G8R8_SINT
            I::plain(M::RGBA8Uint, 4),           // A8B8G8R8_UINT
            I::plain(M::B5G6R5Unorm, 2),         // R5G6B5_UNORM
            I::plain(M::B5G6R5Unorm, 2),         // B5G6R5_UNORM
            I::plain(M::A1BGR5Unorm, 2),         // A1R5G5B5_UNORM
            I::plain(M::RGB10A2Unorm, 4),        // A2B10G10R10_UNORM
            I::plain(M::RGB10A2Uint, 4),         // A2B10G10R10_UINT
            I::plain(M::A1BGR5Unorm, 2),         // A1B5G5R5_UNORM
            I::plain(M::R8Unorm, 1),             // R8_UNORM
            I::plain(M::R8Snorm, 1),             // R8_SNORM
            I::plain(M::R8Sint, 1),              // R8_SINT
            I::plain(M::R8Uint, 1),              // R8_UINT
            I::plain(M::RGBA16Float, 8),         // R16G16B16A16_FLOAT
            I::plain(M::RGBA16Unorm, 8),         // R16G16B16A16_UNORM
            I::plain(M::RGBA16Snorm, 8),         // R16G16B16A16_SNORM
            I::plain(M::RGBA16Sint, 8),          // R16G16B16A16_SINT
            I::plain(M::RGBA16Uint, 8),          // R16G16B16A16_UINT
            I::plain(M::RG11B10Float, 4),        // B10G11R11_FLOAT
            I::plain(M::RGBA32Uint, 16),         // R32G32B32A32_UINT
            I::compressed(M::BC1Rgba, 8),        // BC1_RGBA_UNORM
            I::compressed(M::BC2Rgba, 16),       // BC2_UNORM
            I::compressed(M::BC3Rgba, 16),       // BC3_UNORM
            I::compressed(M::BC4RUnorm, 8),      // BC4_UNORM
            I::compressed(M::BC5RGUnorm, 16),    // BC5_UNORM
            I::compressed(M::BC7RgbaUnorm, 16),  // BC7_UNORM
            I::plain(M::BGRA8Unorm, 4),          // B8G8R8A8_UNORM
            I::plain(M::RGBA32Float, 16),        // R32G32B32A32_FLOAT
            I::plain(M::RGBA32Sint, 16),         // R32G32B32A32_SINT
            I::plain(M::RG32Float, 8),           // R32G32_FLOAT
            I::plain(M::RG32Sint, 8),            // R32G32_SINT
            I::plain(M::R32Float, 4),            // R32_FLOAT
            I::plain(M::R16Float, 2),            // R16_FLOAT
            I::plain(M::R16Unorm, 2),            // R16_UNORM
            I::plain(M::R16Snorm, 2),            // R16_SNORM
            I::plain(M::R16Uint, 2),             // R16_UINT
            I::plain(M::R16Sint, 2),             // R16_SINT
            I::plain(M::RG16Unorm, 4),           // R16G16_UNORM
            I::plain(M::RG16Float, 4),           // R16G16_FLOAT
            I::plain(M::RG16Uint, 4),            // R16G16_UINT
            I::plain(M::RG16Sint, 4),            // R16G16_SINT
            I::plain(M::RG16Snorm, 4),           // R16G16_SNORM
            I::plain(M::RGBA8UnormSrgb, 4),      // A8B8G8R8_SRGB
            I::plain(M::RG8Unorm, 2),            // R8G8_UNORM
            I::plain(M::RG8Snorm, 2),            // R8G8_SNORM
            I::plain(M::RG8Sint, 2),             // R8G8_SINT
            I::plain(M::RG8Uint, 2),             // R8G8_UINT
            I::plain(M::RG32Uint, 8),            // R32G32_UINT
            I::plain(M::R32Uint, 4),             // R32_UINT
            I::plain(M::R32Sint, 4),             // R32_SINT
            I::plain(M::BGRA8UnormSrgb, 4),      // B8G8R8A8_SRGB
            I::plain(M::ABGR4Unorm, 2),          // A4B4G4R4_UNORM
            I::plain(M::Depth32Float, 4),        // D32_FLOAT
            I::plain(M::Depth16Unorm, 2),        // D16_UNORM
            I::plain(M::Stencil8, 1),            // S8_UINT
            I::plain(M::Depth24UnormStencil8, 4), // D24_UNORM_S8_UINT
            I::plain(M::Depth24UnormStencil8, 4), // S8_UINT_D24_UNORM
            I::plain(M::Depth32FloatStencil8, 5), // D32_FLOAT_S8_UINT
        ];

        if !caps.packed_16bit_formats {
            for format in [
                PixelFormat::R5G6B5Unorm,
                PixelFormat::B5G6R5Unorm,
                PixelFormat::A1R5G5B5Unorm,
                PixelFormat::A1B5G5R5Unorm,
                PixelFormat::A4B4G4R4Unorm,
            ] {
                infos[format as usize] = I::plain(M::RGBA8Unorm, 4);
            }
        }
        if !caps.depth24_stencil8 {
            for format in [PixelFormat::D24UnormS8Uint, PixelFormat::S8UintD24Unorm] {
                infos[format as usize] = I::plain(M::Depth32FloatStencil8, 5);
            }
        }
        Self { infos }
    }

    pub fn info(&self, format: PixelFormat) -> &PixelFormatInfo {
        &self.infos[format as usize]
    }
}

/// Table for the default device capabilities
pub static DEFAULT_FORMAT_TABLE: Lazy<FormatTable> = Lazy::new(|| FormatTable::new(FormatCaps::default()));

/// Metal vertex format for a guest attribute, `Invalid` when Metal has no
/// direct equivalent
pub fn vertex_format(ty: VertexAttributeType, size: VertexAttributeSize) -> MtlVertexFormat {
    use MtlVertexFormat as F;
    use VertexAttributeSize as S;
    use VertexAttributeType as T;
    let format = match (ty, size) {
        (T::UNorm, S::R8 | S::A8) => F::UCharNormalized,
        (T::UNorm, S::R8G8 | S::G8R8) => F::UChar2Normalized,
        (T::UNorm, S::R8G8B8) => F::UChar3Normalized,
        (T::UNorm, S::R8G8B8A8 | S::X8B8G8R8) => F::UChar4Normalized,
        (T::UNorm, S::R16) => F::UShortNormalized,
        (T::UNorm, S::R16G16) => F::UShort2Normalized,
        (T::UNorm, S::R16G16B16) => F::UShort3Normalized,
        (T::UNorm, S::R16G16B16A16) => F::UShort4Normalized,

        (T::SNorm, S::R8 | S::A8) => F::CharNormalized,
        (T::SNorm, S::R8G8 | S::G8R8) => F::Char2Normalized,
        (T::SNorm, S::R8G8B8) => F::Char3Normalized,
        (T::SNorm, S::R8G8B8A8 | S::X8B8G8R8) => F::Char4Normalized,
        (T::SNorm, S::R16) => F::ShortNormalized,
        (T::SNorm, S::R16G16) => F::Short2Normalized,
        (T::SNorm, S::R16G16B16) => F::Short3Normalized,
        (T::SNorm, S::R16G16B16A16) => F::Short4Normalized,

        (T::UInt | T::UScaled, S::R8 | S::A8) => F::UChar,
        (T::UInt | T::UScaled, S::R8G8 | S::G8R8) => F::UChar2,
        (T::UInt | T::UScaled, S::R8G8B8) => F::UChar3,
        (T::UInt | T::UScaled, S::R8G8B8A8 | S::X8B8G8R8) => F::UChar4,
        (T::UInt | T::UScaled, S::R16) => F::UShort,
        (T::UInt | T::UScaled, S::R16G16) => F::UShort2,
        (T::UInt | T::UScaled, S::R16G16B16) => F::UShort3,
        (T::UInt | T::UScaled, S::R16G16B16A16) => F::UShort4,
        (T::UInt | T::UScaled, S::R32) => F::UInt,
        (T::UInt | T::UScaled, S::R32G32) => F::UInt2,
        (T::UInt | T::UScaled, S::R32G32B32) => F::UInt3,
        (T::UInt | T::UScaled, S::R32G32B32A32) => F::UInt4,

        (T::SInt | T::SScaled, S::R8 | S::A8) => F::Char,
        (T::SInt | T::SScaled, S::R8G8 | S::G8R8) => F::Char2,
        (T::SInt | T::SScaled, S::R8G8B8) => F::Char3,
        (T::SInt | T::SScaled, S::R8G8B8A8 | S::X8B8G8R8) => F::Char4,
        (T::SInt | T::SScaled, S::R16) => F::Short,
        (T::SInt | T::SScaled, S::R16G16) => F::Short2,
        (T::SInt | T::SScaled, S::R16G16B16) => F::Short3,
        (T::SInt | T::SScaled, S::R16G16B16A16) => F::Short4,
        (T::SInt | T::SScaled, S::R32) => F::Int,
        (T::SInt | T::SScaled, S::R32G32) => F::Int2,
        (T::SInt | T::SScaled, S::R32G32B32) => F::Int3,
        (T::SInt | T::SScaled, S::R32G32B32A32) => F::Int4,

        (T::Float, S::R16) => F::Half,
        (T::Float, S::R16G16) => F::Half2,
        (T::Float, S::R16G16B16) => F::Half3,
        (T::Float, S::R16G16B16A16) => F::Half4,
        (T::Float, S::R32) => F::Float,
        (T::Float, S::R32G32) => F::Float2,
        (T::Float, S::R32G32B32) => F::Float3,
        (T::Float, S::R32G32B32A32) => F::Float4,

        // Packed 10/11-bit layouts need shader-side unpacking
        _ => F::Invalid,
    };
    if format == F::Invalid {
        tracing::warn!("Unimplemented vertex format of type={:?} and size={:?}", ty, size);
    }
    format
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MtlPrimitiveTopologyClass {
    Point,
    Line,
    Triangle,
}

pub fn primitive_topology_class(topology: PrimitiveTopology) -> MtlPrimitiveTopologyClass {
    match topology {
        PrimitiveTopology::Points => MtlPrimitiveTopologyClass::Point,
        PrimitiveTopology::Lines
        | PrimitiveTopology::LineLoop
        | PrimitiveTopology::LineStrip
        | PrimitiveTopology::LinesAdjacency
        | PrimitiveTopology::LineStripAdjacency => MtlPrimitiveTopologyClass::Line,
        _ => MtlPrimitiveTopologyClass::Triangle,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MtlVertexStepFunction {
    PerVertex,
    PerInstance,
}

pub fn vertex_step_function(divisor: u32) -> MtlVertexStepFunction {
    if divisor == 0 {
        MtlVertexStepFunction::PerVertex
    } else {
        MtlVertexStepFunction::PerInstance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_formats() {
        assert_eq!(
            vertex_format(VertexAttributeType::Float, VertexAttributeSize::R32G32B32A32),
            MtlVertexFormat::Float4
        );
        assert_eq!(
            vertex_format(VertexAttributeType::UNorm, VertexAttributeSize::X8B8G8R8),
            MtlVertexFormat::UChar4Normalized
        );
        assert_eq!(
            vertex_format(VertexAttributeType::SScaled, VertexAttributeSize::R16G16),
            MtlVertexFormat::Short2
        );
        assert_eq!(
            vertex_format(VertexAttributeType::Float, VertexAttributeSize::B10G11R11),
            MtlVertexFormat::Invalid
        );
        // No normalized 32-bit integers in Metal
        assert_eq!(
            vertex_format(VertexAttributeType::UNorm, VertexAttributeSize::R32),
            MtlVertexFormat::Invalid
        );
    }

    #[test]
    fn test_format_table_fallbacks() {
        let table = &*DEFAULT_FORMAT_TABLE;
        assert_eq!(
            table.info(PixelFormat::B8G8R8A8Unorm).pixel_format,
            MtlPixelFormat::BGRA8Unorm
        );
        assert_eq!(
            table.info(PixelFormat::D24UnormS8Uint).pixel_format,
            MtlPixelFormat::Depth32FloatStencil8
        );
        assert!(!table.info(PixelFormat::Bc1RgbaUnorm).can_be_render_target);

        let caps = FormatCaps {
            packed_16bit_formats: false,
            depth24_stencil8: true,
        };
        let table = FormatTable::new(caps);
        assert_eq!(
            table.info(PixelFormat::B5G6R5Unorm).pixel_format,
            MtlPixelFormat::RGBA8Unorm
        );
        assert_eq!(table.info(PixelFormat::B5G6R5Unorm).bytes_per_block, 4);
        assert_eq!(
            table.info(PixelFormat::D24UnormS8Uint).pixel_format,
            MtlPixelFormat::Depth24UnormStencil8
        );
    }

    #[test]
    fn test_table_order() {
        let table = &*DEFAULT_FORMAT_TABLE;
        assert_eq!(table.info(PixelFormat::R32Float).pixel_format, MtlPixelFormat::R32Float);
        assert_eq!(table.info(PixelFormat::A8B8G8R8Srgb).pixel_format, MtlPixelFormat::RGBA8UnormSrgb);
        assert_eq!(table.info(PixelFormat::D32FloatS8Uint).bytes_per_block, 5);
        assert!(table.info(PixelFormat::D16Unorm).pixel_format.is_depth_stencil());
    }

    #[test]
    fn test_topology_class() {
        assert_eq!(
            primitive_topology_class(PrimitiveTopology::Points),
            MtlPrimitiveTopologyClass::Point
        );
        assert_eq!(
            primitive_topology_class(PrimitiveTopology::TriangleFan),
            MtlPrimitiveTopologyClass::Triangle
        );
        assert_eq!(vertex_step_function(1), MtlVertexStepFunction::PerInstance);
    }
}
