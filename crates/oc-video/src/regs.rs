//! Maxwell 3D and compute engine register snapshot
//!
//! Only the registers that change pipeline compilation are modelled. The
//! command processor owns these values and updates them as methods arrive;
//! the pipeline cache reads them when a draw or dispatch needs a pipeline.

use oc_shader::{CompareFunction, InputTopology, Stage};

/// Program slots of a graphics pipeline, in register order
pub const NUM_PROGRAMS: usize = 5;
/// Constant buffer bindings per graphics stage
pub const NUM_CONST_BUFFERS: usize = 18;
/// Constant buffer bindings of the compute engine
pub const NUM_COMPUTE_CONST_BUFFERS: usize = 8;
pub const NUM_VERTEX_ATTRIBUTES: usize = 32;
pub const NUM_VERTEX_STREAMS: usize = 16;
pub const NUM_RENDER_TARGETS: usize = 8;

/// Graphics program slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderProgram {
    VertexB,
    TessellationInit,
    Tessellation,
    Geometry,
    Fragment,
}

impl ShaderProgram {
    pub const ALL: [ShaderProgram; NUM_PROGRAMS] = [
        ShaderProgram::VertexB,
        ShaderProgram::TessellationInit,
        ShaderProgram::Tessellation,
        ShaderProgram::Geometry,
        ShaderProgram::Fragment,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn stage(self) -> Stage {
        match self {
            ShaderProgram::VertexB => Stage::VertexB,
            ShaderProgram::TessellationInit => Stage::TessellationControl,
            ShaderProgram::Tessellation => Stage::TessellationEval,
            ShaderProgram::Geometry => Stage::Geometry,
            ShaderProgram::Fragment => Stage::Fragment,
        }
    }
}

/// `SHADER_CONFIG` entry of one program slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShaderProgramRegs {
    pub enabled: bool,
    /// Offset of the program header from `program_region`
    pub offset: u32,
}

/// Constant buffer bound to a shader stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConstBufferBinding {
    pub enabled: bool,
    pub address: u64,
    pub size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum PrimitiveTopology {
    Points = 0,
    Lines = 1,
    LineLoop = 2,
    LineStrip = 3,
    #[default]
    Triangles = 4,
    TriangleStrip = 5,
    TriangleFan = 6,
    Quads = 7,
    QuadStrip = 8,
    Polygon = 9,
    LinesAdjacency = 10,
    LineStripAdjacency = 11,
    TrianglesAdjacency = 12,
    TriangleStripAdjacency = 13,
    Patches = 14,
}

impl PrimitiveTopology {
    pub fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => PrimitiveTopology::Points,
            1 => PrimitiveTopology::Lines,
            2 => PrimitiveTopology::LineLoop,
            3 => PrimitiveTopology::LineStrip,
            4 => PrimitiveTopology::Triangles,
            5 => PrimitiveTopology::TriangleStrip,
            6 => PrimitiveTopology::TriangleFan,
            7 => PrimitiveTopology::Quads,
            8 => PrimitiveTopology::QuadStrip,
            9 => PrimitiveTopology::Polygon,
            10 => PrimitiveTopology::LinesAdjacency,
            11 => PrimitiveTopology::LineStripAdjacency,
            12 => PrimitiveTopology::TrianglesAdjacency,
            13 => PrimitiveTopology::TriangleStripAdjacency,
            14 => PrimitiveTopology::Patches,
            _ => return None,
        })
    }

    /// Primitive class seen by the first stage after vertex processing
    pub fn input_topology(self) -> InputTopology {
        match self {
            PrimitiveTopology::Points => InputTopology::Points,
            PrimitiveTopology::Lines | PrimitiveTopology::LineLoop | PrimitiveTopology::LineStrip => {
                InputTopology::Lines
            }
            PrimitiveTopology::LinesAdjacency | PrimitiveTopology::LineStripAdjacency => {
                InputTopology::LinesAdjacency
            }
            PrimitiveTopology::TrianglesAdjacency | PrimitiveTopology::TriangleStripAdjacency => {
                InputTopology::TrianglesAdjacency
            }
            PrimitiveTopology::Triangles
            | PrimitiveTopology::TriangleStrip
            | PrimitiveTopology::TriangleFan
            | PrimitiveTopology::Quads
            | PrimitiveTopology::QuadStrip
            | PrimitiveTopology::Polygon
            | PrimitiveTopology::Patches => InputTopology::Triangles,
        }
    }
}

/// Comparison function in its packed 3-bit form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum ComparisonOp {
    Never = 0,
    Less = 1,
    Equal = 2,
    LessEqual = 3,
    Greater = 4,
    NotEqual = 5,
    GreaterEqual = 6,
    #[default]
    Always = 7,
}

impl ComparisonOp {
    /// Decode a register value. Guests use either the GL encoding
    /// (`0x200..=0x207`) or the D3D one (`1..=8`).
    pub fn from_raw(raw: u32) -> Option<Self> {
        let packed = match raw {
            0x200..=0x207 => raw - 0x200,
            1..=8 => raw - 1,
            _ => return None,
        };
        Self::from_packed(packed)
    }

    pub fn from_packed(packed: u32) -> Option<Self> {
        Some(match packed {
            0 => ComparisonOp::Never,
            1 => ComparisonOp::Less,
            2 => ComparisonOp::Equal,
            3 => ComparisonOp::LessEqual,
            4 => ComparisonOp::Greater,
            5 => ComparisonOp::NotEqual,
            6 => ComparisonOp::GreaterEqual,
            7 => ComparisonOp::Always,
            _ => return None,
        })
    }

    pub fn to_compare_function(self) -> CompareFunction {
        match self {
            ComparisonOp::Never => CompareFunction::Never,
            ComparisonOp::Less => CompareFunction::Less,
            ComparisonOp::Equal => CompareFunction::Equal,
            ComparisonOp::LessEqual => CompareFunction::LessThanEqual,
            ComparisonOp::Greater => CompareFunction::Greater,
            ComparisonOp::NotEqual => CompareFunction::NotEqual,
            ComparisonOp::GreaterEqual => CompareFunction::GreaterThanEqual,
            ComparisonOp::Always => CompareFunction::Always,
        }
    }
}

/// Component layout of a vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum VertexAttributeSize {
    R32G32B32A32 = 0x01,
    R32G32B32 = 0x02,
    R16G16B16A16 = 0x03,
    R32G32 = 0x04,
    R16G16B16 = 0x05,
    R8G8B8A8 = 0x0A,
    R16G16 = 0x0F,
    R32 = 0x12,
    R8G8B8 = 0x13,
    R8G8 = 0x18,
    R16 = 0x1B,
    R8 = 0x1D,
    A2B10G10R10 = 0x30,
    B10G11R11 = 0x31,
    G8R8 = 0x32,
    X8B8G8R8 = 0x33,
    A8 = 0x34,
}

impl VertexAttributeSize {
    pub fn from_raw(raw: u32) -> Option<Self> {
        use VertexAttributeSize::*;
        Some(match raw {
            0x01 => R32G32B32A32,
            0x02 => R32G32B32,
            0x03 => R16G16B16A16,
            0x04 => R32G32,
            0x05 => R16G16B16,
            0x0A => R8G8B8A8,
            0x0F => R16G16,
            0x12 => R32,
            0x13 => R8G8B8,
            0x18 => R8G8,
            0x1B => R16,
            0x1D => R8,
            0x30 => A2B10G10R10,
            0x31 => B10G11R11,
            0x32 => G8R8,
            0x33 => X8B8G8R8,
            0x34 => A8,
            _ => return None,
        })
    }

    pub fn component_count(self) -> u32 {
        use VertexAttributeSize::*;
        match self {
            R32 | R16 | R8 | A8 => 1,
            R32G32 | R16G16 | R8G8 | G8R8 => 2,
            R32G32B32 | R16G16B16 | R8G8B8 | B10G11R11 => 3,
            R32G32B32A32 | R16G16B16A16 | R8G8B8A8 | A2B10G10R10 | X8B8G8R8 => 4,
        }
    }

    pub fn size_in_bytes(self) -> u32 {
        use VertexAttributeSize::*;
        match self {
            R8 | A8 => 1,
            R8G8 | G8R8 | R16 => 2,
            R8G8B8 => 3,
            R8G8B8A8 | X8B8G8R8 | R16G16 | R32 | A2B10G10R10 | B10G11R11 => 4,
            R16G16B16 => 6,
            R16G16B16A16 | R32G32 => 8,
            R32G32B32 => 12,
            R32G32B32A32 => 16,
        }
    }
}

/// Numeric interpretation of a vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum VertexAttributeType {
    SNorm = 1,
    UNorm = 2,
    SInt = 3,
    UInt = 4,
    UScaled = 5,
    SScaled = 6,
    Float = 7,
}

impl VertexAttributeType {
    pub fn from_raw(raw: u32) -> Option<Self> {
        use VertexAttributeType::*;
        Some(match raw {
            1 => SNorm,
            2 => UNorm,
            3 => SInt,
            4 => UInt,
            5 => UScaled,
            6 => SScaled,
            7 => Float,
            _ => return None,
        })
    }
}

/// `VERTEX_ATTRIB_FORMAT` register, kept in its hardware layout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VertexAttribute(pub u32);

impl VertexAttribute {
    const BUFFER_MASK: u32 = 0x1F;
    const CONSTANT_BIT: u32 = 1 << 6;
    const OFFSET_SHIFT: u32 = 7;
    const OFFSET_MASK: u32 = 0x3FFF;
    const SIZE_SHIFT: u32 = 21;
    const SIZE_MASK: u32 = 0x3F;
    const TYPE_SHIFT: u32 = 27;
    const TYPE_MASK: u32 = 0x7;

    pub fn new(buffer: u32, offset: u32, size: VertexAttributeSize, ty: VertexAttributeType) -> Self {
        Self(
            (buffer & Self::BUFFER_MASK)
                | ((offset & Self::OFFSET_MASK) << Self::OFFSET_SHIFT)
                | ((size as u32) << Self::SIZE_SHIFT)
                | ((ty as u32) << Self::TYPE_SHIFT),
        )
    }

    pub fn buffer(self) -> u32 {
        self.0 & Self::BUFFER_MASK
    }

    /// Attribute reads a constant instead of a vertex stream
    pub fn is_constant(self) -> bool {
        self.0 & Self::CONSTANT_BIT != 0
    }

    pub fn offset(self) -> u32 {
        (self.0 >> Self::OFFSET_SHIFT) & Self::OFFSET_MASK
    }

    pub fn size(self) -> Option<VertexAttributeSize> {
        VertexAttributeSize::from_raw((self.0 >> Self::SIZE_SHIFT) & Self::SIZE_MASK)
    }

    pub fn ty(self) -> Option<VertexAttributeType> {
        VertexAttributeType::from_raw((self.0 >> Self::TYPE_SHIFT) & Self::TYPE_MASK)
    }

    /// A zero size field means the slot is unused
    pub fn is_enabled(self) -> bool {
        !self.is_constant() && self.size().is_some() && self.ty().is_some()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VertexStream {
    pub enabled: bool,
    pub address: u64,
    pub stride: u32,
    /// Instance divisor, 0 for per-vertex data
    pub divisor: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendState {
    pub enabled: bool,
    /// RGBA write mask, bit 0 is red
    pub color_write_mask: u8,
}

impl Default for BlendState {
    fn default() -> Self {
        Self {
            enabled: false,
            color_write_mask: 0xF,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum CullFace {
    Front = 0,
    #[default]
    Back = 1,
    FrontAndBack = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum FrontFace {
    ClockWise = 0,
    #[default]
    CounterClockWise = 1,
}

/// 3D engine registers read while building a graphics pipeline
#[derive(Debug, Clone)]
pub struct Maxwell3dRegs {
    /// Base address every program offset is relative to
    pub program_region: u64,
    pub shader_programs: [ShaderProgramRegs; NUM_PROGRAMS],
    pub const_buffers: [[ConstBufferBinding; NUM_CONST_BUFFERS]; NUM_PROGRAMS],
    /// Texture image control table
    pub tex_header_address: u64,
    pub topology: PrimitiveTopology,
    pub vertex_attribs: [VertexAttribute; NUM_VERTEX_ATTRIBUTES],
    pub vertex_streams: [VertexStream; NUM_VERTEX_STREAMS],
    pub point_size: f32,
    pub alpha_test_enabled: bool,
    pub alpha_test_func: ComparisonOp,
    pub alpha_test_ref: f32,
    pub blend: [BlendState; NUM_RENDER_TARGETS],
    pub depth_test_enable: bool,
    pub depth_write_enable: bool,
    pub depth_func: ComparisonOp,
    pub stencil_enable: bool,
    pub cull_enable: bool,
    pub cull_face: CullFace,
    pub front_face: FrontFace,
    pub early_z: bool,
    pub y_negate: bool,
    pub ndc_minus_one_to_one: bool,
}

impl Default for Maxwell3dRegs {
    fn default() -> Self {
        Self {
            program_region: 0,
            shader_programs: [ShaderProgramRegs::default(); NUM_PROGRAMS],
            const_buffers: [[ConstBufferBinding::default(); NUM_CONST_BUFFERS]; NUM_PROGRAMS],
            tex_header_address: 0,
            topology: PrimitiveTopology::default(),
            vertex_attribs: [VertexAttribute::default(); NUM_VERTEX_ATTRIBUTES],
            vertex_streams: [VertexStream::default(); NUM_VERTEX_STREAMS],
            point_size: 1.0,
            alpha_test_enabled: false,
            alpha_test_func: ComparisonOp::Always,
            alpha_test_ref: 0.0,
            blend: [BlendState::default(); NUM_RENDER_TARGETS],
            depth_test_enable: false,
            depth_write_enable: false,
            depth_func: ComparisonOp::Always,
            stencil_enable: false,
            cull_enable: false,
            cull_face: CullFace::default(),
            front_face: FrontFace::default(),
            early_z: false,
            y_negate: false,
            ndc_minus_one_to_one: false,
        }
    }
}

impl Maxwell3dRegs {
    /// Guest address of a program's header
    pub fn program_address(&self, program: ShaderProgram) -> u64 {
        self.program_region + u64::from(self.shader_programs[program.index()].offset)
    }

    pub fn is_program_enabled(&self, program: ShaderProgram) -> bool {
        self.shader_programs[program.index()].enabled
    }
}

/// Compute engine launch state
#[derive(Debug, Clone, Default)]
pub struct ComputeRegs {
    pub code_address: u64,
    /// Offset of the program header from `code_address`
    pub program_start: u32,
    pub shared_alloc: u32,
    pub block_dim: [u32; 3],
    pub local_memory_size: u32,
    pub const_buffers: [ConstBufferBinding; NUM_COMPUTE_CONST_BUFFERS],
    pub tex_header_address: u64,
}

impl ComputeRegs {
    pub fn program_address(&self) -> u64 {
        self.code_address + u64::from(self.program_start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparison_encodings() {
        assert_eq!(ComparisonOp::from_raw(0x201), Some(ComparisonOp::Less));
        assert_eq!(ComparisonOp::from_raw(2), Some(ComparisonOp::Less));
        assert_eq!(ComparisonOp::from_raw(8), Some(ComparisonOp::Always));
        assert_eq!(ComparisonOp::from_raw(0), None);
        assert_eq!(
            ComparisonOp::GreaterEqual.to_compare_function(),
            CompareFunction::GreaterThanEqual
        );
    }

    #[test]
    fn test_vertex_attribute_fields() {
        let attr = VertexAttribute::new(3, 0x24, VertexAttributeSize::R32G32, VertexAttributeType::Float);
        assert_eq!(attr.buffer(), 3);
        assert_eq!(attr.offset(), 0x24);
        assert_eq!(attr.size(), Some(VertexAttributeSize::R32G32));
        assert_eq!(attr.ty(), Some(VertexAttributeType::Float));
        assert!(attr.is_enabled());
        assert!(!VertexAttribute::default().is_enabled());
    }

    #[test]
    fn test_topology_classes() {
        assert_eq!(PrimitiveTopology::LineStrip.input_topology(), InputTopology::Lines);
        assert_eq!(PrimitiveTopology::Quads.input_topology(), InputTopology::Triangles);
        assert_eq!(PrimitiveTopology::from_raw(15), None);
    }

    #[test]
    fn test_program_address() {
        let mut regs = Maxwell3dRegs::default();
        regs.program_region = 0x10_0000;
        regs.shader_programs[ShaderProgram::Fragment.index()].offset = 0x800;
        assert_eq!(regs.program_address(ShaderProgram::Fragment), 0x10_0800);
        assert_eq!(ShaderProgram::Fragment.stage(), Stage::Fragment);
    }
}
