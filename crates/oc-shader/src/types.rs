//! Shared shader type definitions
//!
//! Pipeline stages, texture kinds and fixed-function enums used by both the
//! IR and the backend.

use bitflags::bitflags;

bitflags! {
    /// Set of stages present in a pipeline
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShaderStage: u8 {
        const VERTEX = 0x01;
        const TESSELLATION_CONTROL = 0x02;
        const TESSELLATION_EVAL = 0x04;
        const GEOMETRY = 0x08;
        const FRAGMENT = 0x10;
        const COMPUTE = 0x20;
    }
}

/// Guest shader stage of one program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// First half of a dual vertex program
    VertexA,
    VertexB,
    TessellationControl,
    TessellationEval,
    Geometry,
    Fragment,
    Compute,
}

impl Stage {
    /// Stage flag for pipeline stage masks
    pub fn flag(self) -> ShaderStage {
        match self {
            Stage::VertexA | Stage::VertexB => ShaderStage::VERTEX,
            Stage::TessellationControl => ShaderStage::TESSELLATION_CONTROL,
            Stage::TessellationEval => ShaderStage::TESSELLATION_EVAL,
            Stage::Geometry => ShaderStage::GEOMETRY,
            Stage::Fragment => ShaderStage::FRAGMENT,
            Stage::Compute => ShaderStage::COMPUTE,
        }
    }

    /// Stages whose outputs carry a clip-space position
    pub fn is_vertex_like(self) -> bool {
        matches!(
            self,
            Stage::VertexA | Stage::VertexB | Stage::TessellationEval | Stage::Geometry
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::VertexA => "vertex_a",
            Stage::VertexB => "vertex_b",
            Stage::TessellationControl => "tess_control",
            Stage::TessellationEval => "tess_eval",
            Stage::Geometry => "geometry",
            Stage::Fragment => "fragment",
            Stage::Compute => "compute",
        }
    }
}

/// Dimensionality of a sampled texture or storage image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureType {
    Color1D,
    ColorArray1D,
    Color2D,
    ColorArray2D,
    Color3D,
    ColorCube,
    ColorArrayCube,
    Buffer,
    Color2DRect,
}

/// Interpolation qualifier of a generic input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Interpolation {
    #[default]
    Smooth,
    Flat,
    NoPerspective,
}

/// Comparison used by the fixed-function alpha test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    LessThanEqual,
    Greater,
    NotEqual,
    GreaterThanEqual,
    Always,
}

impl CompareFunction {
    /// Infix operator, `None` for the constant functions
    pub fn operator(self) -> Option<&'static str> {
        match self {
            CompareFunction::Less => Some("<"),
            CompareFunction::Equal => Some("=="),
            CompareFunction::LessThanEqual => Some("<="),
            CompareFunction::Greater => Some(">"),
            CompareFunction::NotEqual => Some("!="),
            CompareFunction::GreaterThanEqual => Some(">="),
            CompareFunction::Never | CompareFunction::Always => None,
        }
    }
}

/// Primitive class consumed by the first stage after vertex processing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InputTopology {
    Points,
    Lines,
    LinesAdjacency,
    #[default]
    Triangles,
    TrianglesAdjacency,
}
