//! Shader intermediate representation
//!
//! The data model produced by guest ISA frontends and consumed by the
//! backends: an arena of typed instructions grouped into blocks, a structured
//! control-flow list and an aggregate [`Info`] of resource usage.

pub mod attribute;
pub mod builder;
pub mod collect;
pub mod info;
pub mod opcodes;
pub mod program;
pub mod ty;
pub mod value;
pub mod varying;

pub use attribute::{Attribute, NUM_GENERICS};
pub use builder::IrEmitter;
pub use collect::collect_shader_info;
pub use info::{
    ConstantBufferDescriptor, ImageBufferDescriptor, ImageDescriptor, Info,
    StorageBufferDescriptor, TextureBufferDescriptor, TextureDescriptor, NUM_CONSTANT_BUFFERS,
    NUM_RENDER_TARGETS,
};
pub use opcodes::Opcode;
pub use program::{Block, Inst, InstArena, Program, SyntaxNode};
pub use ty::Type;
pub use value::{BlockId, InstId, Value};
pub use varying::VaryingState;
