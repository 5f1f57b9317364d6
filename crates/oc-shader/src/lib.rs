//! Shader IR and Metal backend for oxidized-maxwell
//!
//! Guest Maxwell programs are decoded by a frontend into the IR in [`ir`],
//! then lowered to Metal Shading Language by [`backend::msl::emit_msl`].
//! Resource slot assignment across the stages of a pipeline goes through
//! [`Bindings`].

pub mod backend;
pub mod bindings;
pub mod environment;
pub mod ir;
pub mod profile;
pub mod types;

pub use backend::msl::{emit_msl, ENTRY_POINT};
pub use bindings::Bindings;
pub use environment::{Environment, ShaderFrontend};
pub use ir::{Program, SyntaxNode};
pub use profile::{HostTranslateInfo, Profile, RuntimeInfo};
pub use types::{CompareFunction, InputTopology, ShaderStage, Stage, TextureType};
