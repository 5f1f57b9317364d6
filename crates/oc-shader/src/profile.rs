//! Host capabilities and per-pipeline runtime state fed to the backend

use crate::ir::VaryingState;
use crate::types::{CompareFunction, InputTopology};

/// What the host device supports, fixed for the lifetime of a device
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub support_int64: bool,
    pub support_float16: bool,
    /// Minimum alignment of storage buffer base addresses, a power of two
    pub min_ssbo_alignment: u32,
    /// Threadgroup memory limit in bytes
    pub max_compute_shared_memory_size: u32,
    /// Declare every colour output even when the shader never writes it
    pub need_declared_frag_colors: bool,
    pub support_geometry_shader_passthrough: bool,
    /// Drop the iteration counters guarding loop back-edges
    pub disable_loop_safety_checks: bool,
}

impl Default for Profile {
    fn default() -> Self {
        // Apple GPU family 7 limits
        Self {
            support_int64: true,
            support_float16: true,
            min_ssbo_alignment: 16,
            max_compute_shared_memory_size: 32 * 1024,
            need_declared_frag_colors: false,
            support_geometry_shader_passthrough: false,
            disable_loop_safety_checks: false,
        }
    }
}

/// Host capabilities the frontend needs while translating guest code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostTranslateInfo {
    pub support_float64: bool,
    pub support_float16: bool,
    pub support_int64: bool,
    pub needs_demote_reorder: bool,
    pub support_viewport_index_layer: bool,
    pub min_ssbo_alignment: u32,
    pub support_geometry_shader_passthrough: bool,
}

impl HostTranslateInfo {
    pub fn from_profile(profile: &Profile) -> Self {
        Self {
            // No double precision in MSL
            support_float64: false,
            support_float16: profile.support_float16,
            support_int64: profile.support_int64,
            needs_demote_reorder: false,
            support_viewport_index_layer: true,
            min_ssbo_alignment: profile.min_ssbo_alignment,
            support_geometry_shader_passthrough: profile.support_geometry_shader_passthrough,
        }
    }
}

/// Pipeline state that changes the code emitted for one stage
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeInfo {
    /// Attributes written by the stage feeding this one
    pub previous_stage_stores: VaryingState,
    /// Point size written by the last vertex stage when the guest fixes it
    pub fixed_state_point_size: Option<f32>,
    /// Fragment alpha test; `None` disables it
    pub alpha_test_func: Option<CompareFunction>,
    pub alpha_test_reference: f32,
    pub input_topology: InputTopology,
    pub force_early_z: bool,
    /// Guest viewport is flipped vertically
    pub y_negate: bool,
}

impl Default for RuntimeInfo {
    fn default() -> Self {
        Self {
            previous_stage_stores: VaryingState::default(),
            fixed_state_point_size: None,
            alpha_test_func: None,
            alpha_test_reference: 0.0,
            input_topology: InputTopology::default(),
            force_early_z: false,
            y_negate: false,
        }
    }
}
