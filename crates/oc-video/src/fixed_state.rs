//! Pipeline-relevant fixed-function state in a byte-comparable layout
//!
//! The structs here are plain old data so the cache key built around them
//! can be hashed and compared as raw bytes. Every field is written on each
//! refresh, starting from zeroed storage, so two refreshes from the same
//! registers always produce identical bytes.

use crate::regs::{
    BlendState, ComparisonOp, CullFace, FrontFace, Maxwell3dRegs, PrimitiveTopology,
    VertexAttribute, NUM_RENDER_TARGETS, NUM_VERTEX_ATTRIBUTES, NUM_VERTEX_STREAMS,
};
use bytemuck::{Pod, Zeroable};
use std::mem::{offset_of, size_of};

#[inline]
fn extract(raw: u32, shift: u32, bits: u32) -> u32 {
    (raw >> shift) & ((1 << bits) - 1)
}

#[inline]
fn insert(raw: &mut u32, shift: u32, bits: u32, value: u32) {
    let mask = ((1 << bits) - 1) << shift;
    *raw = (*raw & !mask) | ((value << shift) & mask);
}

// FixedPipelineState::raw1
const EXTENDED_DYNAMIC_STATE: (u32, u32) = (0, 1);
const TOPOLOGY: (u32, u32) = (1, 4);
const EARLY_Z: (u32, u32) = (5, 1);
const Y_NEGATE: (u32, u32) = (6, 1);
const NDC_MINUS_ONE_TO_ONE: (u32, u32) = (7, 1);
const ALPHA_TEST_FUNC: (u32, u32) = (8, 3);

// DynamicState::raw1
const DEPTH_TEST_ENABLE: (u32, u32) = (0, 1);
const DEPTH_WRITE_ENABLE: (u32, u32) = (1, 1);
const DEPTH_FUNC: (u32, u32) = (2, 3);
const STENCIL_ENABLE: (u32, u32) = (5, 1);
const CULL_ENABLE: (u32, u32) = (6, 1);
const CULL_FACE: (u32, u32) = (7, 2);
const FRONT_FACE: (u32, u32) = (9, 1);

// Per render target blend word
const BLEND_ENABLE: (u32, u32) = (0, 1);
const WRITE_MASK: (u32, u32) = (1, 4);

/// State a host with extended dynamic state sets per draw instead of baking
/// into the pipeline
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct DynamicState {
    pub raw1: u32,
    pub vertex_strides: [u16; NUM_VERTEX_STREAMS],
}

impl DynamicState {
    pub fn refresh(&mut self, regs: &Maxwell3dRegs) {
        let mut raw1 = 0;
        insert(&mut raw1, DEPTH_TEST_ENABLE.0, DEPTH_TEST_ENABLE.1, regs.depth_test_enable as u32);
        insert(&mut raw1, DEPTH_WRITE_ENABLE.0, DEPTH_WRITE_ENABLE.1, regs.depth_write_enable as u32);
        insert(&mut raw1, DEPTH_FUNC.0, DEPTH_FUNC.1, regs.depth_func as u32);
        insert(&mut raw1, STENCIL_ENABLE.0, STENCIL_ENABLE.1, regs.stencil_enable as u32);
        insert(&mut raw1, CULL_ENABLE.0, CULL_ENABLE.1, regs.cull_enable as u32);
        insert(&mut raw1, CULL_FACE.0, CULL_FACE.1, regs.cull_face as u32);
        insert(&mut raw1, FRONT_FACE.0, FRONT_FACE.1, regs.front_face as u32);
        self.raw1 = raw1;

        for (stride, stream) in self.vertex_strides.iter_mut().zip(&regs.vertex_streams) {
            *stride = if stream.enabled { stream.stride as u16 } else { 0 };
        }
    }

    pub fn depth_test_enable(&self) -> bool {
        extract(self.raw1, DEPTH_TEST_ENABLE.0, DEPTH_TEST_ENABLE.1) != 0
    }

    pub fn depth_write_enable(&self) -> bool {
        extract(self.raw1, DEPTH_WRITE_ENABLE.0, DEPTH_WRITE_ENABLE.1) != 0
    }

    pub fn depth_func(&self) -> ComparisonOp {
        ComparisonOp::from_packed(extract(self.raw1, DEPTH_FUNC.0, DEPTH_FUNC.1)).unwrap_or_default()
    }

    pub fn stencil_enable(&self) -> bool {
        extract(self.raw1, STENCIL_ENABLE.0, STENCIL_ENABLE.1) != 0
    }

    pub fn cull_enable(&self) -> bool {
        extract(self.raw1, CULL_ENABLE.0, CULL_ENABLE.1) != 0
    }

    pub fn cull_face(&self) -> CullFace {
        match extract(self.raw1, CULL_FACE.0, CULL_FACE.1) {
            0 => CullFace::Front,
            2 => CullFace::FrontAndBack,
            _ => CullFace::Back,
        }
    }

    pub fn front_face(&self) -> FrontFace {
        match extract(self.raw1, FRONT_FACE.0, FRONT_FACE.1) {
            0 => FrontFace::ClockWise,
            _ => FrontFace::CounterClockWise,
        }
    }
}

/// Fixed-function state that changes the compiled pipeline
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct FixedPipelineState {
    pub raw1: u32,
    /// Alpha test reference as raw float bits, 0 while the test is off
    pub alpha_test_ref: u32,
    /// Point size as raw float bits, 0 unless drawing points
    pub point_size: u32,
    /// Raw attribute format registers, 0 for unused slots
    pub attributes: [u32; NUM_VERTEX_ATTRIBUTES],
    pub color_blend: [u32; NUM_RENDER_TARGETS],
    /// Instance divisor per enabled vertex stream
    pub binding_divisors: [u32; NUM_VERTEX_STREAMS],
    /// Must stay last: excluded from the key when dynamic state is external
    pub dynamic_state: DynamicState,
}

impl FixedPipelineState {
    pub fn refresh(&mut self, regs: &Maxwell3dRegs, extended_dynamic_state: bool) {
        let mut raw1 = 0;
        insert(
            &mut raw1,
            EXTENDED_DYNAMIC_STATE.0,
            EXTENDED_DYNAMIC_STATE.1,
            extended_dynamic_state as u32,
        );
        insert(&mut raw1, TOPOLOGY.0, TOPOLOGY.1, regs.topology as u32);
        insert(&mut raw1, EARLY_Z.0, EARLY_Z.1, regs.early_z as u32);
        insert(&mut raw1, Y_NEGATE.0, Y_NEGATE.1, regs.y_negate as u32);
        insert(
            &mut raw1,
            NDC_MINUS_ONE_TO_ONE.0,
            NDC_MINUS_ONE_TO_ONE.1,
            regs.ndc_minus_one_to_one as u32,
        );
        let alpha_func = if regs.alpha_test_enabled {
            regs.alpha_test_func
        } else {
            ComparisonOp::Always
        };
        insert(&mut raw1, ALPHA_TEST_FUNC.0, ALPHA_TEST_FUNC.1, alpha_func as u32);
        self.raw1 = raw1;

        self.alpha_test_ref = if regs.alpha_test_enabled {
            regs.alpha_test_ref.to_bits()
        } else {
            0
        };
        self.point_size = if regs.topology == PrimitiveTopology::Points {
            regs.point_size.to_bits()
        } else {
            0
        };

        for (packed, attr) in self.attributes.iter_mut().zip(&regs.vertex_attribs) {
            *packed = if attr.is_enabled() { attr.0 } else { 0 };
        }
        for (packed, blend) in self.color_blend.iter_mut().zip(&regs.blend) {
            let mut word = 0;
            insert(&mut word, BLEND_ENABLE.0, BLEND_ENABLE.1, blend.enabled as u32);
            insert(&mut word, WRITE_MASK.0, WRITE_MASK.1, u32::from(blend.color_write_mask));
            *packed = word;
        }
        for (divisor, stream) in self.binding_divisors.iter_mut().zip(&regs.vertex_streams) {
            *divisor = if stream.enabled { stream.divisor } else { 0 };
        }

        if extended_dynamic_state {
            self.dynamic_state = DynamicState::zeroed();
        } else {
            self.dynamic_state.refresh(regs);
        }
    }

    /// Number of meaningful bytes, counted from the start of the struct
    pub fn size(&self) -> usize {
        if self.extended_dynamic_state() {
            offset_of!(FixedPipelineState, dynamic_state)
        } else {
            size_of::<FixedPipelineState>()
        }
    }

    pub fn extended_dynamic_state(&self) -> bool {
        extract(self.raw1, EXTENDED_DYNAMIC_STATE.0, EXTENDED_DYNAMIC_STATE.1) != 0
    }

    pub fn topology(&self) -> PrimitiveTopology {
        PrimitiveTopology::from_raw(extract(self.raw1, TOPOLOGY.0, TOPOLOGY.1)).unwrap_or_default()
    }

    pub fn early_z(&self) -> bool {
        extract(self.raw1, EARLY_Z.0, EARLY_Z.1) != 0
    }

    pub fn y_negate(&self) -> bool {
        extract(self.raw1, Y_NEGATE.0, Y_NEGATE.1) != 0
    }

    pub fn ndc_minus_one_to_one(&self) -> bool {
        extract(self.raw1, NDC_MINUS_ONE_TO_ONE.0, NDC_MINUS_ONE_TO_ONE.1) != 0
    }

    pub fn alpha_test_func(&self) -> ComparisonOp {
        ComparisonOp::from_packed(extract(self.raw1, ALPHA_TEST_FUNC.0, ALPHA_TEST_FUNC.1))
            .unwrap_or_default()
    }

    pub fn alpha_test_ref(&self) -> f32 {
        f32::from_bits(self.alpha_test_ref)
    }

    pub fn point_size(&self) -> f32 {
        f32::from_bits(self.point_size)
    }

    pub fn attribute(&self, index: usize) -> VertexAttribute {
        VertexAttribute(self.attributes[index])
    }

    pub fn binding_divisor(&self, stream: usize) -> u32 {
        self.binding_divisors[stream]
    }

    pub fn color_blend(&self, index: usize) -> BlendState {
        let word = self.color_blend[index];
        BlendState {
            enabled: extract(word, BLEND_ENABLE.0, BLEND_ENABLE.1) != 0,
            color_write_mask: extract(word, WRITE_MASK.0, WRITE_MASK.1) as u8,
        }
    }
}
