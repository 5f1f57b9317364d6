//! Per-stage emission state
//!
//! Builds the declarations a stage needs before any instruction is emitted:
//! the stage input and output structs, entry point resource parameters with
//! their argument table slots, constants and helper functions. Instruction
//! rules then append statements to [`EmitContext::code`].

use super::var_alloc::{VarAlloc, VarType};
use crate::bindings::{
    Bindings, IMAGE_TEXTURE_SLOT_BASE, MAX_IMAGES, MAX_STORAGE_BUFFERS, MAX_TEXTURES,
    MAX_UNIFORM_BUFFERS, RENDER_AREA_BUFFER_SLOT, SCALING_BUFFER_SLOT, STORAGE_BUFFER_SLOT_BASE,
};
use crate::ir::{Attribute, Info, InstArena, InstId, Value, NUM_GENERICS, NUM_RENDER_TARGETS};
use crate::profile::{Profile, RuntimeInfo};
use crate::types::{Interpolation, Stage, TextureType};
use oc_core::ShaderError;
use std::fmt::Write;

/// Constant buffer length granularity, in `float4` elements
const CBUF_LENGTH_GRANULARITY: u32 = 4;
/// `float4` elements declared for constant buffers reachable through global memory
const UNBOUNDED_CBUF_LENGTH: u32 = 0x1000;

/// Slot of a bound texture or image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDefinition {
    pub binding: u32,
    pub count: u32,
}

/// Where stores to one generic output component land
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenericElementInfo {
    pub name: String,
    pub first_element: u32,
    pub num_components: u32,
}

/// Resource name prefix for a stage's entry point qualifier
pub fn stage_name(stage: Stage) -> &'static str {
    match stage {
        Stage::VertexA | Stage::VertexB | Stage::TessellationEval | Stage::Geometry => "vertex",
        Stage::TessellationControl | Stage::Compute => "kernel",
        Stage::Fragment => "fragment",
    }
}

fn round_up(value: u32, granularity: u32) -> u32 {
    value.div_ceil(granularity) * granularity
}

fn swizzle(offset: u32) -> char {
    ['x', 'y', 'z', 'w'][((offset / 4) % 4) as usize]
}

fn interpolation_decorator(interpolation: Interpolation) -> &'static str {
    match interpolation {
        Interpolation::Smooth => "",
        Interpolation::Flat => " [[flat]]",
        Interpolation::NoPerspective => " [[center_no_perspective]]",
    }
}

fn color_texture_type(ty: TextureType, is_multisample: bool) -> Result<&'static str, ShaderError> {
    if is_multisample {
        return match ty {
            TextureType::Color2D | TextureType::Color2DRect => Ok("texture2d_ms<float>"),
            TextureType::ColorArray2D => Ok("texture2d_ms_array<float>"),
            other => Err(ShaderError::InvalidArgument(format!(
                "multisampled {other:?} texture"
            ))),
        };
    }
    Ok(match ty {
        TextureType::Color1D => "texture1d<float>",
        TextureType::ColorArray1D => "texture1d_array<float>",
        TextureType::Color2D | TextureType::Color2DRect => "texture2d<float>",
        TextureType::ColorArray2D => "texture2d_array<float>",
        TextureType::Color3D => "texture3d<float>",
        TextureType::ColorCube => "texturecube<float>",
        TextureType::ColorArrayCube => "texturecube_array<float>",
        TextureType::Buffer => "texture_buffer<float>",
    })
}

fn depth_texture_type(ty: TextureType, is_multisample: bool) -> Result<&'static str, ShaderError> {
    match (ty, is_multisample) {
        (TextureType::Color2D | TextureType::Color2DRect, false) => Ok("depth2d<float>"),
        (TextureType::Color2D | TextureType::Color2DRect, true) => Ok("depth2d_ms<float>"),
        (TextureType::ColorArray2D, false) => Ok("depth2d_array<float>"),
        (TextureType::ColorArray2D, true) => Ok("depth2d_ms_array<float>"),
        (TextureType::ColorCube, false) => Ok("depthcube<float>"),
        (TextureType::ColorArrayCube, false) => Ok("depthcube_array<float>"),
        (other, _) => Err(ShaderError::not_implemented(format!(
            "depth texture type {other:?}"
        ))),
    }
}

fn image_texture_type(ty: TextureType) -> &'static str {
    match ty {
        TextureType::Color1D => "texture1d",
        TextureType::ColorArray1D => "texture1d_array",
        TextureType::Color2D | TextureType::Color2DRect => "texture2d",
        TextureType::ColorArray2D => "texture2d_array",
        TextureType::Color3D => "texture3d",
        TextureType::ColorCube => "texturecube",
        TextureType::ColorArrayCube => "texturecube_array",
        TextureType::Buffer => "texture_buffer",
    }
}

fn image_access(is_written: bool, is_read: bool) -> &'static str {
    match (is_written, is_read) {
        (true, true) => "access::read_write",
        (true, false) => "access::write",
        _ => "access::read",
    }
}

fn single_binding(kind: &str, count: u32) -> Result<(), ShaderError> {
    if count > 1 {
        return Err(ShaderError::not_implemented(format!("{kind} arrays")));
    }
    Ok(())
}

fn claim_slots(counter: &mut u32, count: u32, limit: u32, kind: &str) -> Result<u32, ShaderError> {
    let slot = *counter;
    if slot + count > limit {
        return Err(ShaderError::not_implemented(format!(
            "{kind} slots exhausted ({} of {limit})",
            slot + count
        )));
    }
    *counter += count;
    Ok(slot)
}

/// State for emitting one stage
pub struct EmitContext<'a> {
    pub insts: &'a mut InstArena,
    pub info: &'a Info,
    pub profile: &'a Profile,
    pub runtime_info: &'a RuntimeInfo,
    pub var_alloc: VarAlloc,

    /// Structs, constants and helper functions
    pub header: String,
    /// Entry point body
    pub code: String,
    /// Entry point parameters
    pub params: Vec<String>,

    pub stage: Stage,
    pub stage_name: &'static str,

    pub texture_buffers: Vec<TextureDefinition>,
    pub image_buffers: Vec<TextureDefinition>,
    pub textures: Vec<TextureDefinition>,
    pub images: Vec<TextureDefinition>,
    pub output_generics: [[GenericElementInfo; 4]; NUM_GENERICS],
    pub input_generics: [bool; NUM_GENERICS],

    pub num_safety_loop_vars: u32,
    /// `__Input __in [[stage_in]]` is a parameter
    pub has_stage_input: bool,
    /// The entry point returns `__Output`
    pub has_output: bool,
    pub stores_point_size: bool,
    pub uses_geometry_passthrough: bool,

    /// Buffer arguments forwarded to the global memory helpers
    pub global_memory_args: String,
    /// Base and size locals of buffers reachable through global memory
    pub global_memory_locals: String,
}

impl<'a> EmitContext<'a> {
    pub fn new(
        insts: &'a mut InstArena,
        info: &'a Info,
        stage: Stage,
        is_geometry_passthrough: bool,
        bindings: &mut Bindings,
        profile: &'a Profile,
        runtime_info: &'a RuntimeInfo,
    ) -> Result<Self, ShaderError> {
        let mut ctx = Self {
            insts,
            info,
            profile,
            runtime_info,
            var_alloc: VarAlloc::new(),
            header: String::new(),
            code: String::new(),
            params: Vec::new(),
            stage,
            stage_name: stage_name(stage),
            texture_buffers: Vec::new(),
            image_buffers: Vec::new(),
            textures: Vec::new(),
            images: Vec::new(),
            output_generics: Default::default(),
            input_generics: [false; NUM_GENERICS],
            num_safety_loop_vars: 0,
            has_stage_input: false,
            has_output: false,
            stores_point_size: false,
            uses_geometry_passthrough: is_geometry_passthrough
                && profile.support_geometry_shader_passthrough,
            global_memory_args: String::new(),
            global_memory_locals: String::new(),
        };
        ctx.define_input_struct()?;
        ctx.define_output_struct();
        ctx.define_resources(bindings)?;
        ctx.define_builtin_params();
        ctx.define_constants();
        ctx.define_helper_functions();
        Ok(ctx)
    }

    pub fn is_kernel(&self) -> bool {
        self.stage_name == "kernel"
    }

    /// Append one statement line to the body
    pub fn add(&mut self, line: impl AsRef<str>) {
        self.code.push_str(line.as_ref());
        self.code.push('\n');
    }

    pub fn arg(&self, inst: InstId, index: usize) -> Value {
        self.insts[inst].arg(index)
    }

    pub fn consume(&mut self, value: &Value) -> String {
        self.var_alloc.consume(self.insts, value)
    }

    pub fn consume_arg(&mut self, inst: InstId, index: usize) -> String {
        let value = self.arg(inst, index);
        self.consume(&value)
    }

    /// Consume the first `N` arguments, left to right
    pub fn consume_args<const N: usize>(&mut self, inst: InstId) -> [String; N] {
        std::array::from_fn(|index| self.consume_arg(inst, index))
    }

    /// Name for the result of `inst`, falling back to the `t` temporary
    pub fn define(&mut self, inst: InstId, ty: VarType) -> String {
        self.var_alloc.define(self.insts, inst, ty)
    }

    /// Assign `rhs` to a fresh variable, or evaluate it alone when unused
    pub fn add_define(&mut self, inst: InstId, ty: VarType, rhs: &str) {
        match self.var_alloc.add_define(self.insts, inst, ty) {
            Some(var) => self.add(format!("{var}={rhs};")),
            None => self.add(format!("{rhs};")),
        }
    }

    /// Name of constant buffer `index` for this stage
    pub fn cbuf_name(&self, index: u32) -> String {
        format!("{}_cbuf{}", self.stage_name, index)
    }

    /// Trailing statement of the entry point
    pub fn return_statement(&self) -> &'static str {
        if self.has_output {
            "return __out;"
        } else {
            "return;"
        }
    }

    fn define_input_struct(&mut self) -> Result<(), ShaderError> {
        let mut fields = String::new();
        match self.stage {
            Stage::VertexA | Stage::VertexB => {
                for index in 0..NUM_GENERICS {
                    if self.info.loads.generic(index) {
                        let _ = writeln!(fields, "float4 attr{index} [[attribute({index})]];");
                        self.input_generics[index] = true;
                    }
                }
            }
            Stage::Fragment => {
                fields.push_str("float4 position [[position]];\n");
                for index in 0..NUM_GENERICS {
                    if !self.info.loads.generic(index)
                        || !self.runtime_info.previous_stage_stores.generic(index)
                    {
                        continue;
                    }
                    let _ = writeln!(
                        fields,
                        "float4 attr{index} [[user(locn{index})]]{};",
                        interpolation_decorator(self.info.interpolation[index])
                    );
                    self.input_generics[index] = true;
                }
            }
            Stage::TessellationControl
            | Stage::TessellationEval
            | Stage::Geometry
            | Stage::Compute => {
                if self.info.loads.any_generic() {
                    return Err(ShaderError::not_implemented(format!(
                        "generic inputs in {} programs",
                        self.stage.name()
                    )));
                }
            }
        }
        if !fields.is_empty() {
            let _ = write!(self.header, "struct __Input{{\n{fields}}};\n");
            self.params.push("__Input __in [[stage_in]]".to_string());
            self.has_stage_input = true;
        }
        Ok(())
    }

    fn define_generic_output(&mut self, index: usize, fields: &mut String) {
        let name = format!("attr{index}");
        let _ = writeln!(fields, "float4 {name} [[user(locn{index})]];");
        let element_info = GenericElementInfo {
            name: format!("__out.{name}"),
            first_element: 0,
            num_components: 4,
        };
        self.output_generics[index] = std::array::from_fn(|_| element_info.clone());
    }

    fn define_output_struct(&mut self) {
        let mut fields = String::new();
        if self.stage.is_vertex_like() {
            fields.push_str("float4 position [[position]];\n");
            for index in 0..NUM_GENERICS {
                if self.info.stores.generic(index) {
                    self.define_generic_output(index, &mut fields);
                }
            }
            self.stores_point_size = self.info.stores.get(Attribute::POINT_SIZE)
                || self.runtime_info.fixed_state_point_size.is_some();
            if self.stores_point_size {
                fields.push_str("float point_size [[point_size]];\n");
            }
            if self.info.stores.get(Attribute::LAYER) {
                fields.push_str("uint layer [[render_target_array_index]];\n");
            }
            if self.info.stores.get(Attribute::VIEWPORT_INDEX) {
                fields.push_str("uint viewport_index [[viewport_array_index]];\n");
            }
        } else if self.stage == Stage::Fragment {
            for index in 0..NUM_RENDER_TARGETS {
                if self.info.stores_frag_color[index] || self.profile.need_declared_frag_colors {
                    let _ = writeln!(fields, "float4 color{index} [[color({index})]];");
                }
            }
            if self.info.stores_frag_depth {
                fields.push_str("float depth [[depth(any)]];\n");
            }
            if self.info.stores_sample_mask {
                fields.push_str("uint sample_mask [[sample_mask]];\n");
            }
        }
        if !fields.is_empty() {
            let _ = write!(self.header, "struct __Output{{\n{fields}}};\n");
            self.has_output = true;
        }
    }

    fn define_resources(&mut self, bindings: &mut Bindings) -> Result<(), ShaderError> {
        let info = self.info;
        let name = self.stage_name;

        for desc in &info.constant_buffer_descriptors {
            single_binding("constant buffer", desc.count)?;
            let slot = claim_slots(
                &mut bindings.uniform_buffer,
                desc.count,
                MAX_UNIFORM_BUFFERS,
                "constant buffer",
            )?;
            let length = if info.uses_global_memory {
                UNBOUNDED_CBUF_LENGTH
            } else {
                let used = info.constant_buffer_used_sizes[desc.index as usize];
                round_up(used.div_ceil(16).max(1), CBUF_LENGTH_GRANULARITY)
            };
            self.params.push(format!(
                "constant array<float4,{length}>& {name}_cbuf{} [[buffer({slot})]]",
                desc.index
            ));
        }

        for (index, desc) in info.storage_buffers_descriptors.iter().enumerate() {
            single_binding("storage buffer", desc.count)?;
            let slot = claim_slots(
                &mut bindings.storage_buffer,
                desc.count,
                MAX_STORAGE_BUFFERS,
                "storage buffer",
            )?;
            self.params.push(format!(
                "device uint* {name}_ssbo{index} [[buffer({})]]",
                STORAGE_BUFFER_SLOT_BASE + slot
            ));
        }

        for desc in &info.image_buffer_descriptors {
            single_binding("image buffer", desc.count)?;
            let slot = claim_slots(&mut bindings.image, desc.count, MAX_IMAGES, "image")?;
            self.image_buffers.push(TextureDefinition {
                binding: slot,
                count: desc.count,
            });
            self.params.push(format!(
                "texture_buffer<uint, {}> {name}_imgbuf{slot} [[texture({})]]",
                image_access(desc.is_written, desc.is_read),
                IMAGE_TEXTURE_SLOT_BASE + slot
            ));
        }

        for desc in &info.image_descriptors {
            single_binding("image", desc.count)?;
            let slot = claim_slots(&mut bindings.image, desc.count, MAX_IMAGES, "image")?;
            self.images.push(TextureDefinition {
                binding: slot,
                count: desc.count,
            });
            self.params.push(format!(
                "{}<uint, {}> {name}_img{slot} [[texture({})]]",
                image_texture_type(desc.ty),
                image_access(desc.is_written, desc.is_read),
                IMAGE_TEXTURE_SLOT_BASE + slot
            ));
        }

        for desc in &info.texture_buffer_descriptors {
            single_binding("texture buffer", desc.count)?;
            let slot = claim_slots(&mut bindings.texture, desc.count, MAX_TEXTURES, "texture")?;
            self.texture_buffers.push(TextureDefinition {
                binding: slot,
                count: desc.count,
            });
            self.params.push(format!(
                "texture_buffer<float> {name}_texbuf{slot} [[texture({slot})]]"
            ));
        }

        for desc in &info.texture_descriptors {
            single_binding("texture", desc.count)?;
            let texture_type = if desc.is_depth {
                depth_texture_type(desc.ty, desc.is_multisample)?
            } else {
                color_texture_type(desc.ty, desc.is_multisample)?
            };
            let slot = claim_slots(&mut bindings.texture, desc.count, MAX_TEXTURES, "texture")?;
            self.textures.push(TextureDefinition {
                binding: slot,
                count: desc.count,
            });
            self.params.push(format!(
                "{texture_type} {name}_tex{slot} [[texture({slot})]]"
            ));
            self.params
                .push(format!("sampler {name}_samp{slot} [[sampler({slot})]]"));
        }
        Ok(())
    }

    fn define_builtin_params(&mut self) {
        let info = self.info;
        match self.stage {
            Stage::VertexA | Stage::VertexB => {
                if info.loads.get(Attribute::VERTEX_ID) {
                    self.params.push("uint __vertex_id [[vertex_id]]".to_string());
                }
                if info.loads.get(Attribute::INSTANCE_ID) {
                    self.params.push("uint __instance_id [[instance_id]]".to_string());
                }
            }
            Stage::Fragment => {
                if info.loads.get(Attribute::FRONT_FACE) {
                    self.params.push("bool __front_facing [[front_facing]]".to_string());
                }
                if info.uses_sample_id {
                    self.params.push("uint __sample_id [[sample_id]]".to_string());
                }
            }
            Stage::Compute | Stage::TessellationControl => {
                if info.uses_local_invocation_id {
                    self.params.push(
                        "uint3 __local_invocation_id [[thread_position_in_threadgroup]]"
                            .to_string(),
                    );
                }
                if info.uses_workgroup_id {
                    self.params
                        .push("uint3 __workgroup_id [[threadgroup_position_in_grid]]".to_string());
                }
            }
            Stage::TessellationEval | Stage::Geometry => {}
        }
        if info.uses_fswzadd || info.uses_subgroup_shuffles {
            self.params
                .push("uint __lane [[thread_index_in_simdgroup]]".to_string());
        }
        if info.uses_rescaling_uniform {
            self.params.push(format!(
                "constant float4& scaling [[buffer({SCALING_BUFFER_SLOT})]]"
            ));
        }
        if info.uses_render_area {
            self.params.push(format!(
                "constant float4& render_area [[buffer({RENDER_AREA_BUFFER_SLOT})]]"
            ));
        }
    }

    fn define_constants(&mut self) {
        if self.info.uses_fswzadd {
            self.header.push_str(
                "constant float FSWZ_A[4]={-1.f,1.f,-1.f,0.f};\n\
                 constant float FSWZ_B[4]={-1.f,-1.f,1.f,-1.f};\n",
            );
        }
    }

    fn define_helper_functions(&mut self) {
        let info = self.info;
        let header = &mut self.header;
        if info.uses_global_increment || info.uses_shared_increment {
            header.push_str("uint CasIncrement(uint op_a,uint op_b){return op_a>=op_b?0u:(op_a+1u);}\n");
        }
        if info.uses_global_decrement || info.uses_shared_decrement {
            header.push_str(
                "uint CasDecrement(uint op_a,uint op_b){return op_a==0||op_a>op_b?op_b:(op_a-1u);}\n",
            );
        }
        if info.uses_atomic_f32_add {
            header.push_str(
                "uint CasFloatAdd(uint op_a,float op_b){return as_type<uint>(as_type<float>(op_a)+op_b);}\n",
            );
        }
        if info.uses_atomic_f32x2_add {
            header.push_str(
                "uint CasFloatAdd32x2(uint op_a,float2 op_b){\
                 return as_type<uint>(half2(float2(as_type<half2>(op_a))+op_b));}\n",
            );
        }
        if info.uses_atomic_f32x2_min {
            header.push_str(
                "uint CasFloatMin32x2(uint op_a,float2 op_b){\
                 return as_type<uint>(half2(min(float2(as_type<half2>(op_a)),op_b)));}\n",
            );
        }
        if info.uses_atomic_f32x2_max {
            header.push_str(
                "uint CasFloatMax32x2(uint op_a,float2 op_b){\
                 return as_type<uint>(half2(max(float2(as_type<half2>(op_a)),op_b)));}\n",
            );
        }
        if info.uses_atomic_f16x2_add {
            header.push_str(
                "uint CasFloatAdd16x2(uint op_a,half2 op_b){return as_type<uint>(as_type<half2>(op_a)+op_b);}\n",
            );
        }
        if info.uses_atomic_f16x2_min {
            header.push_str(
                "uint CasFloatMin16x2(uint op_a,half2 op_b){return as_type<uint>(min(as_type<half2>(op_a),op_b));}\n",
            );
        }
        if info.uses_atomic_f16x2_max {
            header.push_str(
                "uint CasFloatMax16x2(uint op_a,half2 op_b){return as_type<uint>(max(as_type<half2>(op_a),op_b));}\n",
            );
        }
        if info.uses_global_memory && self.profile.support_int64 {
            self.define_global_memory_functions();
        }
        if info.loads_indexed_attributes {
            self.define_indexed_attribute_load();
        }
    }

    /// Global memory is resolved by testing the address against every
    /// storage buffer flagged for it, highest index first.
    fn define_global_memory_functions(&mut self) {
        let info = self.info;
        let name = self.stage_name;
        let align_mask = !(self.profile.min_ssbo_alignment.max(1) - 1);
        let buffers: Vec<usize> = (0..info.storage_buffers_descriptors.len())
            .rev()
            .filter(|index| info.is_global_storage_buffer(*index))
            .collect();

        let mut params = String::new();
        for &index in &buffers {
            let ssbo = &info.storage_buffers_descriptors[index];
            let cbuf = self.cbuf_name(ssbo.cbuf_index);
            let word = |offset: u32| {
                format!("as_type<uint>({cbuf}[{}].{})", offset / 16, swizzle(offset))
            };
            let _ = writeln!(
                self.global_memory_locals,
                "ulong ssbo_addr{index}=as_type<ulong>(uint2({}&{align_mask}u,{}));\
                 ulong ssbo_size{index}=as_type<ulong>(uint2({},{}));",
                word(ssbo.cbuf_offset),
                word(ssbo.cbuf_offset + 4),
                word(ssbo.cbuf_offset + 8),
                word(ssbo.cbuf_offset + 12),
            );
            let _ = write!(
                params,
                ",device uint* ssbo{index},ulong ssbo_addr{index},ulong ssbo_size{index}"
            );
            let _ = write!(
                self.global_memory_args,
                ",{name}_ssbo{index},ssbo_addr{index},ssbo_size{index}"
            );
        }

        let define = |signature: &str, body: &dyn Fn(usize) -> String, fallback: &str| {
            let mut func = format!("{signature}{params}){{");
            for &index in &buffers {
                let _ = write!(
                    func,
                    "if(addr>=ssbo_addr{index}&&addr<ssbo_addr{index}+ssbo_size{index}){{{}}}",
                    body(index)
                );
            }
            func.push_str(fallback);
            func.push_str("}\n");
            func
        };
        let word = |index: usize, offset: u32| {
            if offset == 0 {
                format!("ssbo{index}[uint(addr-ssbo_addr{index})>>2]")
            } else {
                format!("ssbo{index}[uint(addr-ssbo_addr{index}+{offset})>>2]")
            }
        };

        let functions = [
            define(
                "void WriteGlobal32(ulong addr,uint data",
                &|i| format!("{}=data;return;", word(i, 0)),
                "",
            ),
            define(
                "void WriteGlobal64(ulong addr,uint2 data",
                &|i| format!("{}=data.x;{}=data.y;return;", word(i, 0), word(i, 4)),
                "",
            ),
            define(
                "void WriteGlobal128(ulong addr,uint4 data",
                &|i| {
                    format!(
                        "{}=data.x;{}=data.y;{}=data.z;{}=data.w;return;",
                        word(i, 0),
                        word(i, 4),
                        word(i, 8),
                        word(i, 12)
                    )
                },
                "",
            ),
            define(
                "uint LoadGlobal32(ulong addr",
                &|i| format!("return {};", word(i, 0)),
                "return 0u;",
            ),
            define(
                "uint2 LoadGlobal64(ulong addr",
                &|i| format!("return uint2({},{});", word(i, 0), word(i, 4)),
                "return uint2(0);",
            ),
            define(
                "uint4 LoadGlobal128(ulong addr",
                &|i| {
                    format!(
                        "return uint4({},{},{},{});",
                        word(i, 0),
                        word(i, 4),
                        word(i, 8),
                        word(i, 12)
                    )
                },
                "return uint4(0);",
            ),
        ];
        for func in functions {
            self.header.push_str(&func);
        }
    }

    /// Dynamic attribute loads switch over every input the stage declares
    fn define_indexed_attribute_load(&mut self) {
        let param = if self.has_stage_input {
            ",thread const __Input& __in"
        } else {
            ""
        };
        let mut func = format!(
            "float IndexedAttrLoad(int offset{param}){{int base_index=offset>>2;\
             uint masked_index=uint(base_index)&3u;switch(base_index>>2){{"
        );
        if self.stage == Stage::Fragment && self.info.loads.any_component(Attribute::POSITION_X) {
            let _ = write!(
                func,
                "case {}:return __in.position[masked_index];",
                Attribute::POSITION_X.0 >> 2
            );
        }
        let base = u32::from(Attribute::GENERIC0_X.0 >> 2);
        for index in 0..NUM_GENERICS {
            if self.input_generics[index] {
                let _ = write!(
                    func,
                    "case {}:return __in.attr{index}[masked_index];",
                    base + index as u32
                );
            }
        }
        func.push_str("default:return 0.0f;}}\n");
        self.header.push_str(&func);
    }

    /// Arguments forwarded to `IndexedAttrLoad` after the offset
    pub fn indexed_attribute_args(&self) -> &'static str {
        if self.has_stage_input {
            ",__in"
        } else {
            ""
        }
    }
}
