//! Variable allocator for emitted MSL
//!
//! Every instruction result lives in a named temporary such as `u_3` or `f4_0`.
//! Slots are reference counted through the instruction use counts: a slot is
//! released the moment its last use is consumed and the lowest free slot of a
//! type is always handed out first, so the emitted text is deterministic.

use crate::ir::{InstArena, InstId, Type, Value};

/// Storage type of a temporary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VarType {
    U1,
    F16x2,
    U32,
    F32,
    U64,
    F64,
    U32x2,
    F32x2,
    U32x3,
    F32x3,
    U32x4,
    F32x4,
    PrecF32,
    PrecF64,
}

impl VarType {
    /// Every type, in declaration order
    pub const ALL: [VarType; 14] = [
        VarType::U1,
        VarType::F16x2,
        VarType::U32,
        VarType::F32,
        VarType::U64,
        VarType::F64,
        VarType::U32x2,
        VarType::F32x2,
        VarType::U32x3,
        VarType::F32x3,
        VarType::U32x4,
        VarType::F32x4,
        VarType::PrecF32,
        VarType::PrecF64,
    ];

    /// Storage type of an IR type, `None` when the backend has no temporaries for it
    pub fn from_ir(ty: Type) -> Option<VarType> {
        Some(match ty {
            Type::U1 => VarType::U1,
            Type::U32 => VarType::U32,
            Type::U64 => VarType::U64,
            Type::F32 => VarType::F32,
            Type::F64 => VarType::F64,
            Type::U32x2 => VarType::U32x2,
            Type::U32x3 => VarType::U32x3,
            Type::U32x4 => VarType::U32x4,
            Type::F16x2 => VarType::F16x2,
            Type::F32x2 => VarType::F32x2,
            Type::F32x3 => VarType::F32x3,
            Type::F32x4 => VarType::F32x4,
            Type::Void
            | Type::Opaque
            | Type::Attribute
            | Type::U8
            | Type::U16
            | Type::F16 => return None,
        })
    }

    pub fn prefix(self) -> &'static str {
        match self {
            VarType::U1 => "b_",
            VarType::F16x2 => "f16x2_",
            VarType::U32 => "u_",
            VarType::F32 => "f_",
            VarType::U64 => "u64_",
            VarType::F64 => "d_",
            VarType::U32x2 => "u2_",
            VarType::F32x2 => "f2_",
            VarType::U32x3 => "u3_",
            VarType::F32x3 => "f3_",
            VarType::U32x4 => "u4_",
            VarType::F32x4 => "f4_",
            VarType::PrecF32 => "pf_",
            VarType::PrecF64 => "pd_",
        }
    }

    /// MSL spelling of the type
    pub fn msl_type(self) -> &'static str {
        match self {
            VarType::U1 => "bool",
            VarType::F16x2 => "half2",
            VarType::U32 => "uint",
            VarType::F32 | VarType::PrecF32 => "float",
            VarType::U64 => "ulong",
            VarType::F64 | VarType::PrecF64 => "double",
            VarType::U32x2 => "uint2",
            VarType::F32x2 => "float2",
            VarType::U32x3 => "uint3",
            VarType::F32x3 => "float3",
            VarType::U32x4 => "uint4",
            VarType::F32x4 => "float4",
        }
    }

    fn tag(self) -> u32 {
        self as u32
    }
}

/// Temporary assigned to an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId {
    pub valid: bool,
    pub ty: VarType,
    pub index: u32,
}

const VALID_BIT: u32 = 1;
const TYPE_SHIFT: u32 = 1;
const TYPE_MASK: u32 = 0xf;
const INDEX_SHIFT: u32 = 5;

impl From<VarId> for u32 {
    fn from(id: VarId) -> u32 {
        u32::from(id.valid) | (id.ty.tag() << TYPE_SHIFT) | (id.index << INDEX_SHIFT)
    }
}

impl From<u32> for VarId {
    fn from(raw: u32) -> VarId {
        let tag = ((raw >> TYPE_SHIFT) & TYPE_MASK) as usize;
        let Some(&ty) = VarType::ALL.get(tag) else {
            panic!("corrupt variable tag {tag}");
        };
        VarId {
            valid: raw & VALID_BIT != 0,
            ty,
            index: raw >> INDEX_SHIFT,
        }
    }
}

/// Slot usage of one [`VarType`]
#[derive(Debug, Clone, Default)]
pub struct UseTracker {
    /// A discarded result of this type was written to the `t` temporary
    pub uses_temp: bool,
    /// Slots ever handed out; all of them get declared
    pub num_used: u32,
    var_use: Vec<bool>,
}

impl UseTracker {
    pub fn is_live(&self, index: u32) -> bool {
        self.var_use.get(index as usize).copied().unwrap_or(false)
    }

    pub fn live_count(&self) -> usize {
        self.var_use.iter().filter(|used| **used).count()
    }
}

/// Per-stage allocator, one tracker per [`VarType`]
#[derive(Debug, Clone, Default)]
pub struct VarAlloc {
    trackers: [UseTracker; VarType::ALL.len()],
}

impl VarAlloc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn use_tracker(&self, ty: VarType) -> &UseTracker {
        &self.trackers[ty as usize]
    }

    pub fn representation(&self, id: VarId) -> String {
        format!("{}{}", id.ty.prefix(), id.index)
    }

    /// Name of the result of `inst`.
    ///
    /// Results nobody reads go to the shared `t` temporary of the type.
    pub fn define(&mut self, insts: &mut InstArena, inst: InstId, ty: VarType) -> String {
        if insts[inst].has_uses() {
            let id = self.alloc(ty);
            insts[inst].set_definition(id.into());
            self.representation(id)
        } else {
            let id = VarId {
                valid: false,
                ty,
                index: 0,
            };
            self.trackers[ty as usize].uses_temp = true;
            insts[inst].set_definition(id.into());
            format!("t{}", self.representation(id))
        }
    }

    /// Like [`define`](Self::define), but `None` when the result is unused so
    /// the caller can drop the assignment.
    pub fn add_define(&mut self, insts: &mut InstArena, inst: InstId, ty: VarType) -> Option<String> {
        if !insts[inst].has_uses() {
            return None;
        }
        let id = self.alloc(ty);
        insts[inst].set_definition(id.into());
        Some(self.representation(id))
    }

    /// Text of `value`, dropping one use when it refers to an instruction
    pub fn consume(&mut self, insts: &mut InstArena, value: &Value) -> String {
        match value {
            Value::Inst(id) => self.consume_inst(insts, *id),
            other => format_immediate(other),
        }
    }

    pub fn consume_inst(&mut self, insts: &mut InstArena, inst: InstId) -> String {
        let target = &mut insts[inst];
        target.remove_use();
        let id = VarId::from(target.definition());
        if !target.has_uses() {
            self.free(id);
        }
        self.representation(id)
    }

    fn alloc(&mut self, ty: VarType) -> VarId {
        let tracker = &mut self.trackers[ty as usize];
        let index = match tracker.var_use.iter().position(|used| !used) {
            Some(free) => {
                tracker.var_use[free] = true;
                free
            }
            None => {
                tracker.var_use.push(true);
                tracker.var_use.len() - 1
            }
        };
        tracker.num_used = tracker.num_used.max(index as u32 + 1);
        VarId {
            valid: true,
            ty,
            index: index as u32,
        }
    }

    fn free(&mut self, id: VarId) {
        assert!(id.valid, "freeing invalid variable {}", self.representation(id));
        self.trackers[id.ty as usize].var_use[id.index as usize] = false;
    }
}

/// MSL literal for an immediate
pub fn format_immediate(value: &Value) -> String {
    match value {
        Value::Void => String::new(),
        Value::U1(v) => v.to_string(),
        Value::U32(v) => format!("{v}u"),
        Value::U64(v) => format!("{v}ul"),
        Value::F32(v) => format_f32(*v),
        Value::F64(v) => format_f64(*v),
        Value::Attribute(attr) => panic!("attribute {attr} used as an operand"),
        Value::Inst(_) => unreachable!("instruction reference is not an immediate"),
    }
}

fn format_f32(value: f32) -> String {
    if !value.is_finite() {
        return format!("as_type<float>(0x{:08x}u)", value.to_bits());
    }
    // Debug output is the shortest text that parses back to the same bits
    format!("{value:?}f")
}

fn format_f64(value: f64) -> String {
    if !value.is_finite() {
        return format!("as_type<double>(0x{:016x}ul)", value.to_bits());
    }
    format!("{value:?}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Opcode, Program};
    use crate::types::Stage;
    use proptest::prelude::*;

    fn program_with_users(uses: u32) -> (Program, InstId) {
        let mut program = Program::new(Stage::Compute);
        let block = program.add_block();
        let inst = program.append_inst(block, Opcode::UndefU32, vec![]);
        for _ in 0..uses {
            program.append_inst(block, Opcode::Reference, vec![inst.into()]);
        }
        (program, inst)
    }

    #[test]
    fn test_var_id_packing() {
        let id = VarId {
            valid: true,
            ty: VarType::F32x4,
            index: 1234,
        };
        let raw: u32 = id.into();
        assert_eq!(VarId::from(raw), id);
        assert!(!VarId::from(0).valid);
    }

    #[test]
    fn test_define_without_uses_goes_to_temp() {
        let (mut program, inst) = program_with_users(0);
        let mut alloc = VarAlloc::new();
        assert_eq!(alloc.define(&mut program.insts, inst, VarType::U32), "tu_0");
        assert!(alloc.use_tracker(VarType::U32).uses_temp);
        assert_eq!(alloc.use_tracker(VarType::U32).num_used, 0);
        assert_eq!(alloc.add_define(&mut program.insts, inst, VarType::U32), None);
    }

    #[test]
    fn test_lowest_free_slot_is_reused() {
        let mut program = Program::new(Stage::Compute);
        let block = program.add_block();
        let ids: Vec<InstId> = (0..3)
            .map(|_| program.append_inst(block, Opcode::UndefU32, vec![]))
            .collect();
        for id in &ids {
            program.append_inst(block, Opcode::Reference, vec![(*id).into()]);
        }
        let extra = program.append_inst(block, Opcode::UndefU32, vec![]);
        program.append_inst(block, Opcode::Reference, vec![extra.into()]);

        let mut alloc = VarAlloc::new();
        let insts = &mut program.insts;
        assert_eq!(alloc.define(insts, ids[0], VarType::U32), "u_0");
        assert_eq!(alloc.define(insts, ids[1], VarType::U32), "u_1");
        assert_eq!(alloc.define(insts, ids[2], VarType::U32), "u_2");
        assert_eq!(alloc.consume(insts, &ids[1].into()), "u_1");
        assert_eq!(alloc.consume(insts, &ids[0].into()), "u_0");
        assert_eq!(alloc.define(insts, extra, VarType::U32), "u_0");
        assert_eq!(alloc.use_tracker(VarType::U32).num_used, 3);
    }

    #[test]
    fn test_types_have_independent_slots() {
        let (mut program, a) = program_with_users(1);
        let block = program.block_order[0];
        let b = program.append_inst(block, Opcode::UndefU1, vec![]);
        program.append_inst(block, Opcode::Reference, vec![b.into()]);
        let mut alloc = VarAlloc::new();
        assert_eq!(alloc.define(&mut program.insts, a, VarType::U32), "u_0");
        assert_eq!(alloc.define(&mut program.insts, b, VarType::U1), "b_0");
    }

    #[test]
    #[should_panic(expected = "freeing invalid variable")]
    fn test_consuming_undefined_last_use_panics() {
        let (mut program, inst) = program_with_users(1);
        VarAlloc::new().consume(&mut program.insts, &inst.into());
    }

    #[test]
    #[should_panic(expected = "corrupt variable tag 15")]
    fn test_corrupt_packed_id_panics() {
        let raw = VALID_BIT | (15 << TYPE_SHIFT) | (3 << INDEX_SHIFT);
        let _ = VarId::from(raw);
    }

    #[test]
    fn test_packed_id_keeps_type() {
        let id = VarId {
            valid: true,
            ty: VarType::F32,
            index: 9,
        };
        assert_eq!(VarId::from(u32::from(id)), id);
    }

    #[test]
    fn test_immediates() {
        assert_eq!(format_immediate(&Value::U1(true)), "true");
        assert_eq!(format_immediate(&Value::U32(7)), "7u");
        assert_eq!(format_immediate(&Value::U64(1 << 40)), "1099511627776ul");
        assert_eq!(format_immediate(&Value::F32(1.0)), "1.0f");
        assert_eq!(format_immediate(&Value::F32(-0.5)), "-0.5f");
        assert_eq!(format_immediate(&Value::F32(1e-7)), "1e-7f");
        assert_eq!(format_immediate(&Value::F64(2.0)), "2.0");
        assert_eq!(
            format_immediate(&Value::F32(f32::INFINITY)),
            "as_type<float>(0x7f800000u)"
        );
        assert_eq!(
            format_immediate(&Value::F32(f32::NEG_INFINITY)),
            "as_type<float>(0xff800000u)"
        );
        assert_eq!(format_immediate(&Value::Void), "");
    }

    fn parse_f32_literal(text: &str) -> u32 {
        if let Some(hex) = text
            .strip_prefix("as_type<float>(0x")
            .and_then(|rest| rest.strip_suffix("u)"))
        {
            return u32::from_str_radix(hex, 16).unwrap();
        }
        let number = text.strip_suffix('f').unwrap();
        assert!(number.contains('.') || number.contains('e'), "{text}");
        number.parse::<f32>().unwrap().to_bits()
    }

    proptest! {
        #[test]
        fn prop_f32_literal_round_trips(bits in any::<u32>()) {
            let value = f32::from_bits(bits);
            let text = format_immediate(&Value::F32(value));
            prop_assert_eq!(parse_f32_literal(&text), bits);
        }

        #[test]
        fn prop_f64_literal_round_trips(value in any::<f64>().prop_filter("finite", |v| v.is_finite())) {
            let text = format_immediate(&Value::F64(value));
            prop_assert_eq!(text.parse::<f64>().unwrap().to_bits(), value.to_bits());
        }

        /// Random define/consume sequences never hand one live slot to two
        /// instructions and always pick the lowest free index.
        #[test]
        fn prop_live_slots_are_unique(script in proptest::collection::vec((0u32..4, 1u32..4), 1..40)) {
            let mut program = Program::new(Stage::Compute);
            let block = program.add_block();
            let mut pending = Vec::new();
            for (_, uses) in &script {
                let inst = program.append_inst(block, Opcode::UndefU32, vec![]);
                for _ in 0..*uses {
                    program.append_inst(block, Opcode::Reference, vec![inst.into()]);
                }
                pending.push(inst);
            }

            let mut alloc = VarAlloc::new();
            let mut live: Vec<(InstId, u32)> = Vec::new();
            for (inst, (consume_count, _)) in pending.into_iter().zip(&script) {
                let tracker = alloc.use_tracker(VarType::U32);
                let expected = (0..).find(|i| !tracker.is_live(*i)).unwrap();
                let name = alloc.define(&mut program.insts, inst, VarType::U32);
                prop_assert_eq!(name, format!("u_{expected}"));
                prop_assert!(live.iter().all(|(_, index)| *index != expected));
                live.push((inst, expected));

                for _ in 0..*consume_count {
                    if live.is_empty() {
                        break;
                    }
                    let (victim, index) = live[0];
                    let name = alloc.consume(&mut program.insts, &victim.into());
                    prop_assert_eq!(name, format!("u_{index}"));
                    if !program.insts[victim].has_uses() {
                        live.remove(0);
                        prop_assert!(!alloc.use_tracker(VarType::U32).is_live(index));
                    }
                }
                prop_assert_eq!(alloc.use_tracker(VarType::U32).live_count(), live.len());
            }
        }
    }
}
