//! Instruction builder
//!
//! Frontends and passes append instructions through [`IrEmitter`] rather than
//! touching block lists directly, so use counts stay consistent.

use super::attribute::Attribute;
use super::opcodes::Opcode;
use super::program::Program;
use super::ty::Type;
use super::value::{BlockId, InstId, Value};

/// Appends (or inserts) instructions into one block of a program
pub struct IrEmitter<'a> {
    program: &'a mut Program,
    block: BlockId,
    /// Insertion point, `None` appends at the end
    position: Option<usize>,
}

impl<'a> IrEmitter<'a> {
    pub fn new(program: &'a mut Program, block: BlockId) -> Self {
        Self {
            program,
            block,
            position: None,
        }
    }

    /// Emitter that inserts before the instruction at `position`
    pub fn at(program: &'a mut Program, block: BlockId, position: usize) -> Self {
        Self {
            program,
            block,
            position: Some(position),
        }
    }

    pub fn block(&self) -> BlockId {
        self.block
    }

    /// Emit a raw instruction
    pub fn inst(&mut self, opcode: Opcode, args: Vec<Value>) -> InstId {
        match self.position {
            Some(position) => {
                let id = self.program.insert_inst(self.block, position, opcode, args);
                self.position = Some(position + 1);
                id
            }
            None => self.program.append_inst(self.block, opcode, args),
        }
    }

    pub fn prologue(&mut self) {
        self.inst(Opcode::Prologue, vec![]);
    }

    pub fn epilogue(&mut self) {
        self.inst(Opcode::Epilogue, vec![]);
    }

    pub fn phi(&mut self, ty: Type) -> InstId {
        self.program.add_phi(self.block, ty)
    }

    pub fn phi_move(&mut self, phi: InstId, value: Value) {
        self.inst(Opcode::PhiMove, vec![phi.into(), value]);
    }

    pub fn reference(&mut self, value: Value) {
        self.inst(Opcode::Reference, vec![value]);
    }

    pub fn get_cbuf(&mut self, binding: Value, offset: Value) -> InstId {
        self.inst(Opcode::GetCbufF32, vec![binding, offset])
    }

    pub fn get_cbuf_u32(&mut self, binding: Value, offset: Value) -> InstId {
        self.inst(Opcode::GetCbufU32, vec![binding, offset])
    }

    pub fn get_attribute(&mut self, attr: Attribute) -> InstId {
        self.inst(
            Opcode::GetAttribute,
            vec![Value::Attribute(attr), Value::U32(0)],
        )
    }

    pub fn set_attribute(&mut self, attr: Attribute, value: Value) {
        self.inst(
            Opcode::SetAttribute,
            vec![Value::Attribute(attr), value, Value::U32(0)],
        );
    }

    pub fn set_frag_color(&mut self, index: u32, component: u32, value: Value) {
        self.inst(
            Opcode::SetFragColor,
            vec![Value::U32(index), Value::U32(component), value],
        );
    }

    pub fn iadd(&mut self, a: Value, b: Value) -> InstId {
        self.inst(Opcode::IAdd32, vec![a, b])
    }

    pub fn imul(&mut self, a: Value, b: Value) -> InstId {
        self.inst(Opcode::IMul32, vec![a, b])
    }

    pub fn fp_add(&mut self, a: Value, b: Value) -> InstId {
        self.inst(Opcode::FPAdd32, vec![a, b])
    }

    pub fn fp_mul(&mut self, a: Value, b: Value) -> InstId {
        self.inst(Opcode::FPMul32, vec![a, b])
    }

    pub fn less_than(&mut self, a: Value, b: Value) -> InstId {
        self.inst(Opcode::ULessThan, vec![a, b])
    }

    pub fn load_shared(&mut self, offset: Value) -> InstId {
        self.inst(Opcode::LoadSharedU32, vec![offset])
    }

    pub fn write_shared(&mut self, offset: Value, value: Value) {
        self.inst(Opcode::WriteSharedU32, vec![offset, value]);
    }

    pub fn load_storage(&mut self, binding: u32, offset: Value) -> InstId {
        self.inst(Opcode::LoadStorage32, vec![Value::U32(binding), offset])
    }

    pub fn write_storage(&mut self, binding: u32, offset: Value, value: Value) {
        self.inst(
            Opcode::WriteStorage32,
            vec![Value::U32(binding), offset, value],
        );
    }
}
