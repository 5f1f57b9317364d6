//! IR program: instruction arena, blocks and structured control flow

use super::info::Info;
use super::opcodes::Opcode;
use super::ty::Type;
use super::value::{BlockId, InstId, Value};
use crate::types::Stage;
use std::ops::{Index, IndexMut};

/// One IR instruction
#[derive(Debug, Clone)]
pub struct Inst {
    opcode: Opcode,
    args: Vec<Value>,
    /// Predecessor block of each phi operand, parallel to `args`
    phi_blocks: Vec<BlockId>,
    phi_type: Type,
    use_count: u32,
    /// Backend variable stashed by the emitter, 0 while unassigned
    definition: u32,
}

impl Inst {
    pub fn new(opcode: Opcode, args: Vec<Value>) -> Self {
        Self {
            opcode,
            args,
            phi_blocks: Vec::new(),
            phi_type: Type::Void,
            use_count: 0,
            definition: 0,
        }
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn arg(&self, index: usize) -> Value {
        self.args[index]
    }

    pub fn num_args(&self) -> usize {
        self.args.len()
    }

    pub fn phi_block(&self, index: usize) -> BlockId {
        self.phi_blocks[index]
    }

    /// Result type; phis carry the type they were created with
    pub fn result_type(&self) -> Type {
        if self.opcode.is_phi() {
            self.phi_type
        } else {
            self.opcode.result_type()
        }
    }

    pub fn use_count(&self) -> u32 {
        self.use_count
    }

    pub fn has_uses(&self) -> bool {
        self.use_count > 0
    }

    pub fn add_use(&mut self) {
        self.use_count += 1;
    }

    /// Drop one use. Consuming more uses than were recorded is a logic fault.
    pub fn remove_use(&mut self) {
        assert!(
            self.use_count > 0,
            "{} consumed more times than it is used",
            self.opcode
        );
        self.use_count -= 1;
    }

    pub fn definition(&self) -> u32 {
        self.definition
    }

    pub fn set_definition(&mut self, definition: u32) {
        self.definition = definition;
    }
}

/// Instruction storage indexed by [`InstId`]
#[derive(Debug, Clone, Default)]
pub struct InstArena {
    insts: Vec<Inst>,
}

impl InstArena {
    pub fn push(&mut self, inst: Inst) -> InstId {
        let id = InstId(self.insts.len() as u32);
        self.insts.push(inst);
        id
    }

    pub fn len(&self) -> usize {
        self.insts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (InstId, &Inst)> {
        self.insts
            .iter()
            .enumerate()
            .map(|(i, inst)| (InstId(i as u32), inst))
    }

    /// Type of an argument value
    pub fn value_type(&self, value: &Value) -> Type {
        match value {
            Value::Inst(id) => self[*id].result_type(),
            other => other.immediate_type().unwrap_or(Type::Void),
        }
    }
}

impl Index<InstId> for InstArena {
    type Output = Inst;

    fn index(&self, id: InstId) -> &Inst {
        &self.insts[id.index()]
    }
}

impl IndexMut<InstId> for InstArena {
    fn index_mut(&mut self, id: InstId) -> &mut Inst {
        &mut self.insts[id.index()]
    }
}

/// Basic block: an ordered instruction list
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub insts: Vec<InstId>,
}

/// Structured control-flow node
#[derive(Debug, Clone, PartialEq)]
pub enum SyntaxNode {
    Block(BlockId),
    If { cond: Value },
    EndIf,
    Loop,
    /// Loop back-edge, taken while `cond` holds
    Repeat { cond: Value },
    Break { cond: Value },
    Return,
    Unreachable,
}

/// A translated shader stage
#[derive(Debug, Clone)]
pub struct Program {
    pub insts: InstArena,
    pub blocks: Vec<Block>,
    /// Blocks in reverse post order
    pub block_order: Vec<BlockId>,
    pub syntax_list: Vec<SyntaxNode>,
    pub info: Info,
    pub stage: Stage,
    pub workgroup_size: [u32; 3],
    pub shared_memory_size: u32,
    pub local_memory_size: u32,
    pub invocations: u32,
    pub is_geometry_passthrough: bool,
}

impl Program {
    pub fn new(stage: Stage) -> Self {
        Self {
            insts: InstArena::default(),
            blocks: Vec::new(),
            block_order: Vec::new(),
            syntax_list: Vec::new(),
            info: Info::default(),
            stage,
            workgroup_size: [1, 1, 1],
            shared_memory_size: 0,
            local_memory_size: 0,
            invocations: 1,
            is_geometry_passthrough: false,
        }
    }

    pub fn add_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block::default());
        self.block_order.push(id);
        id
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    /// Insert an instruction at `position` in `block`, recording one use on
    /// every instruction it references.
    pub fn insert_inst(
        &mut self,
        block: BlockId,
        position: usize,
        opcode: Opcode,
        args: Vec<Value>,
    ) -> InstId {
        for arg in &args {
            if let Value::Inst(id) = arg {
                self.insts[*id].add_use();
            }
        }
        let id = self.insts.push(Inst::new(opcode, args));
        self.blocks[block.index()].insts.insert(position, id);
        id
    }

    /// Append an instruction to the end of `block`
    pub fn append_inst(&mut self, block: BlockId, opcode: Opcode, args: Vec<Value>) -> InstId {
        let position = self.blocks[block.index()].insts.len();
        self.insert_inst(block, position, opcode, args)
    }

    /// Create an empty phi of type `ty` at the head of `block`
    pub fn add_phi(&mut self, block: BlockId, ty: Type) -> InstId {
        let mut inst = Inst::new(Opcode::Phi, Vec::new());
        inst.phi_type = ty;
        let id = self.insts.push(inst);
        let position = self.blocks[block.index()]
            .insts
            .iter()
            .take_while(|existing| self.insts[**existing].opcode().is_phi())
            .count();
        self.blocks[block.index()].insts.insert(position, id);
        id
    }

    /// Append a control flow node; its condition counts as a use
    pub fn push_syntax(&mut self, node: SyntaxNode) {
        if let SyntaxNode::If { cond } | SyntaxNode::Repeat { cond } | SyntaxNode::Break { cond } =
            &node
        {
            if let Value::Inst(id) = cond {
                self.insts[*id].add_use();
            }
        }
        self.syntax_list.push(node);
    }

    /// Add the operand flowing into `phi` from `predecessor`
    pub fn add_phi_operand(&mut self, phi: InstId, predecessor: BlockId, value: Value) {
        if let Value::Inst(id) = value {
            self.insts[id].add_use();
        }
        let inst = &mut self.insts[phi];
        inst.args.push(value);
        inst.phi_blocks.push(predecessor);
    }
}
