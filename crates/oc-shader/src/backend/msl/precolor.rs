//! Phi lowering ahead of emission
//!
//! Every phi operand becomes a `PhiMove` at the end of its predecessor block,
//! followed by a `Reference` to the phi that keeps its variable alive until
//! the block is left.

use crate::ir::{InstId, IrEmitter, Opcode, Program, Value};

fn precolor_phi(program: &mut Program, phi: InstId) {
    let num_args = program.insts[phi].num_args();
    for index in 0..num_args {
        let predecessor = program.insts[phi].phi_block(index);
        let arg = program.insts[phi].arg(index);
        // Moves go before trailing references so one phi's move cannot
        // overwrite a value another phi still reads
        let block = program.block(predecessor);
        let position = block
            .insts
            .iter()
            .rposition(|id| program.insts[*id].opcode() != Opcode::Reference)
            .map_or(0, |last| last + 1);
        IrEmitter::at(program, predecessor, position).phi_move(phi, arg);
    }
    for index in 0..num_args {
        let predecessor = program.insts[phi].phi_block(index);
        IrEmitter::new(program, predecessor).reference(Value::Inst(phi));
    }
}

/// Lower the phis of every block of `program`
pub fn precolor(program: &mut Program) {
    let order = program.block_order.clone();
    for block in order {
        let phis: Vec<InstId> = program
            .block(block)
            .insts
            .iter()
            .copied()
            .take_while(|id| program.insts[*id].opcode().is_phi())
            .collect();
        for phi in phis {
            precolor_phi(program, phi);
        }
    }
}
