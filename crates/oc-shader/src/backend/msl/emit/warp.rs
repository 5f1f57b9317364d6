use super::EmitResult;
use crate::backend::msl::emit_context::EmitContext;
use crate::backend::msl::var_alloc::VarType;
use crate::ir::InstId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Shuffle {
    Index,
    Up,
    Down,
    Butterfly,
}

/// Guest lane shuffle over a simdgroup.
///
/// Operands are value, lane index, clamp and segmentation mask. The lane
/// window is `[lane & mask, (lane & mask) | (clamp & ~mask)]`; reads that
/// land outside it keep the own value and clear `shfl_in_bounds`. The
/// shuffle itself runs on every lane so the simdgroup stays converged.
pub(super) fn shuffle(ctx: &mut EmitContext<'_>, inst: InstId, kind: Shuffle) -> EmitResult {
    let [value, index, clamp, mask] = ctx.consume_args::<4>(inst);
    let min_lane = format!("(__lane&{mask})");
    let max_lane = format!("({min_lane}|({clamp}&~{mask}))");
    let (src, in_bounds) = match kind {
        Shuffle::Index => {
            let src = format!("(({index}&~{mask})|{min_lane})");
            let cond = format!("{src}<={max_lane}");
            (src, cond)
        }
        Shuffle::Up => {
            let src = format!("(__lane-{index})");
            let cond = format!("int{src}>=int{max_lane}");
            (src, cond)
        }
        Shuffle::Down => {
            let src = format!("(__lane+{index})");
            let cond = format!("int{src}<=int{max_lane}");
            (src, cond)
        }
        Shuffle::Butterfly => {
            let src = format!("(__lane^{index})");
            let cond = format!("int{src}<=int{max_lane}");
            (src, cond)
        }
    };
    ctx.add(format!("shfl_in_bounds={in_bounds};"));
    ctx.add(format!("shfl_result=simd_shuffle({value},ushort({src}&31u));"));
    ctx.add_define(
        inst,
        VarType::U32,
        &format!("shfl_in_bounds?shfl_result:{value}"),
    );
    Ok(())
}
