use std::mem;

use log::trace;

use crate::grid::Grid;
use crate::implementations::termination::TermState;
use crate::implementations::{SolveResult, SourceTerm, star};
use crate::options::Options;

/// 1反復分のJacobi更新。`read` スロットから読み `write` スロットの内部セルへ書く。
///
/// `with_residuum` のとき最大残差を返す（それ以外は0.0）。
pub fn jacobi_step(
    grid: &mut Grid,
    read: usize,
    write: usize,
    source: &SourceTerm,
    with_residuum: bool,
) -> f64 {
    let n = grid.n();
    let width = grid.width();
    let (src, dst) = grid.split_slots(read, write);

    let mut maxresiduum = 0.0;
    for i in 1..n {
        let fpisin_i = source.row_factor(i);
        for j in 1..n {
            let idx = i * width + j;
            let value = source.apply(
                star(src[idx - width], src[idx - 1], src[idx + 1], src[idx + width]),
                fpisin_i,
                j,
            );

            if with_residuum {
                let residuum = (src[idx] - value).abs();
                maxresiduum = if residuum < maxresiduum { maxresiduum } else { residuum };
            }

            dst[idx] = value;
        }
    }
    maxresiduum
}

/// シングルスレッドの参照実装。終了条件の扱いは並列版と同じ
pub fn jacobi_single(grid: &mut Grid, options: &Options) -> SolveResult {
    debug_assert_eq!(grid.slots(), 2, "Jacobi needs two matrices");

    let source = SourceTerm::new(options.function, grid.h());

    let mut m1 = 0;
    let mut m2 = 1;
    let mut term = TermState::new(options.termination, options.trace_residuum);
    let mut stat_iteration: u64 = 0;
    let mut maxresiduum = 0.0;
    let mut history = Vec::new();

    while term.running() {
        maxresiduum = jacobi_step(grid, m2, m1, &source, term.needs_residuum());

        mem::swap(&mut m1, &mut m2);
        stat_iteration += 1;

        if options.trace_residuum {
            trace!("iteration {}: residuum {:e}", stat_iteration, maxresiduum);
            history.push(maxresiduum);
        }
        term.advance(maxresiduum);
    }

    SolveResult {
        slot: m2,
        iterations: stat_iteration,
        residuum: maxresiduum,
        history,
    }
}
