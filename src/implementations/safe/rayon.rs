use log::trace;
use rayon::prelude::*;

use crate::error::Result;
use crate::grid::Grid;
use crate::implementations::termination::TermState;
use crate::implementations::{SolveResult, SourceTerm, star};
use crate::options::Options;

/*
  Rayon-based parallel implementation

  - 書き込み用スロットの内部行を par_chunks_mut で行ごとに分割する
  - 各行は読み出し用スロットだけを参照するのでロック不要
  - 最大残差は reduce でまとめる（max は順序に依存しないので並列版と一致する）
  - スレッド数は options.threads の専用プール
*/
pub fn rayon_parallel(grid: &mut Grid, options: &Options) -> Result<SolveResult> {
    debug_assert_eq!(grid.slots(), 2, "Jacobi needs two matrices");

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.threads)
        .build()?;

    let n = grid.n();
    let width = grid.width();
    let source = SourceTerm::new(options.function, grid.h());

    let result = pool.install(|| {
        let mut m1 = 0;
        let mut m2 = 1;
        let mut term = TermState::new(options.termination, options.trace_residuum);
        let mut stat_iteration: u64 = 0;
        let mut maxresiduum = 0.0;
        let mut history = Vec::new();

        while term.running() {
            let with_residuum = term.needs_residuum();
            let (src, dst) = grid.split_slots(m2, m1);

            // 内部行（1行目 ～ N-1行目）だけを切り出して並列に計算
            maxresiduum = dst[width..n * width]
                .par_chunks_mut(width)
                .enumerate()
                .map(|(r, dst_row)| {
                    let i = r + 1;
                    let fpisin_i = source.row_factor(i);
                    let mut local = 0.0;

                    for j in 1..n {
                        let idx = i * width + j;
                        let value = source.apply(
                            star(src[idx - width], src[idx - 1], src[idx + 1], src[idx + width]),
                            fpisin_i,
                            j,
                        );

                        if with_residuum {
                            let residuum = (src[idx] - value).abs();
                            local = if residuum < local { local } else { residuum };
                        }

                        dst_row[j] = value;
                    }
                    local
                })
                .reduce(|| 0.0, |a: f64, b: f64| if b < a { a } else { b });

            std::mem::swap(&mut m1, &mut m2);
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
    });

    Ok(result)
}
