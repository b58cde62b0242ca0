use std::ops::Range;
use std::panic;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use log::{debug, trace};

use crate::grid::Grid;
use crate::implementations::partition::row_range;
use crate::implementations::termination::TermState;
use crate::implementations::{SolveResult, SourceTerm, star};
use crate::options::Options;

/*
  Barrier同期版（共有ダブルバッファ、ロックなし）

  - 内部行 1..N-1 をスレッド数で分割し、各スレッドは自分の行だけを書き込む
  - 1反復の中では読み出し用スロットは全員読み取り専用、書き込み用スロットは行ごとに排他
  - 残差はスレッドごとのスロットに書き、バリアの後で全員が同じ最大値を求める
  - スロットの入れ替えと反復回数は各スレッドのローカル変数。全員が同じ規則で更新するので共有しない
*/

// ラッパー構造体
#[derive(Clone, Copy)]
struct GridPtr {
    data: *mut f64,
}

// 各スレッドは互いに素な行にしか書き込まないので共有してよい
unsafe impl Send for GridPtr {}
unsafe impl Sync for GridPtr {}

impl GridPtr {
    // メソッド経由で取り出し、クロージャが構造体ごとキャプチャするようにする
    fn as_ptr(self) -> *mut f64 {
        self.data
    }
}

/// スレッドごとの最大残差の公開先。false sharingを避けるため1キャッシュラインに1つ
#[repr(align(64))]
#[derive(Default)]
struct ResidualSlot(AtomicU64);

impl ResidualSlot {
    #[inline]
    fn store(&self, value: f64) {
        // 可視性はバリアが保証する
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    #[inline]
    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
}

struct Worker<'a> {
    grid: GridPtr,
    n: usize,
    slot_len: usize,
    thread_num: usize,
    threads: usize,
    source: SourceTerm,
    options: &'a Options,
    barrier: Arc<Barrier>,
    residuals: Arc<[ResidualSlot]>,
}

/// `options.threads` 本のスレッドでJacobi法を解く。
///
/// 呼び出し側の前提: 格子は2スロットで境界が初期化済み、
/// スレッド数は `max(1, N-1)` 以下、手法はJacobi。
pub fn barrier_unsafe(grid: &mut Grid, options: &Options) -> SolveResult {
    let n = grid.n();
    let threads = options.threads;
    debug_assert_eq!(grid.slots(), 2, "Jacobi needs two matrices");
    debug_assert!(threads >= 1 && threads <= (n - 1).max(1));

    let source = SourceTerm::new(options.function, grid.h());
    let slot_len = grid.slot_len();
    let ptr = GridPtr { data: grid.data.as_mut_ptr() };

    let barrier = Arc::new(Barrier::new(threads));
    let residuals: Arc<[ResidualSlot]> = (0..threads).map(|_| ResidualSlot::default()).collect();

    thread::scope(|scope| {
        let handles: Vec<_> = (0..threads)
            .map(|thread_num| {
                let worker = Worker {
                    grid: ptr,
                    n,
                    slot_len,
                    thread_num,
                    threads,
                    source,
                    options,
                    barrier: barrier.clone(),
                    residuals: residuals.clone(),
                };
                scope.spawn(move || worker.run())
            })
            .collect();

        // 結果を書くのはスレッド0だけ
        let mut result = SolveResult::default();
        for handle in handles {
            if let Some(outcome) = handle.join().unwrap_or_else(|e| panic::resume_unwind(e)) {
                result = outcome;
            }
        }
        result
    })
}

impl Worker<'_> {
    fn run(self) -> Option<SolveResult> {
        let rows = row_range(self.n - 1, self.threads, self.thread_num);
        debug!("thread {} relaxes rows {:?}", self.thread_num, rows);

        let base = self.grid.as_ptr();

        // m1: 書き込み先, m2: 読み出し元
        let mut m1 = 0;
        let mut m2 = 1;

        let mut term = TermState::new(self.options.termination, self.options.trace_residuum);
        let mut stat_iteration: u64 = 0;
        let mut maxresiduum = 0.0;
        let mut history = Vec::new();

        while term.running() {
            let with_residuum = term.needs_residuum();

            // 1. 担当行の計算
            // SAFETY: 他スレッドはこの反復でsrcを書かず、dstの担当行は自分だけが書く
            maxresiduum = unsafe {
                let src = base.add(m2 * self.slot_len);
                let dst = base.add(m1 * self.slot_len);
                relax_band(src, dst, rows.clone(), self.n, &self.source, with_residuum)
            };

            // 2. 残差を公開して全員の書き込み完了を待つ
            if with_residuum {
                self.residuals[self.thread_num].store(maxresiduum);
            }
            self.barrier.wait();

            // 3. 全スレッドが同じ最大残差を求める
            if with_residuum {
                maxresiduum = self.residuals.iter().fold(maxresiduum, |acc, slot| {
                    let residuum = slot.load();
                    if residuum < acc { acc } else { residuum }
                });
            }

            // 4. スロットの入れ替え
            std::mem::swap(&mut m1, &mut m2);
            stat_iteration += 1;

            // 5. 全員が残差を読み終えるまで待ってから停止判定
            if term.needs_second_barrier() {
                self.barrier.wait();
                if self.thread_num == 0 && self.options.trace_residuum {
                    trace!("iteration {}: residuum {:e}", stat_iteration, maxresiduum);
                    history.push(maxresiduum);
                }
            }
            term.advance(maxresiduum);
        }

        (self.thread_num == 0).then(|| SolveResult {
            slot: m2,
            iterations: stat_iteration,
            residuum: maxresiduum,
            history,
        })
    }
}

// 計算ロジック
#[inline(always)]
unsafe fn relax_band(
    src: *const f64,
    dst: *mut f64,
    rows: Range<usize>,
    n: usize,
    source: &SourceTerm,
    with_residuum: bool,
) -> f64 {
    let width = n + 1;
    let mut maxresiduum = 0.0;

    for i in rows {
        let fpisin_i = source.row_factor(i);

        // SAFETY: 1 <= i <= N-1 なので上下の行も格子内
        unsafe {
            let up_row = src.add((i - 1) * width);
            let curr_row = src.add(i * width);
            let down_row = src.add((i + 1) * width);
            let dst_row = dst.add(i * width);

            for j in 1..n {
                let value = source.apply(
                    star(*up_row.add(j), *curr_row.add(j - 1), *curr_row.add(j + 1), *down_row.add(j)),
                    fpisin_i,
                    j,
                );

                if with_residuum {
                    let residuum = (*curr_row.add(j) - value).abs();
                    maxresiduum = if residuum < maxresiduum { maxresiduum } else { residuum };
                }

                *dst_row.add(j) = value;
            }
        }
    }

    maxresiduum
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{InterferenceFunction, Termination};

    #[test]
    fn borders_are_never_written() {
        let options = Options::jacobi(3, 0, InterferenceFunction::F0, Termination::Iterations(25));
        let mut grid = Grid::from_options(&options);
        let before = grid.clone();

        let result = barrier_unsafe(&mut grid, &options);
        assert_eq!(result.iterations, 25);

        let n = grid.n();
        for s in 0..2 {
            for k in 0..=n {
                assert_eq!(grid.get(s, 0, k), before.get(s, 0, k));
                assert_eq!(grid.get(s, n, k), before.get(s, n, k));
                assert_eq!(grid.get(s, k, 0), before.get(s, k, 0));
                assert_eq!(grid.get(s, k, n), before.get(s, k, n));
            }
        }
    }

    #[test]
    fn result_slot_alternates_with_parity() {
        let run = |iterations| {
            let options =
                Options::jacobi(2, 0, InterferenceFunction::F0, Termination::Iterations(iterations));
            let mut grid = Grid::from_options(&options);
            barrier_unsafe(&mut grid, &options).slot
        };
        // 最初の反復はスロット1を読んでスロット0へ書く
        assert_eq!(run(1), 0);
        assert_eq!(run(2), 1);
        assert_eq!(run(7), 0);
    }

    #[test]
    fn count_mode_without_trace_keeps_no_history() {
        let options = Options::jacobi(2, 0, InterferenceFunction::FPiSin, Termination::Iterations(5));
        let mut grid = Grid::from_options(&options);
        let result = barrier_unsafe(&mut grid, &options);
        assert!(result.history.is_empty());
        assert!(result.residuum > 0.0);
    }

    #[test]
    fn precision_mode_without_trace_keeps_no_history() {
        let options = Options::jacobi(3, 0, InterferenceFunction::F0, Termination::Precision(1e-4));
        let mut grid = Grid::from_options(&options);
        let result = barrier_unsafe(&mut grid, &options);
        assert!(result.iterations > 1);
        assert!(result.residuum < 1e-4);
        assert!(result.history.is_empty());

        let traced = options.with_trace_residuum(true);
        let mut grid = Grid::from_options(&traced);
        let with_history = barrier_unsafe(&mut grid, &traced);
        assert_eq!(with_history.history.len() as u64, result.iterations);
        assert_eq!(with_history.residuum, result.residuum);
    }
}
