use crate::options::{MAX_ITERATION, Termination};

/// スレッドごとのループ制御状態。
///
/// 全スレッドが同じ `Termination` から初期化し、同じ残差を受け取って更新するので、
/// 共有しなくても全員が同じ反復で停止する。
#[derive(Clone, Copy, Debug)]
pub struct TermState {
    termination: Termination,
    remaining: u64,
    trace: bool,
}

impl TermState {
    pub fn new(termination: Termination, trace: bool) -> Self {
        let remaining = match termination {
            // 精度指定では上限値で初期化するが、減らさない
            Termination::Precision(_) => MAX_ITERATION,
            Termination::Iterations(iterations) => iterations,
        };
        TermState { termination, remaining, trace }
    }

    #[inline]
    pub fn running(&self) -> bool {
        self.remaining > 0
    }

    /// この反復で残差を計算する必要があるか。
    /// 回数指定では最終反復だけ計算する
    #[inline]
    pub fn needs_residuum(&self) -> bool {
        self.trace || self.termination.is_precision() || self.remaining == 1
    }

    /// 残差の配列が毎反復書き換えられる場合、読み終わるまでの2回目の同期が要る
    #[inline]
    pub fn needs_second_barrier(&self) -> bool {
        self.trace || self.termination.is_precision()
    }

    /// 反復を1回終えたあとの更新
    #[inline]
    pub fn advance(&mut self, maxresiduum: f64) {
        match self.termination {
            Termination::Precision(precision) => {
                if maxresiduum < precision {
                    self.remaining = 0;
                }
            }
            Termination::Iterations(_) => self.remaining -= 1,
        }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iterations_count_down() {
        let mut state = TermState::new(Termination::Iterations(3), false);
        let mut rounds = 0;
        let mut with_residuum = Vec::new();
        while state.running() {
            with_residuum.push(state.needs_residuum());
            // 回数指定では残差の値は停止判定に使わない
            state.advance(1.0);
            rounds += 1;
        }
        assert_eq!(rounds, 3);
        assert_eq!(with_residuum, vec![false, false, true]);
        assert!(!state.needs_second_barrier());
    }

    #[test]
    fn trace_forces_residuum_every_round() {
        let mut state = TermState::new(Termination::Iterations(3), true);
        while state.running() {
            assert!(state.needs_residuum());
            assert!(state.needs_second_barrier());
            state.advance(0.0);
        }
    }

    #[test]
    fn precision_stops_below_threshold() {
        let mut state = TermState::new(Termination::Precision(1e-6), false);
        assert!(state.needs_residuum());
        assert!(state.needs_second_barrier());

        state.advance(1e-3);
        assert!(state.running());
        // 閾値と等しい場合はまだ続ける
        state.advance(1e-6);
        assert!(state.running());
        state.advance(9e-7);
        assert!(!state.running());
    }

    /// 精度指定には反復回数の上限がない。閾値に届かなければ永久にループする
    #[test]
    fn precision_budget_is_never_consumed() {
        let mut state = TermState::new(Termination::Precision(1e-20), false);
        for _ in 0..(MAX_ITERATION * 2) {
            state.advance(1e-10);
        }
        assert!(state.running());
        assert_eq!(state.remaining(), MAX_ITERATION);
    }
}
