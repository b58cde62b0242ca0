use std::f64::consts::PI;

use log::info;

use crate::error::Result;
use crate::grid::Grid;
use crate::options::{Backend, InterferenceFunction, Options};

pub mod partition;
pub mod safe;
pub mod termination;

#[path = "unsafe"]
pub mod unsafe_impl {
    pub mod barrier_unsafe;
}

/// 計算結果。スレッド0が最後に1回だけ書き込む
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SolveResult {
    /// 解が入っているスロット
    pub slot: usize,
    /// 実行した反復回数
    pub iterations: u64,
    /// 最終反復での最大残差
    pub residuum: f64,
    /// 反復ごとの最大残差（`trace_residuum` 指定時のみ記録）
    pub history: Vec<f64>,
}

/// 撹乱関数 f(x,y) = 2 * pi^2 * sin(pi * x) * sin(pi * y) の離散化に使う定数
#[derive(Clone, Copy, Debug)]
pub struct SourceTerm {
    enabled: bool,
    pih: f64,
    fpisin: f64,
}

impl SourceTerm {
    pub fn new(function: InterferenceFunction, h: f64) -> Self {
        match function {
            InterferenceFunction::F0 => SourceTerm { enabled: false, pih: 0.0, fpisin: 0.0 },
            InterferenceFunction::FPiSin => SourceTerm {
                enabled: true,
                pih: PI * h,
                fpisin: 0.25 * (2.0 * PI * PI) * h * h,
            },
        }
    }

    /// 行ごとに1回だけ計算する係数 fpisin * sin(pi * h * i)
    #[inline(always)]
    pub fn row_factor(&self, i: usize) -> f64 {
        if self.enabled { self.fpisin * (self.pih * i as f64).sin() } else { 0.0 }
    }

    #[inline(always)]
    pub fn apply(&self, star: f64, row_factor: f64, j: usize) -> f64 {
        if self.enabled { star + row_factor * (self.pih * j as f64).sin() } else { star }
    }
}

/// 5点ステンシル。加算順序は全実装で共通にしてビット単位で一致させる
#[inline(always)]
pub fn star(up: f64, left: f64, right: f64, down: f64) -> f64 {
    0.25 * (up + left + right + down)
}

/// 選択した実装で方程式を解く
pub fn solve(grid: &mut Grid, options: &Options, backend: Backend) -> Result<SolveResult> {
    options.ensure_jacobi()?;

    info!(
        "solving N={} threads={} function={:?} termination={:?} backend={}",
        grid.n(),
        options.threads,
        options.function,
        options.termination,
        backend
    );

    let result = match backend {
        Backend::Threads => unsafe_impl::barrier_unsafe::barrier_unsafe(grid, options),
        Backend::Rayon => safe::rayon::rayon_parallel(grid, options)?,
        Backend::Single => safe::single::jacobi_single(grid, options),
    };

    info!("finished after {} iterations, residuum {:e}", result.iterations, result.residuum);
    Ok(result)
}
