//! Jacobi法による2次元Poisson方程式ソルバー
//!
//! 格子の内部行をスレッドに分割し、バリア同期で最大残差を集約しながら
//! ダブルバッファの格子を反復更新する。

pub mod display;
pub mod error;
pub mod grid;
pub mod implementations;
pub mod options;

pub use error::{Error, Result};
pub use grid::Grid;
pub use implementations::{SolveResult, solve};
pub use options::{Backend, InterferenceFunction, Method, Options, Termination};
