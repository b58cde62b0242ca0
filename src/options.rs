use std::fmt;

use clap::{Parser, ValueEnum};

use crate::error::{Error, Result};

pub const MAX_INTERLINES: usize = 10240;
pub const MAX_ITERATION: u64 = 200_000;
pub const MAX_THREADS: usize = 1024;
pub const MIN_PRECISION: f64 = 1e-20;
pub const MAX_PRECISION: f64 = 1e-4;

/// 反復法の種類
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    GaussSeidel,
    Jacobi,
}

impl Method {
    /// 必要な行列（スロット）の数。Jacobi法は読み出し用と書き込み用の2枚
    pub fn slots(self) -> usize {
        match self {
            Method::GaussSeidel => 1,
            Method::Jacobi => 2,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::GaussSeidel => f.write_str("Gauß-Seidel"),
            Method::Jacobi => f.write_str("Jacobi"),
        }
    }
}

/// 撹乱関数（右辺の項）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterferenceFunction {
    /// f(x,y) = 0
    F0,
    /// f(x,y) = 2 * pi^2 * sin(pi * x) * sin(pi * y)
    FPiSin,
}

impl fmt::Display for InterferenceFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterferenceFunction::F0 => f.write_str("f(x,y) = 0"),
            InterferenceFunction::FPiSin => {
                f.write_str("f(x,y) = 2 * pi^2 * sin(pi * x) * sin(pi * y)")
            }
        }
    }
}

/// 終了条件
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Termination {
    /// 最大残差がこの値を下回ったら終了
    Precision(f64),
    /// 指定回数だけ反復して終了
    Iterations(u64),
}

impl Termination {
    pub fn is_precision(&self) -> bool {
        matches!(self, Termination::Precision(_))
    }
}

/// 計算に使うスレッド実装
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// std::thread + Barrier（共有バッファをロックなしで分割）
    #[default]
    Threads,
    /// Rayonのスレッドプール
    Rayon,
    /// シングルスレッドの参照実装
    Single,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Threads => f.write_str("threads"),
            Backend::Rayon => f.write_str("rayon"),
            Backend::Single => f.write_str("single"),
        }
    }
}

/// Poisson方程式ソルバー (Jacobi法)
///
/// Example: partdiff 1 2 100 1 2 100
#[derive(Debug, Parser)]
#[command(name = "partdiff", version)]
pub struct Cli {
    /// number of threads (1 .. 1024)
    #[arg(value_parser = clap::value_parser!(u64).range(1..=MAX_THREADS as u64))]
    pub num: u64,

    /// calculation method: 1 = Gauß-Seidel, 2 = Jacobi
    #[arg(value_parser = clap::value_parser!(u64).range(1..=2))]
    pub method: u64,

    /// number of interlines (0 .. 10240), matrixsize = (interlines * 8) + 9
    #[arg(value_parser = clap::value_parser!(u64).range(0..=MAX_INTERLINES as u64))]
    pub lines: u64,

    /// interference function: 1 = f(x,y) = 0, 2 = f(x,y) = 2 * pi^2 * sin(pi * x) * sin(pi * y)
    #[arg(value_parser = clap::value_parser!(u64).range(1..=2))]
    pub func: u64,

    /// termination condition: 1 = sufficient precision, 2 = number of iterations
    #[arg(value_parser = clap::value_parser!(u64).range(1..=2))]
    pub term: u64,

    /// precision (1e-4 .. 1e-20) or iterations (1 .. 200000), depending on term
    #[arg(allow_hyphen_values = true)]
    pub prec_iter: String,

    /// thread implementation used for the relaxation
    #[arg(long, env = "PARTDIFF_BACKEND", value_enum, default_value_t = Backend::Threads)]
    pub backend: Backend,

    /// compute and log the residuum in every iteration
    #[arg(long)]
    pub trace_residuum: bool,
}

/// ソルバーへ渡す設定。計算中は読み取り専用
#[derive(Clone, Debug, PartialEq)]
pub struct Options {
    pub threads: usize,
    pub method: Method,
    pub interlines: usize,
    pub function: InterferenceFunction,
    pub termination: Termination,
    /// 反復回数指定でも毎回残差を計算して記録する（検査用）
    pub trace_residuum: bool,
}

impl Options {
    /// Jacobi法の設定を作る。スレッド数が0、または内部行数を超える場合は1に落とす
    pub fn jacobi(
        threads: usize,
        interlines: usize,
        function: InterferenceFunction,
        termination: Termination,
    ) -> Self {
        let n = grid_spaces(interlines);
        Options {
            threads: clamp_threads(threads, n),
            method: Method::Jacobi,
            interlines,
            function,
            termination,
            trace_residuum: false,
        }
    }

    pub fn with_trace_residuum(mut self, trace: bool) -> Self {
        self.trace_residuum = trace;
        self
    }

    /// 格子線の間隔の数 N
    pub fn n(&self) -> usize {
        grid_spaces(self.interlines)
    }

    pub fn ensure_jacobi(&self) -> Result<()> {
        match self.method {
            Method::Jacobi => Ok(()),
            other => Err(Error::UnsupportedMethod(other)),
        }
    }
}

impl TryFrom<Cli> for Options {
    type Error = Error;

    fn try_from(cli: Cli) -> Result<Self> {
        let method = match cli.method {
            1 => Method::GaussSeidel,
            _ => Method::Jacobi,
        };
        let function = match cli.func {
            1 => InterferenceFunction::F0,
            _ => InterferenceFunction::FPiSin,
        };
        let termination = parse_termination(cli.term, &cli.prec_iter)?;
        let interlines = cli.lines as usize;

        Ok(Options {
            threads: clamp_threads(cli.num as usize, grid_spaces(interlines)),
            method,
            interlines,
            function,
            termination,
            trace_residuum: cli.trace_residuum,
        })
    }
}

/// matrixsize = interlines * 8 + 9 なので N = interlines * 8 + 8
pub fn grid_spaces(interlines: usize) -> usize {
    interlines * 8 + 9 - 1
}

/// 要求スレッド数が0、または内部行数 (N-1) を超える場合は1スレッドに落とす
pub fn clamp_threads(requested: usize, n: usize) -> usize {
    if requested == 0 || requested > n.saturating_sub(1) { 1 } else { requested }
}

fn parse_termination(term: u64, value: &str) -> Result<Termination> {
    if term == 1 {
        let precision: f64 = value
            .trim()
            .parse()
            .map_err(|_| Error::InvalidTermValue(value.to_owned()))?;
        if !(MIN_PRECISION..=MAX_PRECISION).contains(&precision) {
            return Err(Error::InvalidPrecision(precision));
        }
        Ok(Termination::Precision(precision))
    } else {
        let iterations: u64 = value
            .trim()
            .parse()
            .map_err(|_| Error::InvalidTermValue(value.to_owned()))?;
        if !(1..=MAX_ITERATION).contains(&iterations) {
            return Err(Error::InvalidIterations { got: iterations, max: MAX_ITERATION });
        }
        Ok(Termination::Iterations(iterations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["partdiff"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn parses_iteration_run() {
        let options = Options::try_from(cli(&["1", "2", "100", "1", "2", "100"])).unwrap();
        assert_eq!(options.threads, 1);
        assert_eq!(options.method, Method::Jacobi);
        assert_eq!(options.interlines, 100);
        assert_eq!(options.n(), 808);
        assert_eq!(options.function, InterferenceFunction::F0);
        assert_eq!(options.termination, Termination::Iterations(100));
        assert!(!options.trace_residuum);
    }

    #[test]
    fn parses_precision_run() {
        let options = Options::try_from(cli(&["4", "2", "0", "2", "1", "1e-6"])).unwrap();
        assert_eq!(options.threads, 4);
        assert_eq!(options.function, InterferenceFunction::FPiSin);
        assert_eq!(options.termination, Termination::Precision(1e-6));
    }

    #[test]
    fn rejects_out_of_range_values() {
        let argv = |a: &[&str]| {
            let mut v = vec!["partdiff"];
            v.extend_from_slice(a);
            Cli::try_parse_from(v)
        };
        assert!(argv(&["0", "2", "0", "1", "2", "10"]).is_err());
        assert!(argv(&["1025", "2", "0", "1", "2", "10"]).is_err());
        assert!(argv(&["1", "3", "0", "1", "2", "10"]).is_err());
        assert!(argv(&["1", "2", "10241", "1", "2", "10"]).is_err());
        assert!(argv(&["1", "2", "0", "3", "2", "10"]).is_err());
        assert!(argv(&["1", "2", "0", "1", "2"]).is_err());

        assert!(matches!(
            Options::try_from(cli(&["1", "2", "0", "1", "1", "1e-3"])),
            Err(Error::InvalidPrecision(_))
        ));
        assert!(matches!(
            Options::try_from(cli(&["1", "2", "0", "1", "1", "1e-21"])),
            Err(Error::InvalidPrecision(_))
        ));
        assert!(matches!(
            Options::try_from(cli(&["1", "2", "0", "1", "2", "0"])),
            Err(Error::InvalidIterations { got: 0, .. })
        ));
        assert!(matches!(
            Options::try_from(cli(&["1", "2", "0", "1", "2", "200001"])),
            Err(Error::InvalidIterations { .. })
        ));
        assert!(matches!(
            Options::try_from(cli(&["1", "2", "0", "1", "2", "abc"])),
            Err(Error::InvalidTermValue(_))
        ));
    }

    #[test]
    fn gauss_seidel_is_parsed_but_rejected() {
        let options = Options::try_from(cli(&["1", "1", "0", "1", "2", "10"])).unwrap();
        assert_eq!(options.method, Method::GaussSeidel);
        assert_eq!(options.method.slots(), 1);
        assert!(matches!(options.ensure_jacobi(), Err(Error::UnsupportedMethod(Method::GaussSeidel))));
    }

    #[test]
    fn thread_count_falls_back_to_one() {
        // N = 8 -> 内部行は7行
        assert_eq!(clamp_threads(7, 8), 7);
        assert_eq!(clamp_threads(8, 8), 1);
        assert_eq!(clamp_threads(1024, 8), 1);

        let options = Options::try_from(cli(&["12", "2", "0", "1", "2", "10"])).unwrap();
        assert_eq!(options.threads, 1);
        let options = Options::jacobi(12, 1, InterferenceFunction::F0, Termination::Iterations(1));
        assert_eq!(options.threads, 12);
    }

    #[test]
    fn zero_threads_runs_single_thread() {
        assert_eq!(clamp_threads(0, 8), 1);
        assert_eq!(clamp_threads(0, 0), 1);

        let options = Options::jacobi(0, 0, InterferenceFunction::F0, Termination::Iterations(3));
        assert_eq!(options.threads, 1);

        let mut grid = crate::Grid::from_options(&options);
        let result = crate::solve(&mut grid, &options, Backend::Threads).unwrap();
        assert_eq!(result.iterations, 3);
        assert!(result.residuum > 0.0);
    }

    #[test]
    fn backend_from_flag() {
        let parsed = cli(&["2", "2", "0", "1", "2", "10", "--backend", "rayon", "--trace-residuum"]);
        assert_eq!(parsed.backend, Backend::Rayon);
        assert!(parsed.trace_residuum);
    }
}
