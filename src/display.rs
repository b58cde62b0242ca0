use std::io::{self, Write};
use std::time::Duration;

use crate::grid::Grid;
use crate::implementations::SolveResult;
use crate::options::{Options, Termination};

/// 計算時間・メモリ量・設定・反復回数・残差を出力する
pub fn write_statistics<W: Write>(
    out: &mut W,
    grid: &Grid,
    result: &SolveResult,
    options: &Options,
    elapsed: Duration,
) -> io::Result<()> {
    writeln!(out, "Berechnungszeit:    {:.6} s", elapsed.as_secs_f64())?;
    writeln!(out, "Speicherbedarf:     {:.6} MiB", grid.memory_mib())?;
    writeln!(out, "Berechnungsmethode: {}", options.method)?;
    writeln!(out, "Interlines:         {}", options.interlines)?;
    writeln!(out, "Stoerfunktion:      {}", options.function)?;

    let termination = match options.termination {
        Termination::Precision(_) => "Hinreichende Genaugkeit",
        Termination::Iterations(_) => "Anzahl der Iterationen",
    };
    writeln!(out, "Terminierung:       {termination}")?;
    writeln!(out, "Anzahl Iterationen: {}", result.iterations)?;
    writeln!(out, "Norm des Fehlers:   {}", format_exp(result.residuum))?;
    writeln!(out)
}

/// 解の入ったスロットから 9x9 の抜き出しを出力する
pub fn write_matrix<W: Write>(
    out: &mut W,
    grid: &Grid,
    result: &SolveResult,
    interlines: usize,
) -> io::Result<()> {
    writeln!(out, "Matrix:")?;
    for row in grid.sample(result.slot, interlines) {
        for value in row {
            write!(out, "{value:7.4}")?;
        }
        writeln!(out)?;
    }
    out.flush()
}

// C の %e と同じ 1.234567e-06 形式
fn format_exp(value: f64) -> String {
    let formatted = format!("{value:.6e}");
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => formatted,
    }
}
