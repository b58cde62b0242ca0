use std::io;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use log::info;

use partdiff_rust::display::{write_matrix, write_statistics};
use partdiff_rust::options::Cli;
use partdiff_rust::{Error, Grid, Options, Result, solve};

fn main() -> ExitCode {
    env_logger::init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        // メモリ不足のメッセージは標準出力へ
        Err(err @ Error::Allocation { .. }) => {
            println!("{err}");
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let backend = cli.backend;
    let options = Options::try_from(cli)?;

    // Gauß-Seidel はここで弾く。ソルバーはJacobi法だけを前提にする
    options.ensure_jacobi()?;

    let mut grid = Grid::try_from_options(&options)?;
    info!(
        "grid: N={} ({} lines), {:.3} MiB, {} threads",
        grid.n(),
        grid.width(),
        grid.memory_mib(),
        options.threads
    );

    let start = Instant::now();
    let result = solve(&mut grid, &options, backend)?;
    let elapsed = start.elapsed();
    info!("calculation took {:?}", elapsed);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_statistics(&mut out, &grid, &result, &options, elapsed)?;
    write_matrix(&mut out, &grid, &result, options.interlines)?;
    Ok(())
}
