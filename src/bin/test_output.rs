use partdiff_rust::options::{Backend, InterferenceFunction, Options, Termination};
use partdiff_rust::{Grid, Result, solve};

// 各実装の解をバイナリで書き出し、他言語版との比較に使う
fn main() -> Result<()> {
    env_logger::init();

    let test_steps = 100; // テスト用のステップ数
    let interlines = 2;
    let threads = 4;

    println!("=== Rust実装の結果出力テスト ===");
    println!("ステップ数: {}, interlines: {}, スレッド数: {}", test_steps, interlines, threads);
    println!();

    let backends = [
        ("threads", Backend::Threads),
        ("rayon", Backend::Rayon),
        ("single", Backend::Single),
    ];

    for function in [InterferenceFunction::F0, InterferenceFunction::FPiSin] {
        let options = Options::jacobi(threads, interlines, function, Termination::Iterations(test_steps));

        for (name, backend) in backends {
            let mut grid = Grid::try_from_options(&options)?;
            let result = solve(&mut grid, &options, backend)?;

            let tag = match function {
                InterferenceFunction::F0 => "f0",
                InterferenceFunction::FPiSin => "fpisin",
            };
            let filename = format!("rust_{}_{}.bin", name, tag);
            grid.save_to_file(result.slot, &filename)?;
            println!("✓ {} ({}) -> {}", name, function, filename);

            // 中心点と残差を表示（デバッグ用）
            let n = grid.n();
            println!("  中心点 [{}][{}] = {:.6}", n / 2, n / 2, grid.get(result.slot, n / 2, n / 2));
            println!("  残差 = {:e}", result.residuum);
            println!();
        }
    }

    println!("全ての結果ファイルを出力しました。");
    Ok(())
}
