use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::mem;
use std::path::Path;
use std::thread;

use log::debug;

use crate::error::{Error, Result};
use crate::implementations::partition::flat_range;
use crate::options::{InterferenceFunction, Options};

/// ダブルバッファの格子。
///
/// `slots` 枚の (N+1) x (N+1) 行列を1本の `Vec<f64>` に並べて持つ。
/// セル `[s][r][c]` は `data[s * (N+1)^2 + r * (N+1) + c]`。
#[derive(Clone, Debug)]
pub struct Grid {
    pub data: Vec<f64>,
    n: usize,
    slots: usize,
}

impl Grid {
    /// 0で埋めた格子を確保する（境界は未設定）。確保に失敗すると panic する
    pub fn new(n: usize, slots: usize) -> Self {
        Grid::try_new(n, slots).unwrap_or_else(|err| panic!("{err}"))
    }

    /// 0で埋めた格子を確保する。メモリが足りなければ `Error::Allocation` を返す
    pub fn try_new(n: usize, slots: usize) -> Result<Self> {
        assert!(n >= 2, "grid needs at least one interior line");
        assert!(slots >= 1);

        let len = (n + 1)
            .checked_mul(n + 1)
            .and_then(|cells| cells.checked_mul(slots));
        let bytes = len
            .and_then(|len| len.checked_mul(mem::size_of::<f64>()))
            .unwrap_or(usize::MAX);
        let len = len.ok_or(Error::Allocation { bytes })?;

        let mut data = Vec::new();
        data.try_reserve_exact(len).map_err(|_| Error::Allocation { bytes })?;
        data.resize(len, 0.0);

        Ok(Grid { data, n, slots })
    }

    /// 設定に従って確保し、ゼロ埋めと境界値の設定まで行う
    pub fn from_options(options: &Options) -> Self {
        Grid::try_from_options(options).unwrap_or_else(|err| panic!("{err}"))
    }

    pub fn try_from_options(options: &Options) -> Result<Self> {
        let mut grid = Grid::try_new(options.n(), options.method.slots())?;
        debug!("allocated {} bytes", grid.data.len() * mem::size_of::<f64>());
        grid.initialize(options.threads, options.function);
        Ok(grid)
    }

    /// 全スロットをスレッド並列でゼロ埋めし、撹乱関数に応じた境界値を設定する
    pub fn initialize(&mut self, threads: usize, function: InterferenceFunction) {
        self.zero_fill(threads.max(1));

        // 撹乱関数2では境界は0のまま
        if function == InterferenceFunction::F0 {
            let n = self.n;
            let h = self.h();
            for g in 0..self.slots {
                for i in 0..=n {
                    self.set(g, i, 0, 1.0 - (h * i as f64));
                    self.set(g, i, n, h * i as f64);
                    self.set(g, 0, i, 1.0 - (h * i as f64));
                    self.set(g, n, i, h * i as f64);
                }
                self.set(g, n, 0, 0.0);
                self.set(g, 0, n, 0.0);
            }
        }
    }

    fn zero_fill(&mut self, threads: usize) {
        let len = self.data.len();

        // 要素数で分割した連続区間を各スレッドに渡す
        let mut chunks = Vec::with_capacity(threads);
        let mut rest = &mut self.data[..];
        for t in 0..threads {
            let range = flat_range(len, threads, t);
            debug!("zero fill: thread {} -> {:?}", t, range);
            let (chunk, tail) = mem::take(&mut rest).split_at_mut(range.len());
            rest = tail;
            chunks.push(chunk);
        }

        thread::scope(|scope| {
            for chunk in chunks {
                scope.spawn(move || chunk.fill(0.0));
            }
        });
    }

    /// 格子線の間隔の数 N
    #[inline]
    pub fn n(&self) -> usize {
        self.n
    }

    /// 格子幅 h = 1/N
    #[inline]
    pub fn h(&self) -> f64 {
        1.0 / self.n as f64
    }

    #[inline]
    pub fn slots(&self) -> usize {
        self.slots
    }

    /// 1行のセル数 (N+1)
    #[inline]
    pub fn width(&self) -> usize {
        self.n + 1
    }

    /// 1スロットのセル数 (N+1)^2
    #[inline]
    pub fn slot_len(&self) -> usize {
        self.width() * self.width()
    }

    #[inline]
    pub fn index(&self, slot: usize, row: usize, col: usize) -> usize {
        slot * self.slot_len() + row * self.width() + col
    }

    #[inline]
    pub fn get(&self, slot: usize, row: usize, col: usize) -> f64 {
        self.data[self.index(slot, row, col)]
    }

    #[inline]
    pub fn set(&mut self, slot: usize, row: usize, col: usize, value: f64) {
        let idx = self.index(slot, row, col);
        self.data[idx] = value;
    }

    pub fn slot(&self, slot: usize) -> &[f64] {
        let len = self.slot_len();
        &self.data[slot * len..(slot + 1) * len]
    }

    /// 読み出し用スロットと書き込み用スロットを同時に借用する
    pub fn split_slots(&mut self, read: usize, write: usize) -> (&[f64], &mut [f64]) {
        assert_ne!(read, write, "read and write slot must differ");
        let len = self.slot_len();
        let (lower, upper) = self.data.split_at_mut(read.max(write) * len);
        if read < write {
            (&lower[read * len..(read + 1) * len], &mut upper[..len])
        } else {
            (&upper[..len], &mut lower[write * len..(write + 1) * len])
        }
    }

    /// 行列が使うメモリ量 (MiB)
    pub fn memory_mib(&self) -> f64 {
        (self.data.len() * mem::size_of::<f64>()) as f64 / 1024.0 / 1024.0
    }

    /// 境界行・境界列と7本の中間線だけを抜き出した 9x9 の行列
    pub fn sample(&self, slot: usize, interlines: usize) -> [[f64; 9]; 9] {
        let step = interlines + 1;
        let mut out = [[0.0; 9]; 9];
        for (y, row) in out.iter_mut().enumerate() {
            for (x, cell) in row.iter_mut().enumerate() {
                *cell = self.get(slot, y * step, x * step);
            }
        }
        out
    }

    /// 指定スロットを little-endian の f64 列としてファイルに書き出す
    pub fn save_to_file(&self, slot: usize, path: impl AsRef<Path>) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        for value in self.slot(slot) {
            writer.write_all(&value.to_le_bytes())?;
        }
        writer.flush()
    }
}
