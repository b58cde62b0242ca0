use std::ops::Range;

/// 要素数 `len` を `threads` 個の連続区間に分割し、`thread` 番目の区間を返す。
///
/// 余り `len % threads` は先頭のスレッドから1つずつ配る。
/// 区間の大きさの差は高々1。
#[inline]
pub fn flat_range(len: usize, threads: usize, thread: usize) -> Range<usize> {
    debug_assert!(threads >= 1 && thread < threads);

    let count = len / threads;
    let remainder = len % threads;

    let lower = thread * count + thread.min(remainder);
    let upper = lower + count + usize::from(thread < remainder);

    lower..upper
}

/// 内部行 `1..=rows` を分割し、`thread` 番目のスレッドが担当する行 `[lower, upper)` を返す。
///
/// lower = 1 + t * count + min(t, remainder)
#[inline]
pub fn row_range(rows: usize, threads: usize, thread: usize) -> Range<usize> {
    let flat = flat_range(rows, threads, thread);
    flat.start + 1..flat.end + 1
}
