//! 测试图样.

/// 棋盘格周期 (像素)
pub const CHECKER_PERIOD: usize = 32;

/// 按帧序号平移的棋盘格
///
/// 行列各自平移 `frame` 像素后落在偶数格上的像素所有通道为 255, 其余为 0.
pub fn fill_checkerboard(buf: &mut [u8], width: usize, height: usize, bpp: usize, frame: usize) {
    let stride = width * bpp;
    for (row, line) in buf.chunks_exact_mut(stride).take(height).enumerate() {
        let row_on = ((row + frame) / CHECKER_PERIOD) % 2 == 0;
        for (col, px) in line.chunks_exact_mut(bpp).enumerate() {
            let col_on = ((col + frame) / CHECKER_PERIOD) % 2 == 0;
            px.fill(if row_on && col_on { 255 } else { 0 });
        }
    }
}
