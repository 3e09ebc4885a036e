//! 有理数, 用于时间基与帧率.

use std::fmt;

/// 有理数 `num/den`
///
/// 会话中的时间基总是帧率的倒数, 例如 25 fps 对应时间基 1/25.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    /// 分子
    pub num: i32,
    /// 分母
    pub den: i32,
}

impl Rational {
    /// 未定义 (分母为 0)
    pub const UNDEFINED: Self = Self { num: 0, den: 0 };

    /// 毫秒时间基
    pub const MILLI: Self = Self { num: 1, den: 1_000 };

    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// 由整数帧率构造帧率有理数 (fps/1)
    pub const fn from_fps(fps: u32) -> Self {
        Self {
            num: fps as i32,
            den: 1,
        }
    }

    /// 分母非零
    pub const fn is_valid(&self) -> bool {
        self.den != 0
    }

    /// 分子分母均为正
    pub const fn is_positive(&self) -> bool {
        self.num > 0 && self.den > 0
    }

    /// 转为浮点, 分母为 0 时返回 NaN
    pub fn to_f64(self) -> f64 {
        if self.den == 0 {
            f64::NAN
        } else {
            f64::from(self.num) / f64::from(self.den)
        }
    }

    /// 约分, 结果分母为正
    pub fn reduce(self) -> Self {
        let g = gcd(self.num.unsigned_abs(), self.den.unsigned_abs());
        if self.den == 0 || g == 0 {
            return self;
        }
        let g = g as i32;
        let sign = self.den.signum();
        Self::new(sign * self.num / g, sign * self.den / g)
    }

    /// 倒数 (帧率 ↔ 时间基)
    pub const fn invert(self) -> Self {
        Self::new(self.den, self.num)
    }
}

/// 将 `value` 从时间基 `from` 换算到 `to`, 向下取整
///
/// 任一时间基无效时原样返回.
pub fn rescale(value: i64, from: Rational, to: Rational) -> i64 {
    if !from.is_valid() || !to.is_valid() || to.num == 0 {
        return value;
    }
    let num = i128::from(value) * i128::from(from.num) * i128::from(to.den);
    let den = i128::from(from.den) * i128::from(to.num);
    (num.div_euclid(den)) as i64
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl From<(i32, i32)> for Rational {
    fn from((num, den): (i32, i32)) -> Self {
        Self::new(num, den)
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_帧率与时间基互为倒数() {
        let fps = Rational::from_fps(25);
        assert_eq!(fps.invert(), Rational::new(1, 25));
        assert!((fps.invert().to_f64() - 0.04).abs() < 1e-12);
    }

    #[test]
    fn test_约分() {
        assert_eq!(Rational::new(30, 60).reduce(), Rational::new(1, 2));
        assert_eq!(Rational::new(3, -9).reduce(), Rational::new(-1, 3));
        assert_eq!(Rational::UNDEFINED.reduce(), Rational::UNDEFINED);
    }

    #[test]
    fn test_时间基换算() {
        // 第 50 帧 @ 25fps = 2 秒 = 2000 ms
        assert_eq!(rescale(50, Rational::new(1, 25), Rational::MILLI), 2000);
        // 1/30 → 1/90000
        assert_eq!(rescale(1, Rational::new(1, 30), Rational::new(1, 90000)), 3000);
        // 无效时间基原样返回
        assert_eq!(rescale(7, Rational::UNDEFINED, Rational::MILLI), 7);
    }

    #[test]
    fn test_有效性() {
        assert!(Rational::new(1, 25).is_positive());
        assert!(!Rational::new(0, 25).is_positive());
        assert!(!Rational::UNDEFINED.is_valid());
        assert!(Rational::UNDEFINED.to_f64().is_nan());
    }
}
