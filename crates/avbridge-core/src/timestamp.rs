//! 带时间基的时间戳.

use std::fmt;

use crate::rational::{self, Rational};

/// 未定义的时间戳值
pub const NOPTS_VALUE: i64 = i64::MIN;

/// 时间戳 = `value × time_base` 秒
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub value: i64,
    pub time_base: Rational,
}

impl Timestamp {
    pub const fn new(value: i64, time_base: Rational) -> Self {
        Self { value, time_base }
    }

    /// 未定义的时间戳
    pub const fn none() -> Self {
        Self::new(NOPTS_VALUE, Rational::UNDEFINED)
    }

    pub const fn is_valid(&self) -> bool {
        self.value != NOPTS_VALUE && self.time_base.is_valid()
    }

    /// 秒数, 无效时返回 NaN
    pub fn seconds(&self) -> f64 {
        if self.is_valid() {
            self.value as f64 * self.time_base.to_f64()
        } else {
            f64::NAN
        }
    }

    /// 换算到新的时间基
    pub fn rescale(&self, time_base: Rational) -> Self {
        if !self.is_valid() || !time_base.is_valid() || time_base.num == 0 {
            return Self::none();
        }
        Self::new(
            rational::rescale(self.value, self.time_base, time_base),
            time_base,
        )
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{:.3}s", self.seconds())
        } else {
            write!(f, "NOPTS")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_秒数() {
        let ts = Timestamp::new(75, Rational::new(1, 25));
        assert!((ts.seconds() - 3.0).abs() < 1e-12);
        assert_eq!(ts.to_string(), "3.000s");
    }

    #[test]
    fn test_换算() {
        let ts = Timestamp::new(3, Rational::new(1, 30)).rescale(Rational::new(1, 90000));
        assert_eq!(ts.value, 9000);
        assert_eq!(ts.time_base.den, 90000);
    }

    #[test]
    fn test_未定义() {
        let ts = Timestamp::none();
        assert!(!ts.is_valid());
        assert!(ts.seconds().is_nan());
        assert_eq!(ts.to_string(), "NOPTS");
        assert!(!ts.rescale(Rational::MILLI).is_valid());
    }
}
