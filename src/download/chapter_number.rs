//! 可带小数的章节号（`63`、`63.1`）。
//!
//! 内部按十分位整数保存，避免浮点累加误差：`63.1` 的下一个子章节与解析出的
//! `63.2` 严格相等。

use std::cmp::Ordering;
use std::fmt;

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChapterNumber {
    tenths: i64,
}

impl Default for ChapterNumber {
    fn default() -> Self {
        Self::ONE
    }
}

/// 十分位的绝对值上限，超出的输入截断到该值，保证步进运算不会溢出。
const MAX_TENTHS: i64 = 999_999_999_999_990;

impl ChapterNumber {
    pub const ONE: ChapterNumber = ChapterNumber { tenths: 10 };

    /// 解析章节号。取字符串开头的数字部分（与 `parseFloat` 一致），
    /// 保留一位小数；无法解析或为空时返回 `1`，永不失败。
    pub fn parse(input: &str) -> Self {
        numeric_prefix(input.trim())
            .and_then(|prefix| prefix.parse::<f64>().ok())
            .map(Self::from_f64)
            .unwrap_or(Self::ONE)
    }

    /// 从接口返回的 JSON 字段解析：数字直接取值，字符串走 [`ChapterNumber::parse`]。
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Number(n) => n.as_f64().map(Self::from_f64).unwrap_or(Self::ONE),
            Value::String(s) => Self::parse(s),
            _ => Self::ONE,
        }
    }

    pub fn from_f64(value: f64) -> Self {
        if !value.is_finite() {
            return Self::ONE;
        }
        let bound = MAX_TENTHS as f64;
        Self {
            tenths: (value * 10.0).round().clamp(-bound, bound) as i64,
        }
    }

    pub fn whole(self) -> i64 {
        self.tenths.div_euclid(10)
    }

    /// 子章节序号（十分位），`0` 表示整章。
    pub fn sub_ordinal(self) -> i64 {
        self.tenths.rem_euclid(10)
    }

    pub fn is_whole(self) -> bool {
        self.sub_ordinal() == 0
    }

    pub fn next_whole(self) -> Self {
        Self {
            tenths: self.whole().saturating_add(1).saturating_mul(10),
        }
    }

    pub fn first_sub(self) -> Self {
        Self {
            tenths: self.whole().saturating_mul(10).saturating_add(1),
        }
    }

    /// 下一个子章节；序号 9 已是最后一个，返回 `None`。
    pub fn next_sub(self) -> Option<Self> {
        let next = self.sub_ordinal() + 1;
        if next >= 10 {
            return None;
        }
        let tenths = self.whole().checked_mul(10)?.checked_add(next)?;
        Some(Self { tenths })
    }

    pub fn compare(a: Self, b: Self) -> Ordering {
        a.cmp(&b)
    }
}

impl fmt::Display for ChapterNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_whole() {
            write!(f, "{}", self.whole())
        } else {
            write!(f, "{:.1}", self.tenths as f64 / 10.0)
        }
    }
}

/// 取出形如 `[+-]?\d*(\.\d*)?` 且至少含一位数字的前缀。
fn numeric_prefix(s: &str) -> Option<&str> {
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let mut digits = 0;
    let mut seen_dot = false;
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => digits += 1,
            b'.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end += 1;
    }
    if digits == 0 {
        return None;
    }
    Some(s[..end].trim_end_matches('.'))
}
