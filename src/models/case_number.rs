//! CNJ 案件编号
//!
//! 巴西司法系统统一的 20 位案件编号，格式 `NNNNNNN-DD.AAAA.J.TR.OOOO`：
//! 顺序号(7) - 校验位(2) . 立案年份(4) . 司法分支(1) . 法院(2) . 原审单位(4)
//!
//! 不变式：按固定顺序、固定宽度重新拼接六个字段必须还原原始的 20 位数字串。

use std::fmt;

/// 案件编号解析错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaseNumberError {
    #[error("编号 '{0}' 不是 20 位数字")]
    WrongLength(String),
    #[error("编号 '{0}' 含有非法字符")]
    InvalidFormat(String),
}

/// CNJ 案件编号，按六个字段分解保存
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CaseNumber {
    /// 顺序号（7 位）
    pub sequential: String,
    /// 校验位（2 位）
    pub check_digit: String,
    /// 立案年份（4 位）
    pub year: String,
    /// 司法分支代码（1 位）
    pub segment: String,
    /// 法院代码（2 位）
    pub court: String,
    /// 原审单位代码（4 位）
    pub origin: String,
}

impl CaseNumber {
    /// 解析案件编号
    ///
    /// 接受两种输入：
    /// - 标准格式 `NNNNNNN-DD.AAAA.J.TR.OOOO`
    /// - 纯 20 位数字串
    pub fn parse(input: &str) -> Result<Self, CaseNumberError> {
        let trimmed = input.trim();

        let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
        let non_digits_ok = trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || c == '-' || c == '.' || c.is_whitespace());

        if !non_digits_ok {
            return Err(CaseNumberError::InvalidFormat(trimmed.to_string()));
        }
        if digits.len() != 20 {
            return Err(CaseNumberError::WrongLength(trimmed.to_string()));
        }

        Ok(Self {
            sequential: digits[0..7].to_string(),
            check_digit: digits[7..9].to_string(),
            year: digits[9..13].to_string(),
            segment: digits[13..14].to_string(),
            court: digits[14..16].to_string(),
            origin: digits[16..20].to_string(),
        })
    }

    /// 还原为 20 位数字串（字段按固定顺序、固定宽度拼接）
    pub fn digits(&self) -> String {
        format!(
            "{}{}{}{}{}{}",
            self.sequential, self.check_digit, self.year, self.segment, self.court, self.origin
        )
    }

    /// 标准展示格式 `NNNNNNN-DD.AAAA.J.TR.OOOO`
    pub fn formatted(&self) -> String {
        format!(
            "{}-{}.{}.{}.{}.{}",
            self.sequential, self.check_digit, self.year, self.segment, self.court, self.origin
        )
    }
}

impl fmt::Display for CaseNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.formatted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_formatted_number() {
        let n = CaseNumber::parse("8128688-83.2024.8.05.0001").unwrap();
        assert_eq!(n.sequential, "8128688");
        assert_eq!(n.check_digit, "83");
        assert_eq!(n.year, "2024");
        assert_eq!(n.segment, "8");
        assert_eq!(n.court, "05");
        assert_eq!(n.origin, "0001");
    }

    #[test]
    fn parses_bare_digits() {
        let n = CaseNumber::parse("81286888320248050001").unwrap();
        assert_eq!(n.formatted(), "8128688-83.2024.8.05.0001");
    }

    #[test]
    fn round_trips_through_digits() {
        // 分解后重新拼接必须得到原始 20 位数字串
        let originals = [
            "81286888320248050001",
            "00000010120158190001",
            "99999999920009999999",
        ];
        for original in originals {
            let n = CaseNumber::parse(original).unwrap();
            assert_eq!(n.digits(), original);

            let reparsed = CaseNumber::parse(&n.formatted()).unwrap();
            assert_eq!(reparsed, n);
        }
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(matches!(
            CaseNumber::parse("12345"),
            Err(CaseNumberError::WrongLength(_))
        ));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            CaseNumber::parse("8128688-83.2024.8.05.000X"),
            Err(CaseNumberError::InvalidFormat(_))
        ));
    }
}
