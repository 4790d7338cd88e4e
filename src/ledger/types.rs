//! 账本边界上的数据类型：资产、金额、交易引用、账户快照

use std::fmt;

use serde::Serialize;

/// 原生币与两种代币统一使用 18 位小数
pub const DECIMALS: u32 = 18;

/// 配置中的两种可兑换资产
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Asset {
    A,
    B,
}

impl Asset {
    /// 兑换方向上的另一种资产
    pub fn other(self) -> Self {
        match self {
            Asset::A => Asset::B,
            Asset::B => Asset::A,
        }
    }
}

/// 以最小单位表示的金额（10^-18）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash, Serialize)]
pub struct Amount(pub u128);

/// 金额解析错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,
    #[error("invalid amount: {0}")]
    Invalid(String),
    #[error("too many decimal places: {0}")]
    TooPrecise(String),
    #[error("amount overflows: {0}")]
    Overflow(String),
}

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn from_base_units(units: u128) -> Self {
        Self(units)
    }

    /// 整数个单位（如 50 个代币）
    pub fn from_whole(units: u64) -> Self {
        Self(u128::from(units) * 10u128.pow(DECIMALS))
    }

    pub fn base_units(self) -> u128 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// 解析十进制字符串，如 "0.001" → 10^15
    pub fn parse(input: &str) -> Result<Self, AmountError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(AmountError::Empty);
        }
        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(AmountError::Invalid(s.to_string()));
        }
        let all_digits = |p: &str| p.chars().all(|c| c.is_ascii_digit());
        if !all_digits(int_part) || !all_digits(frac_part) {
            return Err(AmountError::Invalid(s.to_string()));
        }
        let frac_trimmed = frac_part.trim_end_matches('0');
        if frac_trimmed.len() > DECIMALS as usize {
            return Err(AmountError::TooPrecise(s.to_string()));
        }
        let overflow = || AmountError::Overflow(s.to_string());
        let int_value: u128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| overflow())?
        };
        let mut frac_value: u128 = 0;
        if !frac_trimmed.is_empty() {
            frac_value = frac_trimmed.parse().map_err(|_| overflow())?;
            frac_value *= 10u128.pow(DECIMALS - frac_trimmed.len() as u32);
        }
        int_value
            .checked_mul(10u128.pow(DECIMALS))
            .and_then(|v| v.checked_add(frac_value))
            .map(Amount)
            .ok_or_else(overflow)
    }
}

impl fmt::Display for Amount {
    /// 以十进制显示，去掉小数部分末尾的 0（"1.5"、"0.001"、"0"）
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scale = 10u128.pow(DECIMALS);
        let int = self.0 / scale;
        let frac = self.0 % scale;
        if frac == 0 {
            return write!(f, "{}", int);
        }
        let frac = format!("{:0width$}", frac, width = DECIMALS as usize);
        write!(f, "{}.{}", int, frac.trim_end_matches('0'))
    }
}

/// 授权额度：无限（uint256 最大值）或精确金额
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allowance {
    Unlimited,
    Exact(Amount),
}

/// 已提交交易的引用（交易哈希）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TxRef(pub String);

impl TxRef {
    pub fn short(&self) -> String {
        short_hex(&self.0)
    }
}

impl fmt::Display for TxRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 水龙头领取的提交结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantOutcome {
    Submitted(TxRef),
    AlreadyGranted,
}

/// 兑换请求（exactInputSingle）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeRequest {
    pub asset_in: Asset,
    pub asset_out: Asset,
    pub amount_in: Amount,
    pub fee_tier: u32,
    pub recipient: String,
}

/// 交易确认结果；received 为确认时指定资产转入本账户的金额，未指定或解析不到时为 None
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub tx: TxRef,
    pub received: Option<Amount>,
}

/// 账户余额缓存视图（UI 只读）
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct AccountSnapshot {
    pub address: String,
    pub native: Amount,
    pub asset_a: Amount,
    pub asset_b: Amount,
    pub network: String,
}

impl AccountSnapshot {
    pub fn empty(network: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            ..Self::default()
        }
    }

    pub fn balance_of(&self, asset: Asset) -> Amount {
        match asset {
            Asset::A => self.asset_a,
            Asset::B => self.asset_b,
        }
    }

    pub fn short_address(&self) -> String {
        if self.address.is_empty() {
            "N/A".to_string()
        } else {
            short_hex(&self.address)
        }
    }
}

/// `0x1234...abcd` 形式的缩写
pub fn short_hex(s: &str) -> String {
    if s.len() <= 10 || !s.is_ascii() {
        return s.to_string();
    }
    format!("{}...{}", &s[..6], &s[s.len() - 4..])
}

/// 是否为 0x 开头的 20 字节十六进制地址
pub fn is_valid_address(s: &str) -> bool {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amounts() {
        assert_eq!(Amount::parse("1").unwrap(), Amount(10u128.pow(18)));
        assert_eq!(Amount::parse("0.001").unwrap(), Amount(10u128.pow(15)));
        assert_eq!(Amount::parse(".5").unwrap(), Amount(5 * 10u128.pow(17)));
        assert_eq!(Amount::parse("2.").unwrap(), Amount(2 * 10u128.pow(18)));
        assert_eq!(Amount::parse(" 0.0001 ").unwrap(), Amount(10u128.pow(14)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(Amount::parse(""), Err(AmountError::Empty));
        assert!(matches!(Amount::parse("abc"), Err(AmountError::Invalid(_))));
        assert!(matches!(Amount::parse("-1"), Err(AmountError::Invalid(_))));
        assert!(matches!(Amount::parse("."), Err(AmountError::Invalid(_))));
        assert!(matches!(
            Amount::parse("0.0000000000000000001"),
            Err(AmountError::TooPrecise(_))
        ));
    }

    #[test]
    fn test_display_trims_trailing_zeros() {
        assert_eq!(Amount::parse("1.50").unwrap().to_string(), "1.5");
        assert_eq!(Amount::parse("0.001").unwrap().to_string(), "0.001");
        assert_eq!(Amount::from_whole(200).to_string(), "200");
        assert_eq!(Amount::ZERO.to_string(), "0");
    }

    #[test]
    fn test_short_hex() {
        assert_eq!(
            short_hex("0x6AAC14f090A35EeA150705f72D90E4CDC4a49b2C"),
            "0x6AAC...9b2C"
        );
        assert_eq!(short_hex("0x1234"), "0x1234");
    }

    #[test]
    fn test_address_validation() {
        assert!(is_valid_address("0x6AAC14f090A35EeA150705f72D90E4CDC4a49b2C"));
        assert!(!is_valid_address("6AAC14f090A35EeA150705f72D90E4CDC4a49b2C"));
        assert!(!is_valid_address("0x6AAC"));
        assert!(!is_valid_address("0xZZAC14f090A35EeA150705f72D90E4CDC4a49b2C"));
    }
}
