//! 最小化的 ABI 编解码：只覆盖本程序用到的几个函数
//!
//! 所有参数均为静态类型，按 32 字节字依次拼接；选择器为预先计算好的常量。

use super::{Allowance, Amount, LedgerError};

/// `mint()`
pub const SELECTOR_MINT: &str = "1249c58b";
/// `isMinter(address)`
pub const SELECTOR_IS_MINTER: &str = "aa271e1a";
/// `balanceOf(address)`
pub const SELECTOR_BALANCE_OF: &str = "70a08231";
/// `approve(address,uint256)`
pub const SELECTOR_APPROVE: &str = "095ea7b3";
/// `exactInputSingle((address,address,uint24,address,uint256,uint256,uint160))`
pub const SELECTOR_EXACT_INPUT_SINGLE: &str = "04e45aaf";

/// ERC-20 `Transfer(address,address,uint256)` 事件主题
pub const TRANSFER_TOPIC: &str =
    "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

const WORD_HEX: usize = 64;

pub(crate) fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s)
}

/// 地址左补零为 32 字节
pub fn encode_address(address: &str) -> Result<String, LedgerError> {
    let hex = strip_0x(address.trim());
    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(LedgerError::Rejected(format!("invalid address: {}", address)));
    }
    Ok(format!("{:0>64}", hex.to_lowercase()))
}

pub fn encode_u128(value: u128) -> String {
    format!("{:064x}", value)
}

pub fn encode_allowance(allowance: Allowance) -> String {
    match allowance {
        Allowance::Unlimited => "f".repeat(WORD_HEX),
        Allowance::Exact(amount) => encode_u128(amount.base_units()),
    }
}

fn calldata(selector: &str, words: &[String]) -> String {
    let mut out = String::with_capacity(2 + selector.len() + words.len() * WORD_HEX);
    out.push_str("0x");
    out.push_str(selector);
    for w in words {
        out.push_str(w);
    }
    out
}

pub fn mint() -> String {
    calldata(SELECTOR_MINT, &[])
}

pub fn is_minter(account: &str) -> Result<String, LedgerError> {
    Ok(calldata(SELECTOR_IS_MINTER, &[encode_address(account)?]))
}

pub fn balance_of(account: &str) -> Result<String, LedgerError> {
    Ok(calldata(SELECTOR_BALANCE_OF, &[encode_address(account)?]))
}

pub fn approve(spender: &str, allowance: Allowance) -> Result<String, LedgerError> {
    Ok(calldata(
        SELECTOR_APPROVE,
        &[encode_address(spender)?, encode_allowance(allowance)],
    ))
}

/// exactInputSingle，amountOutMinimum 与 sqrtPriceLimitX96 均为 0
pub fn exact_input_single(
    token_in: &str,
    token_out: &str,
    fee_tier: u32,
    recipient: &str,
    amount_in: Amount,
) -> Result<String, LedgerError> {
    Ok(calldata(
        SELECTOR_EXACT_INPUT_SINGLE,
        &[
            encode_address(token_in)?,
            encode_address(token_out)?,
            encode_u128(u128::from(fee_tier)),
            encode_address(recipient)?,
            encode_u128(amount_in.base_units()),
            encode_u128(0),
            encode_u128(0),
        ],
    ))
}

/// 解析 JSON-RPC 数量（"0x1bc16d674ec80000"）或 32 字节字；超过 u128 视为错误
pub fn decode_u128(hex: &str) -> Result<u128, LedgerError> {
    let digits = strip_0x(hex.trim()).trim_start_matches('0');
    if digits.is_empty() {
        return Ok(0);
    }
    if digits.len() > 32 {
        return Err(LedgerError::Decode(format!("value exceeds u128: 0x{}", digits)));
    }
    u128::from_str_radix(digits, 16)
        .map_err(|e| LedgerError::Decode(format!("bad hex quantity {}: {}", hex, e)))
}

pub fn decode_bool(hex: &str) -> Result<bool, LedgerError> {
    Ok(decode_u128(hex)? != 0)
}

/// 32 字节主题中的地址部分与给定地址是否一致
pub fn topic_matches_address(topic: &str, address: &str) -> bool {
    let topic = strip_0x(topic);
    let address = strip_0x(address);
    topic.len() == WORD_HEX
        && address.len() == 40
        && topic[24..].eq_ignore_ascii_case(address)
}

pub fn encode_quantity(value: u128) -> String {
    format!("{:#x}", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROUTER: &str = "0x6AAC14f090A35EeA150705f72D90E4CDC4a49b2C";

    #[test]
    fn test_balance_of_layout() {
        let data = balance_of(ROUTER).unwrap();
        assert!(data.starts_with("0x70a08231"));
        assert_eq!(data.len(), 2 + 8 + 64);
        assert!(data.ends_with("6aac14f090a35eea150705f72d90e4cdc4a49b2c"));
    }

    #[test]
    fn test_unlimited_approve() {
        let data = approve(ROUTER, Allowance::Unlimited).unwrap();
        assert_eq!(data.len(), 2 + 8 + 128);
        assert!(data.ends_with(&"f".repeat(64)));
    }

    #[test]
    fn test_exact_input_single_is_seven_words() {
        let data = exact_input_single(ROUTER, ROUTER, 500, ROUTER, Amount::from_whole(1)).unwrap();
        assert_eq!(data.len(), 2 + 8 + 7 * 64);
        // fee 字段
        assert_eq!(&data[10 + 128..10 + 192], &encode_u128(500));
    }

    #[test]
    fn test_bad_address_rejected() {
        assert!(matches!(balance_of("0x12"), Err(LedgerError::Rejected(_))));
    }

    #[test]
    fn test_decode_quantities() {
        assert_eq!(decode_u128("0x0").unwrap(), 0);
        assert_eq!(decode_u128("0x").unwrap(), 0);
        assert_eq!(decode_u128("0xde0b6b3a7640000").unwrap(), 10u128.pow(18));
        assert!(decode_bool(&format!("0x{}", encode_u128(1))).unwrap());
        assert!(decode_u128(&format!("0x{}", "f".repeat(64))).is_err());
    }

    #[test]
    fn test_selectors_match_signatures() {
        use crate::ledger::signer::keccak256;
        let selector = |sig: &str| hex::encode(&keccak256(sig.as_bytes())[..4]);
        assert_eq!(selector("mint()"), SELECTOR_MINT);
        assert_eq!(selector("isMinter(address)"), SELECTOR_IS_MINTER);
        assert_eq!(selector("balanceOf(address)"), SELECTOR_BALANCE_OF);
        assert_eq!(selector("approve(address,uint256)"), SELECTOR_APPROVE);
        assert_eq!(
            selector("exactInputSingle((address,address,uint24,address,uint256,uint256,uint160))"),
            SELECTOR_EXACT_INPUT_SINGLE
        );
        assert_eq!(
            format!("0x{}", hex::encode(keccak256(b"Transfer(address,address,uint256)"))),
            TRANSFER_TOPIC
        );
    }

    #[test]
    fn test_topic_match() {
        let topic = format!("0x{}", encode_address(ROUTER).unwrap());
        assert!(topic_matches_address(&topic, ROUTER));
        assert!(!topic_matches_address(&topic, "0x0000000000000000000000000000000000000001"));
    }
}
