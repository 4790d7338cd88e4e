//! 本地签名：secp256k1 私钥签署 EIP-155 交易
//!
//! 交易按 legacy 格式 RLP 编码，签名哈希为 keccak256(rlp([nonce, gasPrice, gas, to, value, data, chainId, 0, 0]))，
//! v = recid + chainId * 2 + 35。地址取未压缩公钥 keccak256 的后 20 字节。

use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use sha3::{Digest, Keccak256};

use crate::ledger::abi::strip_0x;
use crate::ledger::LedgerError;

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// 待签名的 legacy 交易
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTx {
    pub nonce: u128,
    pub gas_price: u128,
    pub gas_limit: u128,
    /// 20 字节收款/合约地址
    pub to: Vec<u8>,
    pub value: u128,
    pub data: Vec<u8>,
}

impl LegacyTx {
    fn fields(&self) -> Vec<Vec<u8>> {
        vec![
            rlp_uint(self.nonce),
            rlp_uint(self.gas_price),
            rlp_uint(self.gas_limit),
            rlp_bytes(&self.to),
            rlp_uint(self.value),
            rlp_bytes(&self.data),
        ]
    }

    pub fn signing_payload(&self, chain_id: u64) -> Vec<u8> {
        let mut fields = self.fields();
        fields.extend([rlp_uint(u128::from(chain_id)), rlp_uint(0), rlp_uint(0)]);
        rlp_list(&fields)
    }
}

/// 持有私钥的签名器
pub struct LocalSigner {
    key: SigningKey,
    address: String,
}

impl LocalSigner {
    /// 解析 32 字节十六进制私钥（可带 0x 前缀）
    pub fn from_hex(secret: &str) -> Result<Self, LedgerError> {
        let bytes = hex::decode(strip_0x(secret.trim()))
            .map_err(|_| LedgerError::Rejected("private key is not valid hex".to_string()))?;
        let key = SigningKey::from_slice(&bytes)
            .map_err(|_| LedgerError::Rejected("private key is not a valid secp256k1 scalar".to_string()))?;
        let point = key.verifying_key().to_encoded_point(false);
        let hash = keccak256(&point.as_bytes()[1..]);
        let address = format!("0x{}", hex::encode(&hash[12..]));
        Ok(Self { key, address })
    }

    /// 小写十六进制地址
    pub fn address(&self) -> &str {
        &self.address
    }

    /// 签名并返回可直接用于 eth_sendRawTransaction 的字节
    pub fn sign_legacy(&self, tx: &LegacyTx, chain_id: u64) -> Result<Vec<u8>, LedgerError> {
        let sighash = keccak256(&tx.signing_payload(chain_id));
        let (signature, recid) = self
            .key
            .sign_prehash_recoverable(&sighash)
            .map_err(|e| LedgerError::Rejected(format!("signing failed: {}", e)))?;
        let rs = signature.to_bytes();
        let v = u128::from(recid.to_byte()) + u128::from(chain_id) * 2 + 35;

        let mut fields = tx.fields();
        fields.extend([
            rlp_uint(v),
            rlp_bytes(trim_leading_zeros(&rs[..32])),
            rlp_bytes(trim_leading_zeros(&rs[32..])),
        ]);
        Ok(rlp_list(&fields))
    }
}

fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[first..]
}

fn rlp_length_prefix(out: &mut Vec<u8>, len: usize, offset: u8) {
    if len < 56 {
        out.push(offset + len as u8);
    } else {
        let be = (len as u64).to_be_bytes();
        let len_bytes = trim_leading_zeros(&be);
        out.push(offset + 55 + len_bytes.len() as u8);
        out.extend_from_slice(len_bytes);
    }
}

fn rlp_bytes(bytes: &[u8]) -> Vec<u8> {
    if bytes.len() == 1 && bytes[0] < 0x80 {
        return vec![bytes[0]];
    }
    let mut out = Vec::with_capacity(bytes.len() + 9);
    rlp_length_prefix(&mut out, bytes.len(), 0x80);
    out.extend_from_slice(bytes);
    out
}

/// 整数按无前导零的大端字节编码；0 编码为空串
fn rlp_uint(value: u128) -> Vec<u8> {
    let be = value.to_be_bytes();
    rlp_bytes(trim_leading_zeros(&be))
}

fn rlp_list(items: &[Vec<u8>]) -> Vec<u8> {
    let payload_len: usize = items.iter().map(Vec::len).sum();
    let mut out = Vec::with_capacity(payload_len + 9);
    rlp_length_prefix(&mut out, payload_len, 0xc0);
    for item in items {
        out.extend_from_slice(item);
    }
    out
}
