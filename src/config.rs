//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `AUTOSWAP__*` 覆盖（双下划线表示嵌套，如 `AUTOSWAP__NETWORK__RPC_URL=...`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::core::delay::DelayRange;
use crate::core::log_sink::DEFAULT_LOG_CAPACITY;
use crate::core::state::{ClaimLock, ExclusionScope};
use crate::ledger::{Amount, Asset};

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub network: NetworkSection,
    pub account: AccountSection,
    pub assets: AssetsSection,
    pub swap: SwapSection,
    pub send: SendSection,
    pub claim: ClaimSection,
    pub tasks: TasksSection,
    pub log: LogSection,
}

/// [network] 段：RPC 端点与网络名；rpc_url 为空时使用离线 Mock 账本
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkSection {
    pub rpc_url: Option<String>,
    pub name: String,
    /// 单次 HTTP 请求超时（秒），不限制等待确认的总时长
    pub request_timeout_secs: u64,
    /// 轮询交易回执的间隔（毫秒）
    pub receipt_poll_ms: u64,
    /// 离线 Mock 账本模拟的确认耗时（毫秒）
    pub mock_latency_ms: u64,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            rpc_url: None,
            name: "Somnia Testnet".to_string(),
            request_timeout_secs: 30,
            receipt_poll_ms: 1_000,
            mock_latency_ms: 800,
        }
    }
}

/// [account] 段：操作账户
///
/// 配置 private_key 时在本地签名并通过 eth_sendRawTransaction 广播，地址由私钥推导；
/// 否则以 address 为 from 调用 eth_sendTransaction，由端点或签名代理签名。
#[derive(Clone, Deserialize, Default)]
#[serde(default)]
pub struct AccountSection {
    pub address: Option<String>,
    /// 一般通过 AUTOSWAP__ACCOUNT__PRIVATE_KEY 提供
    pub private_key: Option<String>,
}

impl std::fmt::Debug for AccountSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountSection")
            .field("address", &self.address)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// [assets] 段：两种代币的合约地址与符号
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssetsSection {
    pub a_address: String,
    pub a_symbol: String,
    pub b_address: String,
    pub b_symbol: String,
    pub native_symbol: String,
}

impl Default for AssetsSection {
    fn default() -> Self {
        Self {
            a_address: String::new(),
            a_symbol: "PING".to_string(),
            b_address: String::new(),
            b_symbol: "PONG".to_string(),
            native_symbol: "STT".to_string(),
        }
    }
}

impl AssetsSection {
    pub fn symbol(&self, asset: Asset) -> &str {
        match asset {
            Asset::A => &self.a_symbol,
            Asset::B => &self.b_symbol,
        }
    }

    pub fn address(&self, asset: Asset) -> &str {
        match asset {
            Asset::A => &self.a_address,
            Asset::B => &self.b_address,
        }
    }
}

/// [swap] 段：路由合约、手续费档位、随机金额与间隔
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SwapSection {
    pub router: String,
    pub fee_tier: u32,
    /// 每次兑换的整数金额区间
    pub amount_min: u64,
    pub amount_max: u64,
    pub delay_min_ms: u64,
    pub delay_max_ms: u64,
    /// true 时每轮都重新授权；默认每次运行每种资产只授权一次
    pub reauthorize_every_iteration: bool,
}

impl Default for SwapSection {
    fn default() -> Self {
        Self {
            router: "0x6AAC14f090A35EeA150705f72D90E4CDC4a49b2C".to_string(),
            fee_tier: 500,
            amount_min: 50,
            amount_max: 200,
            delay_min_ms: 20_000,
            delay_max_ms: 50_000,
            reauthorize_every_iteration: false,
        }
    }
}

impl SwapSection {
    pub fn delay(&self) -> DelayRange {
        DelayRange::new(self.delay_min_ms, self.delay_max_ms)
    }
}

/// [send] 段：地址列表文件、间隔与随机发送的金额上下限
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SendSection {
    pub recipients_file: PathBuf,
    pub delay_min_ms: u64,
    pub delay_max_ms: u64,
    pub min_amount: String,
    pub max_amount: String,
}

impl Default for SendSection {
    fn default() -> Self {
        Self {
            recipients_file: PathBuf::from("randomaddress.txt"),
            delay_min_ms: 5_000,
            delay_max_ms: 10_000,
            min_amount: "0.0001".to_string(),
            max_amount: "0.01".to_string(),
        }
    }
}

impl SendSection {
    pub fn delay(&self) -> DelayRange {
        DelayRange::new(self.delay_min_ms, self.delay_max_ms)
    }

    /// 随机发送允许的金额区间；配置无法解析时退回默认值
    pub fn amount_bounds(&self) -> (Amount, Amount) {
        let defaults = SendSection::default();
        let parse = |s: &str, fallback: &str| {
            Amount::parse(s)
                .or_else(|_| Amount::parse(fallback))
                .unwrap_or(Amount::ZERO)
        };
        (
            parse(&self.min_amount, &defaults.min_amount),
            parse(&self.max_amount, &defaults.max_amount),
        )
    }
}

/// [claim] 段：领取成功后的等待时长与锁粒度
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClaimSection {
    pub settle_ms: u64,
    pub lock: ClaimLock,
}

impl Default for ClaimSection {
    fn default() -> Self {
        Self {
            settle_ms: 5_000,
            lock: ClaimLock::Shared,
        }
    }
}

/// [tasks] 段：任务族之间的互斥范围
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TasksSection {
    pub exclusion: ExclusionScope,
}

/// [log] 段：交易日志保留条数与 tracing 输出文件
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSection {
    pub capacity: usize,
    pub file: PathBuf,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_LOG_CAPACITY,
            file: PathBuf::from("autoswap.log"),
        }
    }
}

/// 从 config 目录加载配置，环境变量 AUTOSWAP__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 AUTOSWAP__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("AUTOSWAP")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
