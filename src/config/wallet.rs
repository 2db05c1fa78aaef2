use std::env;
use std::sync::Arc;

use solana_sdk::signature::Keypair;

use super::WalletConfig;
use super::loader::ConfigError;

pub const PRIVATE_KEY_ENV: &str = "LANDER_PRIVATE_KEY";

/// 环境变量优先，其次读取 `wallet.private_key`。
pub fn load_keypair(wallet: &WalletConfig) -> Result<Arc<Keypair>, ConfigError> {
    if let Ok(value) = env::var(PRIVATE_KEY_ENV) {
        if !value.trim().is_empty() {
            let keypair = parse_keypair_string(value.trim()).map_err(|err| {
                ConfigError::Wallet(format!("环境变量 {PRIVATE_KEY_ENV} 非法: {err}"))
            })?;
            return Ok(Arc::new(keypair));
        }
    }

    if !wallet.private_key.trim().is_empty() {
        let keypair = parse_keypair_string(wallet.private_key.trim())
            .map_err(|err| ConfigError::Wallet(format!("配置 wallet.private_key 非法: {err}")))?;
        return Ok(Arc::new(keypair));
    }

    Err(ConfigError::Wallet(format!(
        "缺少私钥配置，请提供 wallet.private_key 或环境变量 {PRIVATE_KEY_ENV}"
    )))
}

/// 支持 JSON 字节数组、逗号分隔字节与 base58 三种写法。
pub fn parse_keypair_string(raw: &str) -> Result<Keypair, anyhow::Error> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        anyhow::bail!("keypair string empty");
    }

    if trimmed.starts_with('[') {
        let bytes: Vec<u8> = serde_json::from_str(trimmed)?;
        Ok(Keypair::try_from(bytes.as_slice())?)
    } else if trimmed.contains(',') {
        let bytes = trimmed
            .split(',')
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .map(|part| part.parse::<u8>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Keypair::try_from(bytes.as_slice())?)
    } else {
        let data = bs58::decode(trimmed).into_vec()?;
        Ok(Keypair::try_from(data.as_slice())?)
    }
}
