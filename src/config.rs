//! Client configuration: the one target network, the three contract
//! addresses, token precision, display precision, and the approval sizing
//! policy. Loadable from a JSON record; defaults to the production
//! deployment.

use std::{fs, path::Path};

use serde::Deserialize;
use thiserror::Error;

use crate::{
    amount,
    approval::ApprovalPolicy,
    chain::{Address, NetworkId},
};

/// The single supported network.
pub const TARGET_NETWORK: NetworkId = NetworkId(143);

pub const TOKEN_ADDRESS: Address = Address([
    0x09, 0x16, 0x6b, 0xfa, 0x4a, 0x40, 0xba, 0xbc, 0x19, 0xcc, 0xce, 0xc6, 0xa6,
    0x15, 0x4d, 0x9c, 0x05, 0x80, 0x98, 0xec,
]);

pub const SWAP_CONTRACT_ADDRESS: Address = Address([
    0xcd, 0xce, 0x34, 0x85, 0x75, 0x2e, 0x7a, 0x7d, 0x43, 0x23, 0xf8, 0x99, 0xfe,
    0xe1, 0x52, 0xd9, 0xf2, 0x7e, 0x89, 0x0b,
]);

pub const DICE_CONTRACT_ADDRESS: Address = Address([
    0xe9, 0xed, 0x2c, 0x29, 0x87, 0xda, 0x02, 0x89, 0x23, 0x3a, 0x1a, 0x1a, 0xe2,
    0x44, 0x38, 0xa3, 0x14, 0xad, 0x6b, 0x2f,
]);

pub const TOKEN_DECIMALS: u8 = 18;
pub const DISPLAY_DIGITS: u8 = 4;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub network_id: NetworkId,
    pub token: Address,
    pub swap_contract: Address,
    pub dice_contract: Address,
    pub token_decimals: u8,
    pub display_digits: u8,
    pub approval_policy: ApprovalPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            network_id: TARGET_NETWORK,
            token: TOKEN_ADDRESS,
            swap_contract: SWAP_CONTRACT_ADDRESS,
            dice_contract: DICE_CONTRACT_ADDRESS,
            token_decimals: TOKEN_DECIMALS,
            display_digits: DISPLAY_DIGITS,
            // Exact-amount approvals by default: every grant is scoped to
            // the operation the user just confirmed. Set a ceiling in the
            // config record to trade repeat prompts for a standing quota.
            approval_policy: ApprovalPolicy::Exact,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid approval ceiling: {0}")]
    BadCeiling(String),
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    network_id: NetworkId,
    token: Address,
    swap_contract: Address,
    dice_contract: Address,
    #[serde(default = "default_decimals")]
    token_decimals: u8,
    #[serde(default = "default_display_digits")]
    display_digits: u8,
    #[serde(default)]
    approval_ceiling: Option<String>,
}

fn default_decimals() -> u8 {
    TOKEN_DECIMALS
}

fn default_display_digits() -> u8 {
    DISPLAY_DIGITS
}

impl AppConfig {
    /// Loads a JSON config record from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let data = fs::read(path.as_ref())?;
        let raw: RawConfig = serde_json::from_slice(&data)?;
        let approval_policy = match raw.approval_ceiling {
            None => ApprovalPolicy::Exact,
            Some(ceiling) => {
                let amount = amount::parse(&ceiling, raw.token_decimals)
                    .map_err(|err| ConfigError::BadCeiling(err.to_string()))?;
                ApprovalPolicy::Ceiling(amount)
            }
        };
        Ok(Self {
            network_id: raw.network_id,
            token: raw.token,
            swap_contract: raw.swap_contract,
            dice_contract: raw.dice_contract,
            token_decimals: raw.token_decimals,
            display_digits: raw.display_digits,
            approval_policy,
        })
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::amount::TokenAmount;

    #[test]
    fn load__parses_a_full_record() {
        let dir = std::env::temp_dir().join("vindice-config-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(
            &path,
            r#"{
                "network_id": 143,
                "token": "0x09166bFA4a40BAbC19CCCEc6A6154d9c058098EC",
                "swap_contract": "0xCdce3485752E7a7D4323f899FEe152D9F27e890B",
                "dice_contract": "0xE9Ed2c2987da0289233A1a1AE24438A314Ad6B2f",
                "approval_ceiling": "1000000"
            }"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.network_id, TARGET_NETWORK);
        assert_eq!(config.token, TOKEN_ADDRESS);
        assert_eq!(config.token_decimals, TOKEN_DECIMALS);
        assert_eq!(
            config.approval_policy,
            ApprovalPolicy::Ceiling(TokenAmount::from_units(
                1_000_000u128 * 10u128.pow(18),
                TOKEN_DECIMALS
            ))
        );
    }

    #[test]
    fn default__uses_exact_approvals() {
        assert_eq!(AppConfig::default().approval_policy, ApprovalPolicy::Exact);
    }
}
