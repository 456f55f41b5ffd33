//! CAIP-2 chain identifiers, restricted to the `eip155` namespace this
//! facilitator settles on: `eip155:<chainId>`.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum NetworkIdError {
    #[error("network id '{0}' is not of the form eip155:<chainId>")]
    BadFormat(String),
    #[error("network id '{0}' has a non-eip155 namespace")]
    WrongNamespace(String),
    #[error("chain id '{0}' is not a valid positive integer")]
    BadChainId(String),
}

/// A parsed `eip155:<chainId>` network identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Eip155Network {
    pub chain_id: u64,
}

impl Eip155Network {
    pub fn new(chain_id: u64) -> Self {
        Eip155Network { chain_id }
    }
}

impl fmt::Display for Eip155Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "eip155:{}", self.chain_id)
    }
}

impl FromStr for Eip155Network {
    type Err = NetworkIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, reference) = s
            .split_once(':')
            .ok_or_else(|| NetworkIdError::BadFormat(s.to_string()))?;
        if namespace != "eip155" {
            return Err(NetworkIdError::WrongNamespace(s.to_string()));
        }
        let chain_id = reference
            .parse::<u64>()
            .map_err(|_| NetworkIdError::BadChainId(reference.to_string()))?;
        if chain_id == 0 {
            return Err(NetworkIdError::BadChainId(reference.to_string()));
        }
        Ok(Eip155Network { chain_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_network() {
        let network: Eip155Network = "eip155:84532".parse().unwrap();
        assert_eq!(network.chain_id, 84532);
        assert_eq!(network.to_string(), "eip155:84532");
    }

    #[test]
    fn rejects_non_eip155_namespace() {
        assert!("solana:mainnet".parse::<Eip155Network>().is_err());
    }

    #[test]
    fn rejects_zero_and_non_numeric_chain_ids() {
        assert!("eip155:0".parse::<Eip155Network>().is_err());
        assert!("eip155:abc".parse::<Eip155Network>().is_err());
        assert!("eip155".parse::<Eip155Network>().is_err());
    }
}
