//! Ledger primitives: account addresses, amounts and gas.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Units of execution cost as metered by the ledger.
pub type Gas = u64;

const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

/// A 20-byte account or contract address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Address whose last eight bytes hold `n`. Handy for fixtures.
    pub fn from_low_u64(n: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&n.to_be_bytes());
        Self(bytes)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseAddressError {
    #[error("address must be 40 hex digits, got {0}")]
    Length(usize),
    #[error("invalid hex in address: {0}")]
    Hex(#[from] hex::FromHexError),
}

impl FromStr for Address {
    type Err = ParseAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        if digits.len() != 40 {
            return Err(ParseAddressError::Length(digits.len()));
        }
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// An amount of the ledger's native currency, in its smallest unit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Wei(pub u128);

impl Wei {
    pub const ZERO: Wei = Wei(0);

    pub const fn new(value: u128) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> u128 {
        self.0
    }

    /// Cost of `gas` units at `price` per unit, saturating at `u128::MAX`.
    pub fn for_gas(gas: Gas, price: Wei) -> Self {
        Self((gas as u128).saturating_mul(price.0))
    }

    pub fn checked_add(self, other: Wei) -> Option<Wei> {
        self.0.checked_add(other.0).map(Wei)
    }

    pub fn checked_sub(self, other: Wei) -> Option<Wei> {
        self.0.checked_sub(other.0).map(Wei)
    }

    pub fn saturating_add(self, other: Wei) -> Wei {
        Wei(self.0.saturating_add(other.0))
    }

    /// Decimal ether representation without trailing zeros, e.g. `0.00001`.
    pub fn format_ether(&self) -> String {
        let whole = self.0 / WEI_PER_ETHER;
        let frac = self.0 % WEI_PER_ETHER;
        if frac == 0 {
            return whole.to_string();
        }
        let frac = format!("{frac:018}");
        format!("{whole}.{}", frac.trim_end_matches('0'))
    }
}

impl fmt::Display for Wei {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} wei", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_roundtrips_through_hex() {
        let s = "0x5fbdb2315678afecb367f032d93f642f64180aa3";
        let addr: Address = s.parse().unwrap();
        assert_eq!(addr.to_string(), s);

        let without_prefix: Address = s.trim_start_matches("0x").parse().unwrap();
        assert_eq!(without_prefix, addr);
    }

    #[test]
    fn address_rejects_bad_input() {
        assert_eq!("0x1234".parse::<Address>(), Err(ParseAddressError::Length(4)));
        assert_eq!("0x123".parse::<Address>(), Err(ParseAddressError::Length(3)));
        let bad = "0xzz00000000000000000000000000000000000000";
        assert!(matches!(
            bad.parse::<Address>(),
            Err(ParseAddressError::Hex(hex::FromHexError::InvalidHexCharacter { c: 'z', index: 0 }))
        ));
    }

    #[test]
    fn address_serializes_as_string() {
        let addr = Address::from_low_u64(1);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"0x0000000000000000000000000000000000000001\"");
    }

    #[test]
    fn wei_formats_as_ether() {
        assert_eq!(Wei::new(10_000_000_000_000).format_ether(), "0.00001");
        assert_eq!(Wei::new(2 * WEI_PER_ETHER).format_ether(), "2");
        assert_eq!(Wei::new(WEI_PER_ETHER + WEI_PER_ETHER / 2).format_ether(), "1.5");
    }

    #[test]
    fn wei_for_gas_multiplies() {
        assert_eq!(Wei::for_gas(21_000, Wei::new(2)), Wei::new(42_000));
        assert_eq!(Wei::for_gas(u64::MAX, Wei::new(u128::MAX)), Wei::new(u128::MAX));
    }

    #[test]
    fn wei_checked_sub_refuses_underflow() {
        assert_eq!(Wei::new(1).checked_sub(Wei::new(2)), None);
        assert_eq!(Wei::new(3).checked_sub(Wei::new(2)), Some(Wei::new(1)));
    }
}
