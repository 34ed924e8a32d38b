//! KeeperBuilder - keeper の構築とワイヤリング
//!
//! 台帳クライアント 1 つから EligibilityChecker・Executor・NonceAllocator を組み立て、
//! ScanLoop を返します。設定の不整合は `build()` 時に検出します（Fail-fast）。

use std::sync::Arc;
use std::time::Duration;

use crate::app::checker::EligibilityChecker;
use crate::app::executor::Executor;
use crate::app::nonce::NonceAllocator;
use crate::app::scan_loop::{ScanLoop, ScanOptions};
use crate::config::{
    DEFAULT_CHECK_TIMEOUT, DEFAULT_GAS_CEILING, DEFAULT_RECEIPT_TIMEOUT, KeeperConfig,
};
use crate::domain::{Address, Gas};
use crate::ports::{LedgerClient, PassIdGenerator, SystemClock, UlidGenerator};

/// KeeperBuilder は ScanLoop を構築
///
/// # 使用例
/// ```ignore
/// let scan = KeeperBuilder::new(ledger)
///     .gas_ceiling(500_000)
///     .pass_deadline(Duration::from_secs(30))
///     .build()?;
/// let report = scan.run_pass().await?;
/// ```
pub struct KeeperBuilder {
    ledger: Arc<dyn LedgerClient>,
    gas_ceiling: Gas,
    receipt_timeout: Duration,
    check_timeout: Duration,
    pass_deadline: Option<Duration>,
    check_concurrency: usize,
    pass_ids: Option<Arc<dyn PassIdGenerator>>,
    expected_registry: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("gas ceiling must be greater than zero")]
    ZeroGasCeiling,

    #[error("check concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("ledger client has no signer address")]
    MissingSigner,

    #[error("ledger client serves registry {actual}, configured {expected}")]
    RegistryMismatch { expected: Address, actual: Address },
}

impl KeeperBuilder {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self {
            ledger,
            gas_ceiling: DEFAULT_GAS_CEILING,
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
            check_timeout: DEFAULT_CHECK_TIMEOUT,
            pass_deadline: None,
            check_concurrency: 1,
            pass_ids: None,
            expected_registry: None,
        }
    }

    /// Takes every tunable from a loaded configuration and requires the
    /// ledger to serve the configured registry.
    pub fn from_config(ledger: Arc<dyn LedgerClient>, config: &KeeperConfig) -> Self {
        let builder = Self::new(ledger)
            .expect_registry(config.registry_address)
            .gas_ceiling(config.gas_ceiling)
            .receipt_timeout(config.receipt_timeout)
            .check_timeout(config.check_timeout)
            .check_concurrency(config.check_concurrency);
        match config.pass_deadline {
            Some(deadline) => builder.pass_deadline(deadline),
            None => builder,
        }
    }

    pub fn gas_ceiling(mut self, gas_ceiling: Gas) -> Self {
        self.gas_ceiling = gas_ceiling;
        self
    }

    pub fn receipt_timeout(mut self, timeout: Duration) -> Self {
        self.receipt_timeout = timeout;
        self
    }

    pub fn check_timeout(mut self, timeout: Duration) -> Self {
        self.check_timeout = timeout;
        self
    }

    pub fn pass_deadline(mut self, deadline: Duration) -> Self {
        self.pass_deadline = Some(deadline);
        self
    }

    pub fn check_concurrency(mut self, concurrency: usize) -> Self {
        self.check_concurrency = concurrency;
        self
    }

    pub fn expect_registry(mut self, address: Address) -> Self {
        self.expected_registry = Some(address);
        self
    }

    pub fn pass_id_generator(mut self, generator: Arc<dyn PassIdGenerator>) -> Self {
        self.pass_ids = Some(generator);
        self
    }

    /// # 検証
    /// - gas ceiling / timeout がゼロでない
    /// - check_concurrency >= 1
    /// - 台帳クライアントが signer を持っている
    /// - 期待するレジストリを台帳クライアントが指している
    pub fn build(self) -> Result<ScanLoop, BuildError> {
        if self.gas_ceiling == 0 {
            return Err(BuildError::ZeroGasCeiling);
        }
        if self.check_concurrency == 0 {
            return Err(BuildError::ZeroConcurrency);
        }
        if self.receipt_timeout.is_zero() {
            return Err(BuildError::ZeroTimeout("receipt timeout"));
        }
        if self.check_timeout.is_zero() {
            return Err(BuildError::ZeroTimeout("check timeout"));
        }
        let signer = self.ledger.signer_address();
        if signer == Address::ZERO {
            return Err(BuildError::MissingSigner);
        }
        if let Some(expected) = self.expected_registry {
            let actual = self.ledger.registry_address();
            if actual != expected {
                return Err(BuildError::RegistryMismatch { expected, actual });
            }
        }

        let nonces = Arc::new(NonceAllocator::new(signer));
        let checker = Arc::new(EligibilityChecker::new(
            Arc::clone(&self.ledger),
            self.check_timeout,
        ));
        let executor = Executor::new(
            Arc::clone(&self.ledger),
            nonces,
            self.gas_ceiling,
            self.receipt_timeout,
        );
        let pass_ids = self
            .pass_ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(SystemClock)));
        let options = ScanOptions {
            pass_deadline: self.pass_deadline,
            check_concurrency: self.check_concurrency,
        };

        Ok(ScanLoop::new(self.ledger, checker, executor, pass_ids, options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SignerKey;
    use crate::domain::Wei;
    use crate::impls::{DEFAULT_REGISTRY_ADDRESS, InMemoryLedger};
    use crate::ports::FixedClock;
    use crate::registry::RegistryConfig;
    use chrono::Utc;
    use rstest::rstest;

    fn ledger(signer: Address) -> Arc<dyn LedgerClient> {
        Arc::new(InMemoryLedger::new(
            RegistryConfig::new(Wei::new(1)),
            signer,
            Arc::new(FixedClock::new(Utc::now())),
        ))
    }

    #[test]
    fn test_build_success() {
        let scan = KeeperBuilder::new(ledger(Address::from_low_u64(7))).build();
        assert!(scan.is_ok());
    }

    #[test]
    fn test_build_rejects_zero_gas_ceiling() {
        let result = KeeperBuilder::new(ledger(Address::from_low_u64(7)))
            .gas_ceiling(0)
            .build();
        assert_eq!(result.err(), Some(BuildError::ZeroGasCeiling));
    }

    #[rstest]
    #[case::receipt(true, BuildError::ZeroTimeout("receipt timeout"))]
    #[case::check(false, BuildError::ZeroTimeout("check timeout"))]
    fn test_build_rejects_zero_timeouts(#[case] receipt: bool, #[case] expected: BuildError) {
        let builder = KeeperBuilder::new(ledger(Address::from_low_u64(7)));
        let builder = if receipt {
            builder.receipt_timeout(Duration::ZERO)
        } else {
            builder.check_timeout(Duration::ZERO)
        };
        assert_eq!(builder.build().err(), Some(expected));
    }

    #[test]
    fn test_build_rejects_zero_concurrency() {
        let result = KeeperBuilder::new(ledger(Address::from_low_u64(7)))
            .check_concurrency(0)
            .build();
        assert_eq!(result.err(), Some(BuildError::ZeroConcurrency));
    }

    #[test]
    fn test_build_requires_signer() {
        let result = KeeperBuilder::new(ledger(Address::ZERO)).build();
        assert_eq!(result.err(), Some(BuildError::MissingSigner));
    }

    fn config(registry_address: Address) -> KeeperConfig {
        KeeperConfig {
            registry_address,
            rpc_url: "memory:".to_string(),
            signer_key: SignerKey::from_bytes([9; 32]),
            gas_ceiling: 250_000,
            minimum_funding: Wei::new(1),
            receipt_timeout: Duration::from_secs(5),
            check_timeout: Duration::from_secs(2),
            pass_deadline: Some(Duration::from_secs(30)),
            check_concurrency: 4,
        }
    }

    #[test]
    fn test_from_config_copies_tunables() {
        let config = config(DEFAULT_REGISTRY_ADDRESS);
        let scan = KeeperBuilder::from_config(ledger(Address::from_low_u64(7)), &config)
            .build()
            .unwrap();
        assert_eq!(
            scan.options(),
            &ScanOptions {
                pass_deadline: Some(Duration::from_secs(30)),
                check_concurrency: 4,
            }
        );
    }

    #[test]
    fn test_from_config_rejects_other_registry() {
        let config = config(Address::from_low_u64(1));
        let result = KeeperBuilder::from_config(ledger(Address::from_low_u64(7)), &config).build();
        assert_eq!(
            result.err(),
            Some(BuildError::RegistryMismatch {
                expected: Address::from_low_u64(1),
                actual: DEFAULT_REGISTRY_ADDRESS,
            })
        );
    }
}
