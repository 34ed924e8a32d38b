//! IdGenerator port - scan pass ID 生成の抽象化
//!
//! Upkeep の id はレジストリが採番するので、ここで生成するのは
//! ログ相関用の PassId だけです。

use crate::domain::PassId;
use crate::ports::Clock;
use ulid::Ulid;

/// PassIdGenerator は scan pass ごとに一意な ID を生成
pub trait PassIdGenerator: Send + Sync {
    fn generate_pass_id(&self) -> PassId;
}

/// Clock を使って現在時刻ベースの ULID を生成します。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> PassIdGenerator for UlidGenerator<C> {
    fn generate_pass_id(&self) -> PassId {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        PassId::from(Ulid::from_parts(timestamp_ms, rand::random()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};

    #[test]
    fn ulid_generator_generates_unique_ids() {
        let id_gen = UlidGenerator::new(SystemClock);

        let id1 = id_gen.generate_pass_id();
        let id2 = id_gen.generate_pass_id();

        assert_ne!(id1, id2);
    }

    #[test]
    fn ulid_generator_with_fixed_clock_shares_timestamp() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id_gen = UlidGenerator::new(FixedClock::new(fixed_time));

        let id1 = id_gen.generate_pass_id();
        let id2 = id_gen.generate_pass_id();

        // ランダム部分があるので ID は異なるが、timestamp 部分は同じ
        assert_ne!(id1, id2);
        assert_eq!(id1.as_ulid().timestamp_ms(), id2.as_ulid().timestamp_ms());
        assert_eq!(id1.as_ulid().timestamp_ms(), fixed_time.timestamp_millis() as u64);
    }
}
