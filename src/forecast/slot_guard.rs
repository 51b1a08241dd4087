use crate::models::ForecastRecord;

const MS_PER_MINUTE: i64 = 60_000;

/// Horizon length in milliseconds
pub fn horizon_ms(horizon_minutes: u32) -> i64 {
    i64::from(horizon_minutes.max(1)) * MS_PER_MINUTE
}

/// Horizon-aligned bucket index: `floor(t / horizon_ms)`
pub fn slot(t_ms: i64, horizon_minutes: u32) -> i64 {
    t_ms.div_euclid(horizon_ms(horizon_minutes))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotDecision {
    Proceed,
    /// A record already exists for this slot
    Suppress { slot: i64 },
}

/// Decide whether a forecast may be emitted at `now_ms`
///
/// At most one emission per slot per (symbol, horizon): suppressed when the
/// stream's last record falls in the same slot as `now_ms`.
pub fn check(last: Option<&ForecastRecord>, now_ms: i64, horizon_minutes: u32) -> SlotDecision {
    let current = slot(now_ms, horizon_minutes);
    match last {
        Some(record) if slot(record.t, horizon_minutes) == current => {
            SlotDecision::Suppress { slot: current }
        }
        _ => SlotDecision::Proceed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Direction, Outcome, AUTO_SOURCE};

    fn record_at(t: i64) -> ForecastRecord {
        ForecastRecord {
            id: ForecastRecord::make_id("BTCUSDT", t, 15),
            t,
            src: AUTO_SOURCE.to_string(),
            dir: Direction::Up,
            conf: 0.7,
            range: [0.2, 0.4],
            price_lo: 1.0,
            price_hi: 1.0,
            base: 1.0,
            horizon: 15,
            outcome: Outcome::Pending,
            extra: Default::default(),
        }
    }

    #[test]
    fn test_slot_boundaries() {
        let h = horizon_ms(15);
        assert_eq!(h, 900_000);
        assert_eq!(slot(0, 15), 0);
        assert_eq!(slot(h - 1, 15), 0);
        assert_eq!(slot(h, 15), 1);
        assert_eq!(slot(3 * h + 5, 15), 3);
    }

    #[test]
    fn test_no_history_proceeds() {
        assert_eq!(check(None, 1_000, 15), SlotDecision::Proceed);
    }

    #[test]
    fn test_same_slot_suppressed() {
        let h = horizon_ms(60);
        let last = record_at(10 * h + 1_000);

        assert_eq!(
            check(Some(&last), 10 * h + h - 1, 60),
            SlotDecision::Suppress { slot: 10 }
        );
    }

    #[test]
    fn test_next_slot_proceeds() {
        let h = horizon_ms(15);
        let last = record_at(10 * h + h - 1);

        assert_eq!(check(Some(&last), 11 * h, 15), SlotDecision::Proceed);
    }

    #[test]
    fn test_slot_depends_on_horizon() {
        // 20 minutes apart: same 60m slot, different 15m slots
        let t0 = 0;
        let t1 = 20 * 60_000;
        let last = record_at(t0);

        assert_eq!(check(Some(&last), t1, 15), SlotDecision::Proceed);
        assert_eq!(check(Some(&last), t1, 60), SlotDecision::Suppress { slot: 0 });
    }
}
