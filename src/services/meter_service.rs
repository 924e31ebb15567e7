// ==================== METER LEDGER ====================
// meter_data.json: { "<telegram user id>": [ MeterReading, ... ] }
// Readings are append-only, oldest first.

use crate::{
    database::{JsonStore, KeySpace, StoreUpdate},
    models::{MeterReading, ReadingDelta},
    utils::error::AppError,
};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded {
        reading: MeterReading,
        previous: Option<MeterReading>,
        /// Consumption since `previous`; None for the first reading
        delta: Option<ReadingDelta>,
    },
    /// Rejected: a counter went backwards compared to `previous`
    BelowPrevious { previous: MeterReading },
    /// Rejected: the difference to `previous` does not fit in i64
    DeltaOverflow { previous: MeterReading },
}

#[derive(Clone)]
pub struct MeterLedger {
    store: JsonStore,
}

impl MeterLedger {
    pub fn new(store: JsonStore) -> Self {
        Self { store }
    }

    pub fn history(&self, user_id: &str) -> Result<Vec<MeterReading>, AppError> {
        let mut data: BTreeMap<String, Vec<MeterReading>> = self.store.load(KeySpace::MeterData)?;
        Ok(data.remove(user_id).unwrap_or_default())
    }

    pub fn last_reading(&self, user_id: &str) -> Result<Option<MeterReading>, AppError> {
        Ok(self.history(user_id)?.pop())
    }

    /// Appends `reading` unless it is below the user's latest reading or the
    /// consumption cannot be computed. Checks and append happen under one store lock.
    pub fn record(&self, user_id: &str, reading: MeterReading) -> Result<RecordOutcome, AppError> {
        let outcome = self.store.update(
            KeySpace::MeterData,
            |data: &mut BTreeMap<String, Vec<MeterReading>>| {
                let previous = data.get(user_id).and_then(|history| history.last()).cloned();

                let delta = match &previous {
                    Some(previous) if !reading.is_not_below(previous) => {
                        return StoreUpdate::Discard(RecordOutcome::BelowPrevious {
                            previous: previous.clone(),
                        });
                    }
                    Some(previous) => match reading.delta_from(previous) {
                        Some(delta) => Some(delta),
                        None => {
                            return StoreUpdate::Discard(RecordOutcome::DeltaOverflow {
                                previous: previous.clone(),
                            });
                        }
                    },
                    None => None,
                };

                data.entry(user_id.to_string())
                    .or_default()
                    .push(reading.clone());

                StoreUpdate::Commit(RecordOutcome::Recorded {
                    reading,
                    previous,
                    delta,
                })
            },
        )?;

        if let RecordOutcome::Recorded { reading, .. } = &outcome {
            log::info!(
                "💧 Reading saved for user {} (apartment {}): cold={} hot={}",
                user_id,
                reading.apartment_number,
                reading.cold_water,
                reading.hot_water
            );
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ledger() -> (TempDir, MeterLedger) {
        let dir = TempDir::new().unwrap();
        let ledger = MeterLedger::new(JsonStore::new(dir.path()));
        (dir, ledger)
    }

    #[test]
    fn test_first_reading_has_no_previous() {
        let (_dir, ledger) = ledger();
        assert_eq!(ledger.last_reading("42").unwrap(), None);

        let outcome = ledger.record("42", MeterReading::new(200, 50, 60)).unwrap();
        match outcome {
            RecordOutcome::Recorded {
                reading,
                previous,
                delta,
            } => {
                assert_eq!(reading.cold_water, 50);
                assert!(previous.is_none());
                assert!(delta.is_none());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_decreasing_counters() {
        let (_dir, ledger) = ledger();
        ledger.record("42", MeterReading::new(200, 10, 20)).unwrap();

        let outcome = ledger.record("42", MeterReading::new(200, 9, 20)).unwrap();
        assert!(matches!(outcome, RecordOutcome::BelowPrevious { .. }));
        assert_eq!(ledger.history("42").unwrap().len(), 1);

        let same = ledger.record("42", MeterReading::new(200, 10, 20)).unwrap();
        assert!(matches!(same, RecordOutcome::Recorded { previous: Some(_), .. }));
        assert_eq!(ledger.history("42").unwrap().len(), 2);
    }

    #[test]
    fn test_overflowing_delta_is_discarded() {
        let (_dir, ledger) = ledger();
        ledger.record("42", MeterReading::new(200, i64::MIN, 0)).unwrap();

        let outcome = ledger.record("42", MeterReading::new(200, i64::MAX, 0)).unwrap();

        assert!(matches!(outcome, RecordOutcome::DeltaOverflow { .. }));
        assert_eq!(ledger.history("42").unwrap().len(), 1);
    }

    #[test]
    fn test_history_is_ordered_and_per_user() {
        let (_dir, ledger) = ledger();
        ledger.record("42", MeterReading::new(200, 1, 1)).unwrap();
        ledger.record("7", MeterReading::new(131, 100, 100)).unwrap();
        ledger.record("42", MeterReading::new(200, 2, 3)).unwrap();

        let history = ledger.history("42").unwrap();
        let values: Vec<_> = history.iter().map(|r| (r.cold_water, r.hot_water)).collect();
        assert_eq!(values, vec![(1, 1), (2, 3)]);

        // Another user's larger values do not constrain this user
        assert_eq!(ledger.last_reading("7").unwrap().unwrap().cold_water, 100);
    }

    #[test]
    fn test_empty_history_list_on_disk() {
        let (dir, ledger) = ledger();
        std::fs::write(dir.path().join("meter_data.json"), r#"{ "42": [] }"#).unwrap();

        assert_eq!(ledger.last_reading("42").unwrap(), None);
        let outcome = ledger.record("42", MeterReading::new(200, 5, 5)).unwrap();
        assert!(matches!(outcome, RecordOutcome::Recorded { previous: None, .. }));
    }
}
