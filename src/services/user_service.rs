// ==================== USER REGISTRY ====================
// users.json: { "<telegram user id>": <apartment number> }
// A user is registered once and never re-bound to another apartment.

use crate::{
    database::{JsonStore, KeySpace, StoreUpdate},
    models::UserRecord,
    utils::error::AppError,
};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Registered(UserRecord),
    /// The user id was already bound; the existing record is returned untouched
    AlreadyRegistered(UserRecord),
}

#[derive(Clone)]
pub struct UserRegistry {
    store: JsonStore,
}

impl UserRegistry {
    pub fn new(store: JsonStore) -> Self {
        Self { store }
    }

    pub fn find(&self, user_id: &str) -> Result<Option<UserRecord>, AppError> {
        let users: BTreeMap<String, i64> = self.store.load(KeySpace::Users)?;

        Ok(users.get(user_id).map(|apartment_number| UserRecord {
            user_id: user_id.to_string(),
            apartment_number: *apartment_number,
        }))
    }

    pub fn register(
        &self,
        user_id: &str,
        apartment_number: i64,
    ) -> Result<RegistrationOutcome, AppError> {
        let outcome = self.store.update(KeySpace::Users, |users: &mut BTreeMap<String, i64>| {
            if let Some(existing) = users.get(user_id) {
                return StoreUpdate::Discard(RegistrationOutcome::AlreadyRegistered(UserRecord {
                    user_id: user_id.to_string(),
                    apartment_number: *existing,
                }));
            }

            users.insert(user_id.to_string(), apartment_number);
            StoreUpdate::Commit(RegistrationOutcome::Registered(UserRecord {
                user_id: user_id.to_string(),
                apartment_number,
            }))
        })?;

        match &outcome {
            RegistrationOutcome::Registered(record) => log::info!(
                "🏠 User {} registered with apartment {}",
                record.user_id,
                record.apartment_number
            ),
            RegistrationOutcome::AlreadyRegistered(record) => log::warn!(
                "⚠️  User {} is already registered with apartment {}",
                record.user_id,
                record.apartment_number
            ),
        }

        Ok(outcome)
    }

    pub fn count(&self) -> Result<usize, AppError> {
        let users: BTreeMap<String, i64> = self.store.load(KeySpace::Users)?;
        Ok(users.len())
    }
}
