// ==================== CONVERSATION STATE MACHINE ====================
// Registration -> meter readings dialogue, one state per Telegram user.
//
//   Idle --/start--> Register --apartment--> RecordMeterData --readings--> Idle
//                 \__________(registered)__/
//
// Every step is synchronous: it reads/writes the JSON store and returns the
// replies. The caller (polling job) serializes events per user.

use crate::{
    api::metrics,
    models::{
        parse_apartment_number, parse_readings, ApartmentInputError, ConversationState,
        EventKind, InboundEvent, MeterReading, Reply, ReplyMarkup, Transition, UserRecord,
        MAX_APARTMENT_NUMBER, MIN_APARTMENT_NUMBER,
    },
    services::{
        meter_service::{MeterLedger, RecordOutcome},
        qr_service::QrService,
        user_service::{RegistrationOutcome, UserRegistry},
    },
    utils::error::AppError,
};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

const GREETING: &str =
    "Hello! This is the Zapadny housing cooperative bot for submitting water meter readings.";
const READINGS_FORMAT_HINT: &str =
    "You can now submit your water meter readings. Send them as: \"cold_water hot_water\".";
const HELP_TEXT: &str = "Water meter readings bot.\n\
    /start - register your apartment or submit new readings\n\
    /qr - get a QR code linking to this bot\n\
    /help - show this message\n\
    Readings are sent as two numbers: \"cold_water hot_water\".";

pub struct ConversationService {
    registry: UserRegistry,
    ledger: MeterLedger,
    qr: QrService,
    states: Mutex<HashMap<String, ConversationState>>,
}

impl ConversationService {
    pub fn new(registry: UserRegistry, ledger: MeterLedger, qr: QrService) -> Self {
        Self {
            registry,
            ledger,
            qr,
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn state_of(&self, user_id: &str) -> ConversationState {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .copied()
            .unwrap_or_default()
    }

    /// Runs one event for its user and stores the next state.
    /// On error the user's state is left unchanged.
    pub fn handle(&self, event: &InboundEvent) -> Result<Vec<Reply>, AppError> {
        let state = self.state_of(&event.user_id);
        let transition = self.step(state, event)?;

        if transition.next != state {
            log::debug!(
                "🔀 User {}: {:?} -> {:?}",
                event.user_id,
                state,
                transition.next
            );
        }

        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        match transition.next {
            ConversationState::Idle => {
                states.remove(&event.user_id);
            }
            next => {
                states.insert(event.user_id.clone(), next);
            }
        }

        Ok(transition.replies)
    }

    /// (state, event) -> (next state, replies); store mutations happen inside
    pub fn step(
        &self,
        state: ConversationState,
        event: &InboundEvent,
    ) -> Result<Transition, AppError> {
        match &event.kind {
            EventKind::Start => self.start(event),
            EventKind::Help => Ok(Transition::to(state, vec![Reply::text(HELP_TEXT)])),
            EventKind::Qr => Ok(Transition::to(state, vec![self.qr.photo_reply()?])),
            EventKind::Text(text) => match state {
                ConversationState::Idle => {
                    log::debug!("💤 Ignoring text from idle user {}", event.user_id);
                    Ok(Transition::to(ConversationState::Idle, Vec::new()))
                }
                ConversationState::Register => self.register(event, text),
                ConversationState::RecordMeterData => self.record_meter_data(event, text),
            },
        }
    }

    fn start(&self, event: &InboundEvent) -> Result<Transition, AppError> {
        let mut replies = vec![Reply::text(GREETING)];

        if let Some(user) = self.registry.find(&event.user_id)? {
            replies.extend(self.status_report(&user)?);
            return Ok(Transition::to(ConversationState::RecordMeterData, replies));
        }

        let prompt = match &event.first_name {
            Some(name) => format!("Hi {}! Send your apartment number to register.", name),
            None => "Hi! Send your apartment number to register.".to_string(),
        };
        replies.push(Reply::with_markup(prompt, ReplyMarkup::ForceReply));

        Ok(Transition::to(ConversationState::Register, replies))
    }

    fn register(&self, event: &InboundEvent, text: &str) -> Result<Transition, AppError> {
        let apartment_number = match parse_apartment_number(text) {
            Ok(number) => number,
            Err(ApartmentInputError::NotAnInteger) => {
                metrics::increment_rejected_count();
                return Ok(Transition::to(
                    ConversationState::Register,
                    vec![Reply::text(
                        "The apartment number must be an integer. Please try again.",
                    )],
                ));
            }
            Err(ApartmentInputError::OutOfRange(number)) => {
                metrics::increment_rejected_count();
                log::debug!("🚫 Apartment {} out of range for user {}", number, event.user_id);
                return Ok(Transition::to(
                    ConversationState::Register,
                    vec![Reply::text(format!(
                        "The apartment number must be between {} and {}. Please try again.",
                        MIN_APARTMENT_NUMBER, MAX_APARTMENT_NUMBER
                    ))],
                ));
            }
        };

        match self.registry.register(&event.user_id, apartment_number)? {
            RegistrationOutcome::AlreadyRegistered(user) => Ok(Transition::to(
                ConversationState::RecordMeterData,
                self.status_report(&user)?,
            )),
            RegistrationOutcome::Registered(user) => {
                metrics::increment_registration_count();
                Ok(Transition::to(
                    ConversationState::RecordMeterData,
                    vec![
                        Reply::text(format!(
                            "You have successfully registered with apartment number {}.",
                            user.apartment_number
                        )),
                        Reply::text(READINGS_FORMAT_HINT),
                    ],
                ))
            }
        }
    }

    fn record_meter_data(&self, event: &InboundEvent, text: &str) -> Result<Transition, AppError> {
        let Some(user) = self.registry.find(&event.user_id)? else {
            log::warn!("⚠️  User {} sent readings without being registered", event.user_id);
            return Ok(Transition::to(
                ConversationState::Register,
                vec![Reply::text(
                    "You are not registered. Please send your apartment number to register.",
                )],
            ));
        };

        let Some((cold_water, hot_water)) = parse_readings(text) else {
            metrics::increment_rejected_count();
            return Ok(Transition::to(
                ConversationState::RecordMeterData,
                vec![Reply::text(
                    "Please send the readings as: \"cold_water hot_water\". \
                     Readings must be non-negative whole numbers.",
                )],
            ));
        };

        let reading = MeterReading::new(user.apartment_number, cold_water, hot_water);

        match self.ledger.record(&event.user_id, reading)? {
            RecordOutcome::BelowPrevious { previous } => {
                metrics::increment_rejected_count();
                log::debug!(
                    "🚫 User {} sent {} {} below previous {} {}",
                    event.user_id,
                    cold_water,
                    hot_water,
                    previous.cold_water,
                    previous.hot_water
                );
                Ok(Transition::to(
                    ConversationState::RecordMeterData,
                    vec![Reply::text(
                        "New meter readings must be greater than or equal to the previous ones. \
                         Please check the values and try again.",
                    )],
                ))
            }
            RecordOutcome::DeltaOverflow { previous } => {
                metrics::increment_rejected_count();
                log::warn!(
                    "⚠️  User {} sent {} {}, too far from previous {} {}",
                    event.user_id,
                    cold_water,
                    hot_water,
                    previous.cold_water,
                    previous.hot_water
                );
                Ok(Transition::to(
                    ConversationState::RecordMeterData,
                    vec![Reply::text(
                        "The new meter readings are too far from the previous ones. \
                         Please check the values and try again.",
                    )],
                ))
            }
            RecordOutcome::Recorded { reading, delta, .. } => {
                metrics::increment_reading_count();

                let mut replies = Vec::new();
                if let Some(delta) = delta {
                    replies.push(Reply::text(format!(
                        "Change since the previous readings:\nCold water: +{}\nHot water: +{}",
                        delta.cold_water, delta.hot_water
                    )));
                }
                replies.push(Reply::text(format!(
                    "Water meter readings saved for apartment {} on {}.",
                    reading.apartment_number, reading.date
                )));
                replies.push(Reply::with_markup(
                    "Thank you for using our bot!",
                    ReplyMarkup::RemoveKeyboard,
                ));

                Ok(Transition::to(ConversationState::Idle, replies))
            }
        }
    }

    /// Last reading (if any) plus the "already registered" notice
    fn status_report(&self, user: &UserRecord) -> Result<Vec<Reply>, AppError> {
        let mut replies = Vec::new();

        if let Some(last) = self.ledger.last_reading(&user.user_id)? {
            replies.push(Reply::text(format!(
                "Previous meter readings:\nCold water: {}\nHot water: {}\nDate: {}",
                last.cold_water, last.hot_water, last.date
            )));
        }

        replies.push(Reply::text(format!(
            "You are already registered with apartment number {}. {}",
            user.apartment_number, READINGS_FORMAT_HINT
        )));

        Ok(replies)
    }
}
