use actix_web::HttpResponse;
use std::sync::atomic::{AtomicU64, Ordering};

static UPDATE_COUNT: AtomicU64 = AtomicU64::new(0);
static REGISTRATION_COUNT: AtomicU64 = AtomicU64::new(0);
static READING_COUNT: AtomicU64 = AtomicU64::new(0);
static REJECTED_COUNT: AtomicU64 = AtomicU64::new(0);
static ERROR_COUNT: AtomicU64 = AtomicU64::new(0);
static SENT_COUNT: AtomicU64 = AtomicU64::new(0);

pub fn increment_update_count() {
    UPDATE_COUNT.fetch_add(1, Ordering::Relaxed);
}

pub fn increment_registration_count() {
    REGISTRATION_COUNT.fetch_add(1, Ordering::Relaxed);
}

pub fn increment_reading_count() {
    READING_COUNT.fetch_add(1, Ordering::Relaxed);
}

/// Input rejected by validation (format, range, below previous)
pub fn increment_rejected_count() {
    REJECTED_COUNT.fetch_add(1, Ordering::Relaxed);
}

pub fn increment_error_count() {
    ERROR_COUNT.fetch_add(1, Ordering::Relaxed);
}

pub fn increment_sent_count() {
    SENT_COUNT.fetch_add(1, Ordering::Relaxed);
}

pub fn render() -> String {
    let counters = [
        ("bot_updates_total", "Telegram updates received", &UPDATE_COUNT),
        ("bot_registrations_total", "Apartments registered", &REGISTRATION_COUNT),
        ("bot_readings_total", "Meter readings recorded", &READING_COUNT),
        ("bot_rejected_inputs_total", "Inputs rejected by validation", &REJECTED_COUNT),
        ("bot_errors_total", "Events that failed with an internal error", &ERROR_COUNT),
        ("bot_messages_sent_total", "Replies delivered to Telegram", &SENT_COUNT),
    ];

    counters
        .iter()
        .map(|(name, help, counter)| {
            format!(
                "# HELP {name} {help}\n# TYPE {name} counter\n{name} {}\n",
                counter.load(Ordering::Relaxed)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub async fn get_metrics() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(render())
}
