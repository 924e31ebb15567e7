// ==================== HEALTH ====================
// Reports whether the JSON record store is readable. A corrupt or
// unreadable users.json turns the bot "degraded" with a 503.

use crate::services::UserRegistry;
use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
pub struct BotHealth {
    pub status: String,
    pub version: String,
    /// None when the registry could not be read
    pub registered_users: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_error: Option<String>,
    pub checked_at: String,
}

pub async fn health_check(registry: web::Data<UserRegistry>) -> impl Responder {
    let registry = registry.into_inner();
    // The registry reads users.json from disk
    let count = tokio::task::spawn_blocking(move || registry.count())
        .await
        .map_err(|e| e.to_string())
        .and_then(|result| result.map_err(|e| e.to_string()));

    let checked_at = chrono::Utc::now().to_rfc3339();
    let version = env!("CARGO_PKG_VERSION").to_string();

    match count {
        Ok(users) => HttpResponse::Ok().json(BotHealth {
            status: "ok".to_string(),
            version,
            registered_users: Some(users),
            storage_error: None,
            checked_at,
        }),
        Err(e) => {
            log::warn!("⚠️  Health check: record store unreadable: {}", e);
            HttpResponse::ServiceUnavailable().json(BotHealth {
                status: "degraded".to_string(),
                version,
                registered_users: None,
                storage_error: Some(e),
                checked_at,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::JsonStore;
    use actix_web::{http::StatusCode, test, App};
    use tempfile::TempDir;

    fn app_data(dir: &TempDir) -> web::Data<UserRegistry> {
        web::Data::new(UserRegistry::new(JsonStore::new(dir.path())))
    }

    #[actix_web::test]
    async fn test_health_reports_registered_users() {
        let dir = TempDir::new().unwrap();
        let registry = app_data(&dir);
        registry.register("42", 200).unwrap();
        registry.register("43", 201).unwrap();

        let app = test::init_service(
            App::new()
                .app_data(registry)
                .route("/health", web::get().to(health_check))
                .route("/metrics", web::get().to(crate::api::metrics::get_metrics)),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: BotHealth = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.status, "ok");
        assert_eq!(body.registered_users, Some(2));
        assert!(body.storage_error.is_none());

        let req = test::TestRequest::get().uri("/metrics").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }

    #[actix_web::test]
    async fn test_health_degraded_on_corrupt_store() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("users.json"), "[broken").unwrap();

        let app = test::init_service(
            App::new()
                .app_data(app_data(&dir))
                .route("/health", web::get().to(health_check)),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body: BotHealth = test::read_body_json(resp).await;
        assert_eq!(body.status, "degraded");
        assert!(body.registered_users.is_none());
        assert!(body.storage_error.unwrap().contains("users.json"));
    }
}
