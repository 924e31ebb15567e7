pub mod conversation_service;
pub mod meter_service;
pub mod qr_service;
pub mod telegram_service;
pub mod user_service;

pub use conversation_service::*;
pub use meter_service::*;
pub use qr_service::*;
pub use telegram_service::*;
pub use user_service::*;
