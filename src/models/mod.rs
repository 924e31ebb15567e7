pub mod conversation;
pub mod meter_reading;
pub mod telegram;
pub mod user;

pub use conversation::*;
pub use meter_reading::*;
pub use telegram::*;
pub use user::*;
