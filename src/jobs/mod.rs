pub mod telegram_polling;
