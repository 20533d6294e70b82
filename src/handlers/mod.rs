pub mod analyze_handlers;
pub mod health;
pub mod history_handlers;
pub mod song_handlers;
