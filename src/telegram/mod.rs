//! Minimal Telegram bot: long polls updates and answers one-line commands.

mod api;
pub use api::{BotApi, Chat, Message, Update, User, DEFAULT_BASE_URL};

mod bot;
pub use bot::{notify_pending_results, Bot, BotOptions, BotReaders, Command, ParseError};
