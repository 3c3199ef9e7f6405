pub mod ai_server;
pub mod db;
pub mod mailer;
pub mod tts;

pub use ai_server::AiServerClient;
pub use db::DbAdapter;
pub use mailer::SmtpMailer;
pub use tts::OpenAiTtsAdapter;
