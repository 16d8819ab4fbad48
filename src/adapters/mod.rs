// 對外部系統的具體實作：網站、通知、檔案系統、時鐘

pub mod clock;
pub mod console;
pub mod diagnostics;
pub mod portal;
pub mod telegram;

pub use clock::SystemClock;
pub use console::LogReporter;
pub use diagnostics::LocalDiagnosticSink;
pub use portal::{HttpPortalGateway, PortalOptions, PortalSession};
pub use telegram::TelegramReporter;
