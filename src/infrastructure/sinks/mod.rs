pub mod terminal;
pub mod webhook;

pub use terminal::TerminalSink;
pub use webhook::WebhookSink;
