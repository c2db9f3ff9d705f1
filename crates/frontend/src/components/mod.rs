mod expiry_prompt;
mod require_session;
mod spinner;

pub use expiry_prompt::ExpiryPromptModal;
pub use require_session::RequireSession;
pub use spinner::Spinner;
