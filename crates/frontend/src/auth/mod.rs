//! Session context for Yew components

pub mod context;

pub use context::{
    SessionAction, SessionContext, SessionContextData, SessionProvider, sign_out_message,
    use_is_authenticated, use_prompt_state, use_session,
};
