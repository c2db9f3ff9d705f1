//! Session context and provider
//!
//! Mirrors the manager's state into a Yew reducer so components re-render
//! on session changes, prompt ticks and server errors.

use crate::components::ExpiryPromptModal;
use std::rc::Rc;
use tenure_core::{
    BootstrapOutcome, ChangeReason, Credential, PromptEvent, PromptState, ServerError,
    SessionManager, SessionRecord, SessionResult, SignOutReason,
};
use tracing::debug;
use yew::prelude::*;

/// Session data exposed to components
#[derive(Clone, Debug, PartialEq)]
pub struct SessionContextData {
    pub session: SessionRecord,
    /// True until the persisted session has been bootstrapped
    pub is_loading: bool,
    pub prompt: PromptState,
    pub last_sign_out: Option<SignOutReason>,
    pub error: Option<String>,
}

impl Default for SessionContextData {
    fn default() -> Self {
        Self {
            session: SessionRecord::default(),
            is_loading: true,
            prompt: PromptState::Idle,
            last_sign_out: None,
            error: None,
        }
    }
}

/// Session context actions
pub enum SessionAction {
    Changed {
        session: SessionRecord,
        reason: ChangeReason,
    },
    Bootstrapped {
        session: SessionRecord,
        outcome: BootstrapOutcome,
    },
    Prompt(PromptEvent),
    ServerError(ServerError),
    ClearError,
}

/// Message shown after the session ended without the user asking for it
pub const fn sign_out_message(reason: SignOutReason) -> Option<&'static str> {
    match reason {
        SignOutReason::User => None,
        SignOutReason::Idle => Some("You were signed out after a period of inactivity."),
        SignOutReason::Expired
        | SignOutReason::RenewalFailed
        | SignOutReason::PromptTimedOut
        | SignOutReason::PromptDismissed => Some("Your session has expired. Please sign in again."),
    }
}

impl Reducible for SessionContextData {
    type Action = SessionAction;

    fn reduce(self: Rc<Self>, action: Self::Action) -> Rc<Self> {
        match action {
            SessionAction::Changed { session, reason } => {
                let (last_sign_out, error) = match reason {
                    ChangeReason::SignedOut(reason) => (
                        Some(reason),
                        sign_out_message(reason).map(str::to_string),
                    ),
                    ChangeReason::SignedIn => (None, None),
                    _ => (self.last_sign_out, self.error.clone()),
                };
                Rc::new(Self {
                    session,
                    last_sign_out,
                    error,
                    ..(*self).clone()
                })
            }
            SessionAction::Bootstrapped { session, outcome } => {
                let error = if outcome == BootstrapOutcome::SignedOut {
                    sign_out_message(SignOutReason::Expired).map(str::to_string)
                } else {
                    self.error.clone()
                };
                Rc::new(Self {
                    session,
                    is_loading: false,
                    error,
                    ..(*self).clone()
                })
            }
            SessionAction::Prompt(event) => {
                let prompt = match event {
                    PromptEvent::Opened { seconds_remaining }
                    | PromptEvent::Tick { seconds_remaining } => {
                        PromptState::Prompting { seconds_remaining }
                    }
                    PromptEvent::Closed(_) => PromptState::Idle,
                };
                Rc::new(Self {
                    prompt,
                    ..(*self).clone()
                })
            }
            // Expired credentials are handled by the manager itself
            SessionAction::ServerError(error) if error.is_auth_expired() => self,
            SessionAction::ServerError(error) => Rc::new(Self {
                error: Some(error.message),
                ..(*self).clone()
            }),
            SessionAction::ClearError => Rc::new(Self {
                error: None,
                ..(*self).clone()
            }),
        }
    }
}

/// Handle passed through Yew context
#[derive(Clone, PartialEq)]
pub struct SessionContext {
    pub state: UseReducerHandle<SessionContextData>,
    pub manager: SessionManager,
}

impl SessionContext {
    pub fn sign_in(&self, credential: &Credential, stay_signed_in: bool) -> SessionResult<()> {
        self.manager.sign_in(credential, stay_signed_in)
    }

    pub fn sign_out(&self) {
        self.manager.sign_out();
    }

    pub fn clear_error(&self) {
        self.state.dispatch(SessionAction::ClearError);
    }
}

#[derive(Properties, PartialEq)]
pub struct SessionProviderProps {
    pub manager: SessionManager,
    pub children: Children,
}

/// Provides [`SessionContext`], bootstraps the persisted session on mount
/// and renders the expiry prompt
#[function_component(SessionProvider)]
pub fn session_provider(props: &SessionProviderProps) -> Html {
    let state = use_reducer(SessionContextData::default);

    {
        let state = state.clone();
        use_effect_with(props.manager.clone(), move |manager| {
            let on_change = {
                let state = state.clone();
                let session = manager.state().clone();
                manager.subscribe(move |change| {
                    state.dispatch(SessionAction::Changed {
                        session: session.session(),
                        reason: change.reason,
                    });
                })
            };
            let on_prompt = {
                let state = state.clone();
                manager
                    .prompt()
                    .subscribe(move |event| state.dispatch(SessionAction::Prompt(*event)))
            };
            let on_error = {
                let state = state.clone();
                manager
                    .errors()
                    .subscribe(move |error| state.dispatch(SessionAction::ServerError(error.clone())))
            };

            {
                let manager = manager.clone();
                wasm_bindgen_futures::spawn_local(async move {
                    let outcome = manager.init_session().await;
                    debug!(?outcome, "Session bootstrapped");
                    state.dispatch(SessionAction::Bootstrapped {
                        session: manager.session(),
                        outcome,
                    });
                });
            }

            let manager = manager.clone();
            move || {
                drop((on_change, on_prompt, on_error));
                manager.shutdown();
            }
        });
    }

    let context = SessionContext {
        state,
        manager: props.manager.clone(),
    };

    html! {
        <ContextProvider<SessionContext> context={context}>
            <ExpiryPromptModal />
            {props.children.clone()}
        </ContextProvider<SessionContext>>
    }
}

/// Hook to use the session context
#[hook]
pub fn use_session() -> SessionContext {
    use_context::<SessionContext>()
        .expect("SessionContext not found. Make sure to wrap your component with SessionProvider")
}

/// Hook to check if authenticated
#[hook]
pub fn use_is_authenticated() -> bool {
    let session = use_session();
    session.state.session.is_authenticated
}

/// Hook to read the expiry prompt state
#[hook]
pub fn use_prompt_state() -> PromptState {
    let session = use_session();
    session.state.prompt
}
