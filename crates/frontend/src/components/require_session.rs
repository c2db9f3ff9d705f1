//! Route guard for pages that need a session

use crate::animation::use_route_animation;
use crate::auth::use_session;
use crate::components::Spinner;
use yew::prelude::*;

#[derive(Properties, PartialEq)]
pub struct RequireSessionProps {
    /// Rendered when there is no session, typically the sign-in page
    pub fallback: Html,
    pub children: Children,
}

/// Shows a spinner while the session bootstraps, then either the children
/// or the fallback
#[function_component(RequireSession)]
pub fn require_session(props: &RequireSessionProps) -> Html {
    let session = use_session();
    let animation = use_route_animation();

    if session.state.is_loading {
        return html! { <Spinner text={"Checking session..."} /> };
    }

    if session.state.session.is_authenticated {
        return html! {
            <div class={animation.css_class()}>{ props.children.clone() }</div>
        };
    }

    html! {
        <div class={animation.css_class()}>
            if let Some(error) = &session.state.error {
                <div class="mb-4 p-3 bg-red-50 dark:bg-red-900/30 text-red-700 dark:text-red-300 rounded text-sm">
                    {error}
                </div>
            }
            { props.fallback.clone() }
        </div>
    }
}
