//! Route transition preference
//!
//! Owned by [`AnimationProvider`] and read through context, so pages and the
//! router agree on one value without a global.

use serde::{Deserialize, Serialize};
use std::rc::Rc;
use yew::prelude::*;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteAnimation {
    #[default]
    Fade,
    Slide,
    None,
}

impl RouteAnimation {
    /// CSS class applied to the routed outlet
    pub const fn css_class(self) -> &'static str {
        match self {
            Self::Fade => "route-fade",
            Self::Slide => "route-slide",
            Self::None => "",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AnimationSettings {
    animation: RouteAnimation,
}

impl AnimationSettings {
    pub const fn new(animation: RouteAnimation) -> Self {
        Self { animation }
    }

    pub const fn get(&self) -> RouteAnimation {
        self.animation
    }
}

pub enum AnimationAction {
    Set(RouteAnimation),
}

impl Reducible for AnimationSettings {
    type Action = AnimationAction;

    fn reduce(self: Rc<Self>, action: Self::Action) -> Rc<Self> {
        match action {
            AnimationAction::Set(animation) if animation == self.animation => self,
            AnimationAction::Set(animation) => Rc::new(Self { animation }),
        }
    }
}

pub type AnimationContext = UseReducerHandle<AnimationSettings>;

#[derive(Properties, PartialEq)]
pub struct AnimationProviderProps {
    #[prop_or_default]
    pub initial: RouteAnimation,
    pub children: Children,
}

#[function_component(AnimationProvider)]
pub fn animation_provider(props: &AnimationProviderProps) -> Html {
    let initial = props.initial;
    let settings = use_reducer(move || AnimationSettings::new(initial));

    html! {
        <ContextProvider<AnimationContext> context={settings}>
            {props.children.clone()}
        </ContextProvider<AnimationContext>>
    }
}

/// Current route animation; the default when no provider is mounted
#[hook]
pub fn use_route_animation() -> RouteAnimation {
    use_context::<AnimationContext>().map_or_else(RouteAnimation::default, |settings| settings.get())
}

/// Setter for the route animation; a no-op without a provider
#[hook]
pub fn use_set_route_animation() -> Callback<RouteAnimation> {
    let settings = use_context::<AnimationContext>();
    Callback::from(move |animation| {
        if let Some(settings) = &settings {
            settings.dispatch(AnimationAction::Set(animation));
        }
    })
}
