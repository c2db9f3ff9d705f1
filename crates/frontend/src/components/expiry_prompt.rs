//! Expiry prompt modal

use crate::auth::use_session;
use tenure_core::PromptState;
use yew::prelude::*;

/// Modal offering to keep the session alive, shown while the prompt
/// is open and counting down
#[function_component(ExpiryPromptModal)]
pub fn expiry_prompt_modal() -> Html {
    let session = use_session();

    let PromptState::Prompting { seconds_remaining } = session.state.prompt else {
        return html! {};
    };

    let on_stay = {
        let prompt = session.manager.prompt().clone();
        Callback::from(move |e: MouseEvent| {
            e.prevent_default();
            prompt.stay_signed_in();
        })
    };

    let on_sign_out = {
        let prompt = session.manager.prompt().clone();
        Callback::from(move |e: MouseEvent| {
            e.prevent_default();
            prompt.sign_out();
        })
    };

    html! {
        <div class="fixed inset-0 bg-black bg-opacity-50 flex items-center justify-center z-50"
             role="alertdialog" aria-modal="true">
            <div class="bg-white dark:bg-gray-800 rounded-lg p-6 max-w-md w-full mx-4 shadow-xl">
                <div class="flex items-center mb-4">
                    <svg class="w-8 h-8 text-yellow-500 mr-3" fill="none" stroke="currentColor" viewBox="0 0 24 24">
                        <path stroke-linecap="round" stroke-linejoin="round" stroke-width="2"
                            d="M12 8v4l3 3m6-3a9 9 0 11-18 0 9 9 0 0118 0z" />
                    </svg>
                    <h2 class="text-xl font-bold text-gray-900 dark:text-white">
                        {"Session Expiring"}
                    </h2>
                </div>

                <p class="text-gray-600 dark:text-gray-300 mb-6">
                    {"Your session could not be renewed. Do you want to stay signed in?"}
                </p>
                <p class="text-sm text-gray-500 dark:text-gray-400 mb-6">
                    {format!("You will be signed out in {seconds_remaining} seconds.")}
                </p>

                <div class="flex gap-3">
                    <button
                        onclick={on_stay}
                        class="flex-1 bg-blue-600 hover:bg-blue-700 text-white font-medium
                               py-3 px-4 rounded-lg transition-colors"
                    >
                        {"Stay signed in"}
                    </button>
                    <button
                        onclick={on_sign_out}
                        class="flex-1 bg-gray-200 hover:bg-gray-300 dark:bg-gray-700 dark:hover:bg-gray-600
                               text-gray-900 dark:text-white font-medium py-3 px-4 rounded-lg transition-colors"
                    >
                        {"Sign out"}
                    </button>
                </div>
            </div>
        </div>
    }
}
