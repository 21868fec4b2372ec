//! Authentication context and hooks for the UI.

use api::{AuthService, SessionState};
use dioxus::prelude::*;

/// Current session state. Updates whenever the auth service publishes.
pub fn use_auth() -> Signal<SessionState> {
    use_context::<Signal<SessionState>>()
}

/// The auth service provided by [`AuthProvider`], for sign-in and sign-out calls.
pub fn use_auth_service() -> AuthService {
    use_context::<AuthService>()
}

/// Provider component that exposes the auth service and mirrors its session state.
/// Wrap your app with this component to enable authentication.
///
/// On mount it runs the startup session check; until that finishes the state is
/// [`SessionState::Resolving`].
#[component]
pub fn AuthProvider(service: AuthService, children: Element) -> Element {
    let mut session = use_signal(|| service.state());
    let service = use_context_provider(|| service.clone());
    use_context_provider(|| session);

    use_future(move || {
        let service = service.clone();
        async move {
            let mut updates = service.subscribe();
            service.check_session().await;
            loop {
                let current = updates.borrow_and_update().clone();
                if *session.peek() != current {
                    session.set(current);
                }
                if updates.changed().await.is_err() {
                    tracing::debug!("auth service dropped, stopping session updates");
                    break;
                }
            }
        }
    });

    rsx! {
        {children}
    }
}

/// Button to sign the current user out, then go to `redirect_to`.
#[component]
pub fn LogoutButton(
    #[props(default = "Logout".to_string())] label: String,
    #[props(default = "".to_string())] class: String,
    #[props(default = "/login".to_string())] redirect_to: String,
) -> Element {
    let service = use_auth_service();
    let nav = use_navigator();
    let mut busy = use_signal(|| false);

    let onclick = move |_| {
        let service = service.clone();
        let redirect_to = redirect_to.clone();
        async move {
            busy.set(true);
            service.sign_out().await;
            busy.set(false);
            nav.replace(redirect_to);
        }
    };

    rsx! {
        button {
            class: "{class}",
            disabled: busy(),
            onclick: onclick,
            "{label}"
        }
    }
}
