//! Role-gated route wrapper.

use api::auth::{evaluate, Access, GuardDecision};
use dioxus::prelude::*;

use crate::auth::use_auth;

/// Render `children` only for principals that `access` admits.
///
/// While the session is resolving a loading placeholder is shown. Anyone else is sent
/// to `login_path` with `from` preserved as the `redirect` query parameter.
#[component]
pub fn RequireRole(
    #[props(default)] access: Access,
    from: String,
    #[props(default = "/login".to_string())] login_path: String,
    children: Element,
) -> Element {
    let session = use_auth();
    let nav = use_navigator();

    let decision = evaluate(&session.read(), access, &from, &login_path);
    match decision {
        GuardDecision::Loading => rsx! {
            div { class: "loading-container",
                div { class: "spinner" }
                p { "Loading..." }
            }
        },
        GuardDecision::Allow => rsx! {
            {children}
        },
        GuardDecision::Redirect { to } => {
            nav.replace(to);
            rsx! {}
        }
    }
}
