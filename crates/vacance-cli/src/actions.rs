//! Terminal rendering of assistant UI actions.
//!
//! A browser would navigate or open a modal; here every action becomes one
//! line of text under the assistant's reply.

use serde_json::Value;
use vacance_models::UiAction;

/// One-line description of an action.
pub fn describe(action: &UiAction) -> String {
    match action {
        UiAction::Navigate(nav) => format!("→ open page /{}", nav.page),
        UiAction::ShowSearchResults(results) => match &results.packages {
            Some(packages) => format!("{} package(s) found: {}", packages.len(), names(packages)),
            None => "search results updated".to_string(),
        },
        UiAction::ShowRecommendations(recs) => {
            format!("recommended: {}", names(&recs.packages))
        }
        UiAction::ShowPackageModal(p) => format!("package details: {}", package_name(&p.package)),
        UiAction::OpenBookingForm(p) => format!("booking form for {}", package_name(&p.package)),
        UiAction::BookingConfirmed(confirmation) => {
            let reference = confirmation
                .booking
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or("?");
            format!("✔ {} (booking {reference})", confirmation.message)
        }
        UiAction::AddFavorite(fav) => match &fav.message {
            Some(message) => format!("♥ {message} ({})", fav.package_id),
            None => format!("♥ added {} to favorites", fav.package_id),
        },
        UiAction::ShowError(notice) => {
            format!("✖ {}", notice.message.as_deref().unwrap_or("error"))
        }
        UiAction::ShowMessage(notice) => {
            format!("ℹ {}", notice.message.as_deref().unwrap_or_default())
        }
        UiAction::Unknown(unknown) => format!(
            "unhandled action `{}`",
            unknown.action.as_deref().unwrap_or("?")
        ),
    }
}

fn package_name(package: &Value) -> &str {
    package
        .get("name")
        .and_then(Value::as_str)
        .or_else(|| package.get("id").and_then(Value::as_str))
        .unwrap_or("unnamed package")
}

fn names(packages: &[Value]) -> String {
    packages
        .iter()
        .map(package_name)
        .collect::<Vec<_>>()
        .join(", ")
}
