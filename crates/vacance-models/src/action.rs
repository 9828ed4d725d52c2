//! Server-issued UI actions.
//!
//! Assistant frames may carry a list of instructions for the client UI
//! (navigate, open a modal, confirm a booking, …). The set of kinds is
//! **open**: the backend can introduce new kinds at any time, so decoding a
//! [`UiAction`] never fails. Entries that do not match a known shape are kept
//! verbatim as [`UiAction::Unknown`].
//!
//! Package and booking payloads are passed through as opaque JSON; their
//! schema belongs to the backend REST API.
//!
//! ```text
//! { "action": "navigate", "page": "bookings" }        → UiAction::Navigate
//! { "action": "add_favorite", "package_id": "p-1" }   → UiAction::AddFavorite
//! { "action": "get_state", "note": "…" }               → UiAction::Unknown
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Name of the discriminator field on the wire.
const TAG: &str = "action";

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// `navigate{page}`: move the UI to another page.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Navigate {
    /// Target page (e.g. `"bookings"`, `"favorites"`).
    pub page: String,
    /// Fields not covered by the typed shape.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `show_search_results{packages?}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct SearchResults {
    /// Matching packages, when the backend already ran the search.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packages: Option<Vec<Value>>,
    /// Fields not covered by the typed shape (`count`, `filters_applied`, …).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `show_recommendations{packages}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Recommendations {
    /// Recommended packages.
    pub packages: Vec<Value>,
    /// Fields not covered by the typed shape.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single package, used by `show_package_modal` and `open_booking_form`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PackagePayload {
    /// The package as returned by the backend.
    pub package: Value,
    /// Fields not covered by the typed shape (`prefill`, `total_estimate`, …).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `booking_confirmed{message, booking}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BookingConfirmation {
    /// Human-readable confirmation.
    pub message: String,
    /// The confirmed booking.
    pub booking: Value,
    /// Fields not covered by the typed shape.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `add_favorite{package_id, message}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Favorite {
    /// Package to add to the user's favorites.
    pub package_id: String,
    /// Optional notice to display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Fields not covered by the typed shape.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Free-form notice, used by `show_error` and `show_message`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Notice {
    /// Text to display, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Remaining fields (`suggestions`, …).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An action this client does not recognise, kept as received.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownAction {
    /// The discriminator, if the entry had a string `action` field.
    pub action: Option<String>,
    /// The entry exactly as it arrived.
    pub raw: Value,
}

// ---------------------------------------------------------------------------
// UiAction
// ---------------------------------------------------------------------------

/// One instruction for the client UI embedded in an assistant frame.
#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    /// Navigate to a page.
    Navigate(Navigate),
    /// Show search results.
    ShowSearchResults(SearchResults),
    /// Show personalised recommendations.
    ShowRecommendations(Recommendations),
    /// Open the detail modal of a package.
    ShowPackageModal(PackagePayload),
    /// Open the booking form for a package.
    OpenBookingForm(PackagePayload),
    /// A booking was confirmed server-side.
    BookingConfirmed(BookingConfirmation),
    /// Add a package to favorites.
    AddFavorite(Favorite),
    /// Display an error notice.
    ShowError(Notice),
    /// Display an informational notice.
    ShowMessage(Notice),
    /// Any other kind (or a malformed known kind).
    Unknown(UnknownAction),
}

impl UiAction {
    /// The wire discriminator of this action (empty when it had none).
    pub fn kind(&self) -> &str {
        match self {
            Self::Navigate(_) => "navigate",
            Self::ShowSearchResults(_) => "show_search_results",
            Self::ShowRecommendations(_) => "show_recommendations",
            Self::ShowPackageModal(_) => "show_package_modal",
            Self::OpenBookingForm(_) => "open_booking_form",
            Self::BookingConfirmed(_) => "booking_confirmed",
            Self::AddFavorite(_) => "add_favorite",
            Self::ShowError(_) => "show_error",
            Self::ShowMessage(_) => "show_message",
            Self::Unknown(unknown) => unknown.action.as_deref().unwrap_or_default(),
        }
    }

    /// `true` for kinds this client does not recognise.
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown(_))
    }

    /// Decode an action from an arbitrary JSON value. Never fails.
    pub fn from_value(value: Value) -> Self {
        match Tagged::deserialize(&value) {
            Ok(tagged) => tagged.into(),
            Err(_) => Self::Unknown(UnknownAction {
                action: value.get(TAG).and_then(Value::as_str).map(str::to_owned),
                raw: value,
            }),
        }
    }
}

impl<'de> Deserialize<'de> for UiAction {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(Self::from_value)
    }
}

impl Serialize for UiAction {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let tagged = match self {
            Self::Navigate(p) => TaggedRef::Navigate(p),
            Self::ShowSearchResults(p) => TaggedRef::ShowSearchResults(p),
            Self::ShowRecommendations(p) => TaggedRef::ShowRecommendations(p),
            Self::ShowPackageModal(p) => TaggedRef::ShowPackageModal(p),
            Self::OpenBookingForm(p) => TaggedRef::OpenBookingForm(p),
            Self::BookingConfirmed(p) => TaggedRef::BookingConfirmed(p),
            Self::AddFavorite(p) => TaggedRef::AddFavorite(p),
            Self::ShowError(p) => TaggedRef::ShowError(p),
            Self::ShowMessage(p) => TaggedRef::ShowMessage(p),
            Self::Unknown(unknown) => return unknown.raw.serialize(serializer),
        };
        tagged.serialize(serializer)
    }
}

// ---------------------------------------------------------------------------
// Wire helpers
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum Tagged {
    Navigate(Navigate),
    ShowSearchResults(SearchResults),
    ShowRecommendations(Recommendations),
    ShowPackageModal(PackagePayload),
    OpenBookingForm(PackagePayload),
    BookingConfirmed(BookingConfirmation),
    AddFavorite(Favorite),
    ShowError(Notice),
    ShowMessage(Notice),
}

#[derive(Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum TaggedRef<'a> {
    Navigate(&'a Navigate),
    ShowSearchResults(&'a SearchResults),
    ShowRecommendations(&'a Recommendations),
    ShowPackageModal(&'a PackagePayload),
    OpenBookingForm(&'a PackagePayload),
    BookingConfirmed(&'a BookingConfirmation),
    AddFavorite(&'a Favorite),
    ShowError(&'a Notice),
    ShowMessage(&'a Notice),
}

impl From<Tagged> for UiAction {
    fn from(tagged: Tagged) -> Self {
        match tagged {
            Tagged::Navigate(p) => Self::Navigate(p),
            Tagged::ShowSearchResults(p) => Self::ShowSearchResults(p),
            Tagged::ShowRecommendations(p) => Self::ShowRecommendations(p),
            Tagged::ShowPackageModal(p) => Self::ShowPackageModal(p),
            Tagged::OpenBookingForm(p) => Self::OpenBookingForm(p),
            Tagged::BookingConfirmed(p) => Self::BookingConfirmed(p),
            Tagged::AddFavorite(p) => Self::AddFavorite(p),
            Tagged::ShowError(p) => Self::ShowError(p),
            Tagged::ShowMessage(p) => Self::ShowMessage(p),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
