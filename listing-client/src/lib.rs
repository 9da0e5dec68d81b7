//! listing-client: the browser-side protocol of the listing analysis app.
//!
//! Widgets here own their state and talk to the backend through
//! [`ListingApi`]; rendering is left to the embedding UI.

pub mod analysis;
pub mod api;
pub mod autocomplete;
pub mod config;
pub mod error;
pub mod notify;
pub mod payment;
pub mod session;
#[cfg(test)]
mod testing;

pub use analysis::{ListingAnalysisClient, SubmitError};
pub use api::{
    AddressPrediction, BackendClient, CreatedIntent, ListingApi, SubscriptionStatus, Verification,
};
pub use autocomplete::{AddressAutocomplete, AutocompleteConfig, AutocompleteSnapshot, Key};
pub use config::ClientConfig;
pub use error::ApiError;
pub use notify::{Notice, Notifier, RecordingNotifier, TracingNotifier};
pub use payment::{
    CardConfirmer, CardDetails, PaymentError, PaymentFlow, PaymentState, ProcessorError,
    ProcessorResult,
};
pub use session::{PremiumGate, Session, View};
