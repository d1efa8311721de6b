//! # BridgeSync Engine
//!
//! The outbound half of the bridge: fans domain events out to every
//! opted-in partner site, encrypts password material per site, and guards
//! the inbound side against echo loops and unauthenticated callers.
//!
//! Delivery is fire-and-forget by design. The partner site is the system of
//! record for what it does with an event; this side only guarantees that
//! each opted-in site is offered every event exactly once, that failures
//! are visible in the [`DispatchReport`], and that one site's outage never
//! blocks another site's delivery.
//!
//! HTTP goes through the [`HttpClient`] seam; [`RecordingClient`] scripts
//! it in tests. Observers hand events to an [`EventSink`], which the
//! dispatcher implements.

mod bus;
mod dispatcher;
mod error;
mod guard;
mod http;
mod password;

pub use bus::{EventSink, RecordingSink};
pub use dispatcher::{
    DispatchAttempt, DispatchConfig, DispatchOutcome, DispatchReport, SyncDispatcher,
    DEFAULT_DISPATCH_TIMEOUT, WEBHOOK_PATH,
};
pub use error::{EngineError, EngineResult};
pub use guard::{extract_sso_value, InboundRequest};
pub use http::{HttpClient, HttpError, HttpResponse, RecordingClient, SentRequest};
pub use password::{
    decrypt_sso_payload, encrypt_password, query_value, CipherError, EncryptedPassword,
};
