//! External service clients
//!
//! Everything the pipeline talks to over the network lives here, behind
//! traits so the pipeline itself stays testable without a network:
//! Otoplus serial verification, the Otomax core sink, and the read-only
//! photo search service.

pub mod otomax_client;
pub mod otoplus_client;
pub mod photo_client;

pub use otomax_client::{CoreInsertOutcome, CoreSink, CoreSinkError, OtomaxClient};
pub use otoplus_client::{OtoplusClient, SerialVerifier, VerificationStatus, VerifierError};
pub use photo_client::{PhotoClient, PhotoError, PhotoRef};
