//! # Statship Channels
//!
//! Outbound delivery transports for report jobs: SMTP email (lettre) and
//! chat webhooks (Discord, MS Teams, generic JSON POST). Both return the
//! tagged [`statship_core::types::SendOutcome`] so the scheduler can tell
//! "nothing to send" apart from a transport failure without parsing error
//! strings.

pub mod email;
pub mod render;
pub mod webhook;

pub use email::SmtpEmailTransport;
pub use webhook::HttpWebhookTransport;
