//! Credential-hiding relay for the account character-list API.
//!
//! # Architecture
//!
//! ```text
//! Browser → GET http://relay:5353/char/list?guid=<md5(user) or email>
//!               ↓
//!          [Relay (axum)]
//!               ↓ resolves guid → real user/password (CredentialDirectory)
//!               ↓ spends one unit of the global quota (QuotaGate)
//!               ↓ GET <upstream>/char/list?guid=<user>&password=<pass>&muleDump=true
//!          [Upstream API] → <Chars …> XML
//!               ↓ usable record → ResultCache, answered as JSON envelope
//!               ↓ quota spent / upstream failure → last cached record as XML
//! ```
//!
//! The real credentials never leave the relay. The quota is shared by every
//! account and rolls over on a fixed window, independent of traffic.

pub mod cache;
pub mod config;
pub mod credentials;
pub mod quota;
pub mod record;
pub mod relay;
pub mod server;
pub mod upstream;

pub use config::Config;
pub use credentials::{Credential, CredentialDirectory, PublicId};
pub use server::{serve, serve_listener};
