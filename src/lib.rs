//! Provisioning and renewing the TLS certificate of a [localcert](https://localcert.net) domain.
//!
//! A localcert authority is an ACME ([RFC 8555](https://datatracker.ietf.org/doc/html/rfc8555))
//! server that assigns each account a domain under its own zone and publishes `dns-01` challenge
//! records on the account's behalf. Proving control of the domain therefore needs no DNS access
//! of your own.
//!
//! # Flow
//!
//! [`provision()`] runs one pass:
//!
//! 1. Read the existing certificate, if any, and keep it when it is valid for more than 30 days
//!    (unless renewal is forced).
//! 2. Register the account, asking the operator once to accept changed terms of service.
//! 3. Look up the domain currently assigned to the account.
//! 4. Order a certificate for that domain, publishing the `dns-01` proof through the authority.
//! 5. Finalize with a CSR from the (persistent) certificate key and write the issued chain.
//!
//! Any failure stops the run with a [`ProvisionError`] naming the [`Phase`] that failed.
//!
//! # Seams
//!
//! The flow is generic over where state lives ([`Store`], implemented by [`Config`] on a
//! directory), how the authority is reached ([`Client`], implemented by [`AcmeClient`]) and how
//! the operator is asked about terms ([`TermsPrompt`], implemented by [`StdinPrompt`]).
//!
//! # Rate Limits
//!
//! Authorities rate limit issuance. Renewals only happen inside the 30 day window for that reason;
//! avoid forcing renewal in a loop.

#![deny(rust_2018_idioms, nonstandard_style, future_incompatible)]

mod acc;
mod api;
mod dir;
mod jws;
mod order;
mod req;
mod trans;

pub mod cert;
pub mod client;
pub mod config;
pub mod error;
pub mod prompt;
pub mod provision;
pub mod renewal;
pub mod store;


pub use crate::{
    cert::{create_p256_key, CertificateInfo},
    client::{AcmeClient, Client, RegisteredAccount},
    config::Config,
    error::{Phase, ProvisionError, RegistrationError},
    prompt::{StdinPrompt, TermsPrompt},
    provision::{provision, Outcome, ProvisionOptions},
    store::{AccountRecord, Store},
};
