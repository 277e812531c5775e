//! Certificate life cycle: decide whether to renew, register, resolve the assigned domain,
//! order and persist the certificate.
//!
//! The flow is strictly sequential and stops at the first fatal error. The only recoverable
//! failures are a missing certificate file (first provisioning) and a single request to
//! accept new terms of service during registration.

use std::io::Write;

use eyre::{eyre, WrapErr as _};
use time::OffsetDateTime;

use crate::{
    cert::{self, CertificateInfo},
    client::Client,
    error::{Phase, PhaseExt as _, ProvisionError, RegistrationError},
    prompt::TermsPrompt,
    renewal::{self, RenewReason, Renewal},
    store::Store,
};

/// Writes a line of operator output; a broken output stream does not stop provisioning.
macro_rules! say {
    ($out:expr, $($arg:tt)*) => {
        if let Err(err) = writeln!($out, $($arg)*) {
            log::warn!("failed to write output: {err}");
        }
    };
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProvisionOptions {
    /// Renew even when the existing certificate is valid for more than 30 days.
    pub force_renew: bool,
}

/// Successful end of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Existing certificate is valid long enough; the authority was not contacted.
    Valid(CertificateInfo),

    /// A new certificate was issued and written.
    Issued(CertificateInfo),
}

impl Outcome {
    pub fn certificate(&self) -> &CertificateInfo {
        match self {
            Outcome::Valid(cert) | Outcome::Issued(cert) => cert,
        }
    }
}

/// Best-effort bookkeeping of the previous domain for other tooling.
fn write_domain_hint(store: &impl Store, domain: &str) {
    if let Err(err) = store.write_domain_file(domain) {
        log::warn!("Failed to record domain {domain:?}: {err:#}");
    }
}

fn print_cert_info(out: &mut impl Write, store: &impl Store, cert: &CertificateInfo) {
    say!(out, "\nCertificate expires {}\n", cert.not_after);
    say!(out, "Certificate (chain):  {}", store.certificate_file().display());
    say!(out, "Certificate privkey:  {}", store.key_file().display());
}

/// Runs one provisioning pass, writing operator output to `out`.
pub async fn provision<S, C, P, W>(
    store: &mut S,
    client: &mut C,
    prompt: &mut P,
    out: &mut W,
    options: ProvisionOptions,
) -> Result<Outcome, ProvisionError>
where
    S: Store,
    C: Client,
    P: TermsPrompt,
    W: Write,
{
    let existing = store
        .read_certificate()
        .with_context(|| format!("{:?}", store.certificate_file().display()))
        .phase(Phase::ReadCertificate)?;

    let cert_domain = existing
        .as_ref()
        .map(|cert| cert.common_name.clone())
        .unwrap_or_default();

    if existing.is_some() {
        write_domain_hint(store, &cert_domain);
        say!(out, "Found existing certificate for domain {cert_domain:?}");
    }

    let decision = renewal::decide(
        existing.as_ref(),
        options.force_renew,
        OffsetDateTime::now_utc(),
    );
    log::debug!("Renewal decision: {decision:?}");

    match (decision, existing) {
        (Renewal::Skip, Some(cert)) => {
            say!(
                out,
                "Existing certificate expires in > 30 days and doesn't need to be renewed"
            );
            print_cert_info(out, store, &cert);
            return Ok(Outcome::Valid(cert));
        }
        (Renewal::Renew(RenewReason::ExpiresSoon), _) => {
            say!(out, "Existing certificate expires in < 30 days and will be renewed");
        }
        (Renewal::Renew(RenewReason::Expired), _) => {
            say!(out, "Existing certificate has expired and will be renewed");
        }
        _ => {}
    }

    let mut terms_retried = false;
    let registered = loop {
        let account = store.account();
        let result = client
            .ensure_registration(&account.accepted_terms, &account.key_id)
            .await;

        match result {
            Ok(registered) => break registered,

            Err(RegistrationError::TermsNotAccepted { uri }) if !terms_retried => {
                log::debug!("Registration requires accepting {uri}");
                prompt.accept_terms(&uri).phase(Phase::AcceptTerms)?;
                store.account_mut().accepted_terms = uri;
                terms_retried = true;
            }

            Err(RegistrationError::Other(err)) => {
                return Err(ProvisionError::new(Phase::Registration, err))
            }

            // terms still not accepted after the retry
            Err(err @ RegistrationError::TermsNotAccepted { .. }) => {
                return Err(ProvisionError::new(Phase::Registration, err))
            }
        }
    };

    store.account_mut().key_id = registered.key_id;
    store
        .write_account_file()
        .with_context(|| format!("{:?}", store.account_file().display()))
        .phase(Phase::WriteAccount)?;

    let domain = client.domain().await;
    // the hint keeps the previous domain; the new one is only recorded in the certificate
    write_domain_hint(store, &cert_domain);
    let domain = domain.phase(Phase::DomainLookup)?;

    if !cert_domain.is_empty() && !domain.is_empty() && cert_domain != domain {
        say!(out, "The localcert server has assigned you a new domain!\n");
        say!(out, "  Old domain: {cert_domain:?}");
        say!(out, "  New domain: {domain:?}\n");
    }

    let (verb, provision_phase) = if options.force_renew {
        ("Reprovisioning", Phase::Reprovision)
    } else {
        ("Provisioning", Phase::Provision)
    };

    say!(out, "{verb} domain {domain:?}...");
    let order = client
        .provision_domain(&domain)
        .await
        .phase(provision_phase)?;

    let cert_key = store
        .read_or_generate_certificate_key()
        .phase(Phase::CertificateKey)?;

    say!(out, "Domain provisioned; waiting for certificate generation...");
    let chain = client
        .certificate(order, &cert_key)
        .await
        .phase(Phase::FetchCertificate)?;

    let leaf = chain
        .first()
        .ok_or_else(|| eyre!("authority returned an empty certificate chain"))
        .and_then(|der| CertificateInfo::from_der(der))
        .phase(Phase::ParseCertificate)?;

    // encoded in full before the single write so a failure leaves the old file intact
    let pem = cert::encode_pem_chain(&chain).phase(Phase::WriteCertificate)?;
    store
        .write_certificate_file(pem.as_bytes())
        .with_context(|| format!("{:?}", store.certificate_file().display()))
        .phase(Phase::WriteCertificate)?;

    print_cert_info(out, store, &leaf);

    Ok(Outcome::Issued(leaf))
}
