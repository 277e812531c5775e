use std::{error::Error as StdError, fmt};

/// Step of a provisioning run that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    ReadCertificate,
    Registration,
    AcceptTerms,
    WriteAccount,
    DomainLookup,
    Provision,
    Reprovision,
    CertificateKey,
    FetchCertificate,
    ParseCertificate,
    WriteCertificate,
}

impl Phase {
    fn label(self) -> &'static str {
        match self {
            Phase::ReadCertificate => "Error reading existing certificate",
            Phase::Registration => "Registration error",
            Phase::AcceptTerms => "Terms of service not accepted",
            Phase::WriteAccount => "Error writing ACME account file",
            Phase::DomainLookup => "Error getting localcert domain name",
            Phase::Provision => "Error provisioning domain",
            Phase::Reprovision => "Error reprovisioning domain",
            Phase::CertificateKey => "Certificate key error",
            Phase::FetchCertificate => "Error fetching certificate",
            Phase::ParseCertificate => "Error parsing generated certificate",
            Phase::WriteCertificate => "Error writing certificate",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Fatal failure of a provisioning run.
///
/// Displays as the diagnostic shown to the operator: the phase label followed by the cause.
#[derive(Debug)]
pub struct ProvisionError {
    phase: Phase,
    source: eyre::Report,
}

impl ProvisionError {
    pub fn new(phase: Phase, source: impl Into<eyre::Report>) -> Self {
        ProvisionError {
            phase,
            source: source.into(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The underlying cause, with its own chain of context.
    pub fn report(&self) -> &eyre::Report {
        &self.source
    }
}

impl fmt::Display for ProvisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:#}", self.phase, self.source)
    }
}

impl StdError for ProvisionError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Attaches a [`Phase`] to the error of a fallible step.
pub(crate) trait PhaseExt<T> {
    fn phase(self, phase: Phase) -> Result<T, ProvisionError>;
}

impl<T, E: Into<eyre::Report>> PhaseExt<T> for Result<T, E> {
    fn phase(self, phase: Phase) -> Result<T, ProvisionError> {
        self.map_err(|err| ProvisionError::new(phase, err))
    }
}

/// Failure of [`Client::ensure_registration`](crate::Client::ensure_registration).
#[derive(Debug)]
pub enum RegistrationError {
    /// The account has to agree to the terms of service document at `uri` first.
    TermsNotAccepted { uri: String },

    Other(eyre::Report),
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationError::TermsNotAccepted { uri } => {
                write!(f, "terms of service not accepted: {uri}")
            }
            RegistrationError::Other(err) => write!(f, "{err:#}"),
        }
    }
}

impl StdError for RegistrationError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            RegistrationError::TermsNotAccepted { .. } => None,
            RegistrationError::Other(err) => Some(err.as_ref()),
        }
    }
}

impl From<eyre::Report> for RegistrationError {
    fn from(err: eyre::Report) -> Self {
        RegistrationError::Other(err)
    }
}

#[cfg(test)]
mod tests {
    use eyre::WrapErr as _;

    use super::*;

    #[test]
    fn display_leads_with_phase() {
        let err: Result<(), _> = Err(eyre::eyre!("connection refused")).context("newAccount");
        let err = err.phase(Phase::Registration).unwrap_err();

        assert_eq!(err.phase(), Phase::Registration);
        assert_eq!(
            err.to_string(),
            "Registration error: newAccount: connection refused",
        );
    }

    #[test]
    fn terms_error_names_document() {
        let err = RegistrationError::TermsNotAccepted {
            uri: "https://ca.example/tos/2".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "terms of service not accepted: https://ca.example/tos/2",
        );
        assert!(err.source().is_none());
    }
}
