use time::{Duration, OffsetDateTime};

use crate::cert::CertificateInfo;

/// Certificates expiring further out than this are left alone unless renewal is forced.
pub const RENEWAL_WINDOW: Duration = Duration::days(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Renewal {
    /// The existing certificate is good for more than [`RENEWAL_WINDOW`].
    Skip,
    Renew(RenewReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewReason {
    /// No certificate yet.
    Initial,
    /// Expires within [`RENEWAL_WINDOW`].
    ExpiresSoon,
    Expired,
    /// Renewal was forced by the operator.
    Forced,
}

/// Decides whether `existing` has to be replaced at instant `now`.
pub fn decide(existing: Option<&CertificateInfo>, force_renew: bool, now: OffsetDateTime) -> Renewal {
    let Some(cert) = existing else {
        return Renewal::Renew(RenewReason::Initial);
    };

    if force_renew {
        return Renewal::Renew(RenewReason::Forced);
    }

    let expires_in = cert.expires_in(now);

    if expires_in > RENEWAL_WINDOW {
        Renewal::Skip
    } else if expires_in > Duration::ZERO {
        Renewal::Renew(RenewReason::ExpiresSoon)
    } else {
        Renewal::Renew(RenewReason::Expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cert_expiring(not_after: OffsetDateTime) -> CertificateInfo {
        CertificateInfo {
            common_name: "abc123.example".to_owned(),
            not_after,
            der: Vec::new(),
        }
    }

    #[test]
    fn boundaries() {
        let now = OffsetDateTime::now_utc();
        let at = |offset: Duration| decide(Some(&cert_expiring(now + offset)), false, now);

        assert_eq!(at(Duration::days(60)), Renewal::Skip);
        assert_eq!(at(RENEWAL_WINDOW + Duration::SECOND), Renewal::Skip);
        assert_eq!(at(RENEWAL_WINDOW), Renewal::Renew(RenewReason::ExpiresSoon));
        assert_eq!(at(Duration::days(10)), Renewal::Renew(RenewReason::ExpiresSoon));
        assert_eq!(at(Duration::SECOND), Renewal::Renew(RenewReason::ExpiresSoon));
        assert_eq!(at(Duration::ZERO), Renewal::Renew(RenewReason::Expired));
        assert_eq!(at(-Duration::days(3)), Renewal::Renew(RenewReason::Expired));
    }

    #[test]
    fn missing_certificate_is_initial() {
        let now = OffsetDateTime::now_utc();
        assert_eq!(decide(None, false, now), Renewal::Renew(RenewReason::Initial));
        assert_eq!(decide(None, true, now), Renewal::Renew(RenewReason::Initial));
    }

    #[test]
    fn force_overrides_validity() {
        let now = OffsetDateTime::now_utc();
        let cert = cert_expiring(now + Duration::days(80));
        assert_eq!(decide(Some(&cert), true, now), Renewal::Renew(RenewReason::Forced));
    }
}
