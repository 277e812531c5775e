use std::io::{BufReader, Cursor};

use der::{
    asn1::{BmpString, Ia5String},
    oid::ObjectIdentifier,
    Decode as _, Tag, Tagged as _,
};
use eyre::{eyre, WrapErr as _};
use pkcs8::{DecodePrivateKey as _, EncodePrivateKey as _};
use time::{OffsetDateTime, PrimitiveDateTime};
use x509_cert::{
    builder::{Builder, RequestBuilder as CsrBuilder},
    ext::pkix::{name::GeneralName, SubjectAltName},
    name::Name,
};
use zeroize::Zeroizing;

/// PEM label of every block in a certificate file.
pub const CERTIFICATE_PEM_LABEL: &str = "CERTIFICATE";

/// `id-at-commonName`
const COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");

/// Make a P-256 private key (from which we can derive a public key).
pub fn create_p256_key() -> p256::ecdsa::SigningKey {
    let csprng = &mut rand::thread_rng();
    ecdsa::SigningKey::from(p256::SecretKey::random(csprng))
}

/// PKCS#8 PEM encoding of `key`.
pub fn signing_key_to_pem(key: &p256::ecdsa::SigningKey) -> eyre::Result<Zeroizing<String>> {
    key.to_pkcs8_pem(pem::LineEnding::LF)
        .context("private_key_to_pem")
}

pub fn signing_key_from_pem(pem: &str) -> eyre::Result<p256::ecdsa::SigningKey> {
    p256::ecdsa::SigningKey::from_pkcs8_pem(pem).context("Error reading private key PEM")
}

/// Creates a CSR for `domains` signed with `signer`.
///
/// The first domain becomes the Common Name and every domain is listed in the Subject
/// Alternative Name extension.
pub(crate) fn create_csr(
    signer: &p256::ecdsa::SigningKey,
    domains: &[&str],
) -> eyre::Result<x509_cert::request::CertReq> {
    let primary_domain = domains
        .first()
        .ok_or_else(|| eyre!("cannot create a CSR without a domain"))?;
    let subject = format!("CN={primary_domain}")
        .parse::<Name>()
        .with_context(|| format!("invalid domain for CSR subject: {primary_domain:?}"))?;

    let mut csr = CsrBuilder::new(subject, signer).context("create csr builder")?;

    let alt_names = domains
        .iter()
        .map(|domain| Ok(GeneralName::DnsName(Ia5String::new(domain)?)))
        .collect::<der::Result<Vec<_>>>()?;
    csr.add_extension(&SubjectAltName(alt_names))
        .context("add subjectAltName")?;

    csr.build::<p256::ecdsa::DerSignature>()
        .context("build csr")
}

/// The parts of an X.509 certificate the provisioning flow looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    /// Subject Common Name, the provisioned domain. Empty when the subject has none.
    pub common_name: String,

    /// End of the validity period.
    pub not_after: OffsetDateTime,

    /// DER encoding the fields were parsed from.
    pub der: Vec<u8>,
}

impl CertificateInfo {
    pub fn from_der(der: &[u8]) -> eyre::Result<Self> {
        let cert = x509_cert::Certificate::from_der(der).context("invalid X.509 certificate")?;
        let tbs = &cert.tbs_certificate;

        let not_after = PrimitiveDateTime::try_from(tbs.validity.not_after.to_date_time())
            .context("certificate notAfter out of range")?
            .assume_utc();

        Ok(CertificateInfo {
            common_name: common_name(&tbs.subject)?.unwrap_or_default(),
            not_after,
            der: der.to_vec(),
        })
    }

    /// Parses the first certificate of a PEM chain. `Ok(None)` if there is none.
    pub fn from_pem_chain(pem: &[u8]) -> eyre::Result<Option<Self>> {
        decode_pem_chain(pem)?
            .first()
            .map(|leaf| Self::from_der(leaf))
            .transpose()
    }

    /// Time left until `not_after`; negative once expired.
    pub fn expires_in(&self, now: OffsetDateTime) -> time::Duration {
        self.not_after - now
    }
}

fn common_name(subject: &Name) -> eyre::Result<Option<String>> {
    let Some(atv) = subject
        .0
        .iter()
        .flat_map(|rdn| rdn.0.iter())
        .find(|atv| atv.oid == COMMON_NAME)
    else {
        return Ok(None);
    };

    let raw = atv.value.value();

    match atv.value.tag() {
        Tag::Utf8String | Tag::PrintableString | Tag::Ia5String | Tag::VisibleString => {
            let cn = std::str::from_utf8(raw).context("common name is not UTF-8")?;
            Ok(Some(cn.to_owned()))
        }

        // UTF-16BE
        Tag::BmpString => {
            let cn = BmpString::from_ucs2(raw).context("malformed BMPString common name")?;
            Ok(Some(cn.to_string()))
        }

        // read as Latin-1
        Tag::TeletexString => Ok(Some(raw.iter().copied().map(char::from).collect())),

        tag => {
            log::debug!("Ignoring common name with {tag} encoding");
            Ok(None)
        }
    }
}

/// Splits a PEM file into the DER of its certificates, in file order.
pub fn decode_pem_chain(pem: &[u8]) -> eyre::Result<Vec<Vec<u8>>> {
    let mut rdr = BufReader::new(Cursor::new(pem));

    rustls_pemfile::certs(&mut rdr)
        .map(|res| res.map(|cert| cert.to_vec()))
        .collect::<Result<Vec<_>, _>>()
        .context("malformed PEM certificate chain")
}

/// Encodes each DER entry as a `CERTIFICATE` PEM block, concatenated in chain order.
pub fn encode_pem_chain<B: AsRef<[u8]>>(chain: &[B]) -> eyre::Result<String> {
    chain.iter().try_fold(String::new(), |mut buf, der| {
        let block = pem::encode_string(CERTIFICATE_PEM_LABEL, pem::LineEnding::LF, der.as_ref())
            .map_err(|err| eyre!("PEM encoding failed: {err}"))?;
        buf.push_str(&block);
        Ok(buf)
    })
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;
    use crate::test::self_signed;

    #[test]
    fn parses_common_name_and_expiry() {
        let not_after = OffsetDateTime::now_utc() + Duration::days(60);
        let der = self_signed("abc123.example", not_after);

        let info = CertificateInfo::from_der(&der).unwrap();
        assert_eq!(info.common_name, "abc123.example");
        assert_eq!(info.not_after.unix_timestamp(), not_after.unix_timestamp());
        assert_eq!(info.der, der);
    }

    #[test]
    fn pem_chain_preserves_entries_and_order() {
        let expiry = OffsetDateTime::now_utc() + Duration::days(90);
        let chain = vec![
            self_signed("leaf.example", expiry),
            self_signed("intermediate.example", expiry),
        ];

        let pem = encode_pem_chain(&chain).unwrap();
        assert_eq!(pem.matches("-----BEGIN CERTIFICATE-----").count(), 2);
        assert_eq!(decode_pem_chain(pem.as_bytes()).unwrap(), chain);

        let leaf = CertificateInfo::from_pem_chain(pem.as_bytes()).unwrap().unwrap();
        assert_eq!(leaf.common_name, "leaf.example");
    }

    #[test]
    fn empty_pem_has_no_leaf() {
        assert!(CertificateInfo::from_pem_chain(b"").unwrap().is_none());
        assert_eq!(encode_pem_chain::<Vec<u8>>(&[]).unwrap(), "");
    }

    fn self_signed_with_cn(common_name: rcgen::DnValue) -> Vec<u8> {
        let mut params = rcgen::CertificateParams::new(vec!["abc123.example".to_owned()]).unwrap();
        params.distinguished_name = rcgen::DistinguishedName::new();
        params
            .distinguished_name
            .push(rcgen::DnType::CommonName, common_name);

        let key = rcgen::KeyPair::generate().unwrap();
        params.self_signed(&key).unwrap().der().to_vec()
    }

    #[test]
    fn reads_bmp_and_teletex_common_names() {
        let bmp = rcgen::BmpString::try_from("abc123.example").unwrap();
        let der = self_signed_with_cn(rcgen::DnValue::BmpString(bmp));
        let info = CertificateInfo::from_der(&der).unwrap();
        assert_eq!(info.common_name, "abc123.example");

        let teletex = rcgen::TeletexString::try_from("abc123.example").unwrap();
        let der = self_signed_with_cn(rcgen::DnValue::TeletexString(teletex));
        let info = CertificateInfo::from_der(&der).unwrap();
        assert_eq!(info.common_name, "abc123.example");
    }

    #[test]
    fn garbage_der_is_rejected() {
        assert!(CertificateInfo::from_der(b"not a certificate").is_err());
    }

    #[test]
    fn csr_names_domain() {
        let key = create_p256_key();
        let csr = create_csr(&key, &["abc123.example"]).unwrap();

        assert_eq!(
            common_name(&csr.info.subject).unwrap().as_deref(),
            Some("abc123.example"),
        );
        assert!(create_csr(&key, &[]).is_err());
    }

    #[test]
    fn key_pem_round_trip() {
        let key = create_p256_key();
        let pem = signing_key_to_pem(&key).unwrap();
        assert_eq!(signing_key_from_pem(&pem).unwrap(), key);
    }
}
