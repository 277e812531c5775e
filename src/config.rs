use std::{
    fs, io,
    path::{Path, PathBuf},
};

use eyre::{eyre, WrapErr as _};
use serde::Deserialize;

use crate::{
    cert::{self, CertificateInfo},
    client::AcmeClient,
    store::{AccountRecord, Store},
};

/// Directory of the public localcert authority.
pub const DEFAULT_DIRECTORY_URL: &str = "https://acme.localcert.net/directory";

const SETTINGS_FILE: &str = "config.json";

/// Optional `config.json` overrides. Relative paths are resolved against the config directory.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
struct Settings {
    directory_url: String,
    certificate_file: PathBuf,
    key_file: PathBuf,
    account_file: PathBuf,
    domain_file: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            directory_url: DEFAULT_DIRECTORY_URL.to_owned(),
            certificate_file: "cert.pem".into(),
            key_file: "key.pem".into(),
            account_file: "acme-account.json".into(),
            domain_file: "domain".into(),
        }
    }
}

/// File-backed [`Store`] rooted at a configuration directory.
#[derive(Debug)]
pub struct Config {
    directory_url: String,
    certificate_file: PathBuf,
    key_file: PathBuf,
    account_file: PathBuf,
    domain_file: PathBuf,
    account: AccountRecord,
}

impl Config {
    /// `$HOME/.localcert`
    pub fn default_dir() -> eyre::Result<PathBuf> {
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".localcert"))
            .ok_or_else(|| eyre!("HOME is not set; pass a config directory explicitly"))
    }

    /// Loads settings and the account record from `dir`, creating the directory if needed.
    ///
    /// Without an account file a fresh account key is generated; it is only written to disk
    /// once registration succeeds.
    pub fn load(dir: impl AsRef<Path>) -> eyre::Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("creating config directory {}", dir.display()))?;

        let settings_path = dir.join(SETTINGS_FILE);
        let settings = match fs::read(&settings_path) {
            Ok(raw) => serde_json::from_slice::<Settings>(&raw)
                .with_context(|| format!("parsing {}", settings_path.display()))?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => Settings::default(),
            Err(err) => {
                return Err(err).with_context(|| format!("reading {}", settings_path.display()))
            }
        };

        let account_file = dir.join(settings.account_file);
        let account = match fs::read(&account_file) {
            Ok(raw) => {
                let record = serde_json::from_slice::<AccountRecord>(&raw)
                    .with_context(|| format!("parsing {}", account_file.display()))?;
                log::debug!("Loaded account {:?}", record.key_id);
                record
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::debug!("No account file, generating account key");
                AccountRecord {
                    key_id: String::new(),
                    accepted_terms: String::new(),
                    private_key: cert::signing_key_to_pem(&cert::create_p256_key())?,
                }
            }
            Err(err) => {
                return Err(err).with_context(|| format!("reading {}", account_file.display()))
            }
        };

        Ok(Config {
            directory_url: settings.directory_url,
            certificate_file: dir.join(settings.certificate_file),
            key_file: dir.join(settings.key_file),
            account_file,
            domain_file: dir.join(settings.domain_file),
            account,
        })
    }

    pub fn directory_url(&self) -> &str {
        &self.directory_url
    }

    pub fn domain_file(&self) -> &Path {
        &self.domain_file
    }

    /// ACME client for the configured authority, signing with the account key.
    pub fn client(&self) -> eyre::Result<AcmeClient> {
        AcmeClient::new(&self.directory_url, &self.account.private_key)
    }
}

/// Writes a file readable only by its owner.
fn write_private(path: &Path, contents: &[u8]) -> io::Result<()> {
    use io::Write as _;

    let mut opts = fs::OpenOptions::new();
    opts.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt as _;
        opts.mode(0o600);
    }

    opts.open(path)?.write_all(contents)
}

impl Store for Config {
    fn certificate_file(&self) -> &Path {
        &self.certificate_file
    }

    fn key_file(&self) -> &Path {
        &self.key_file
    }

    fn account_file(&self) -> &Path {
        &self.account_file
    }

    fn account(&self) -> &AccountRecord {
        &self.account
    }

    fn account_mut(&mut self) -> &mut AccountRecord {
        &mut self.account
    }

    fn read_certificate(&self) -> eyre::Result<Option<CertificateInfo>> {
        let pem = match fs::read(&self.certificate_file) {
            Ok(pem) => pem,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        CertificateInfo::from_pem_chain(&pem)?
            .map(Some)
            .ok_or_else(|| eyre!("no certificate found in file"))
    }

    fn write_account_file(&self) -> eyre::Result<()> {
        let json = serde_json::to_vec_pretty(&self.account)?;
        log::debug!("Writing account file {}", self.account_file.display());
        write_private(&self.account_file, &json)?;
        Ok(())
    }

    fn read_or_generate_certificate_key(&self) -> eyre::Result<p256::ecdsa::SigningKey> {
        match fs::read_to_string(&self.key_file) {
            Ok(pem) => cert::signing_key_from_pem(&pem)
                .with_context(|| format!("reading {}", self.key_file.display())),

            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::debug!("Generating certificate key {}", self.key_file.display());
                let key = cert::create_p256_key();
                let pem = cert::signing_key_to_pem(&key)?;
                write_private(&self.key_file, pem.as_bytes())
                    .with_context(|| format!("writing {}", self.key_file.display()))?;
                Ok(key)
            }

            Err(err) => Err(err).with_context(|| format!("reading {}", self.key_file.display())),
        }
    }

    fn write_certificate_file(&self, contents: &[u8]) -> eyre::Result<()> {
        fs::write(&self.certificate_file, contents)?;
        Ok(())
    }

    fn write_domain_file(&self, domain: &str) -> eyre::Result<()> {
        fs::write(&self.domain_file, domain)
            .with_context(|| format!("writing {}", self.domain_file.display()))
    }
}

#[cfg(test)]
mod tests {
    use time::{Duration, OffsetDateTime};

    use super::*;
    use crate::test::self_signed;

    #[test]
    fn defaults_without_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();

        assert_eq!(config.directory_url(), DEFAULT_DIRECTORY_URL);
        assert_eq!(config.certificate_file(), dir.path().join("cert.pem"));
        assert_eq!(config.key_file(), dir.path().join("key.pem"));
        assert!(config.account().key_id.is_empty());
        assert!(config.read_certificate().unwrap().is_none());

        // generated account key is not persisted by loading
        assert!(!config.account_file().exists());
        config.client().unwrap();
    }

    #[test]
    fn settings_override_paths_and_url() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.json"),
            r#"{ "directoryUrl": "https://ca.example/dir", "certificateFile": "/etc/tls/chain.pem" }"#,
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.directory_url(), "https://ca.example/dir");
        assert_eq!(config.certificate_file(), Path::new("/etc/tls/chain.pem"));
        assert_eq!(config.domain_file(), dir.path().join("domain"));
    }

    #[test]
    fn unknown_setting_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.json"), r#"{ "forceRenew": true }"#).unwrap();

        assert!(Config::load(dir.path()).is_err());
    }

    #[test]
    fn account_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::load(dir.path()).unwrap();

        config.account_mut().key_id = "https://ca.example/acme/acct/1".to_owned();
        config.account_mut().accepted_terms = "https://ca.example/tos/2".to_owned();
        config.write_account_file().unwrap();

        let reloaded = Config::load(dir.path()).unwrap();
        assert_eq!(reloaded.account(), config.account());
    }

    #[test]
    fn certificate_key_is_generated_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();

        let first = config.read_or_generate_certificate_key().unwrap();
        assert!(config.key_file().exists());

        let second = config.read_or_generate_certificate_key().unwrap();
        assert_eq!(first, second);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt as _;
            let mode = fs::metadata(config.key_file()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn reads_leaf_of_stored_chain() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();

        let not_after = OffsetDateTime::now_utc() + Duration::days(60);
        let chain = vec![
            self_signed("abc123.example", not_after),
            self_signed("intermediate.localcert.test", not_after),
        ];
        config
            .write_certificate_file(cert::encode_pem_chain(&chain).unwrap().as_bytes())
            .unwrap();

        let leaf = config.read_certificate().unwrap().unwrap();
        assert_eq!(leaf.common_name, "abc123.example");
        assert_eq!(leaf.der, chain[0]);
    }

    #[test]
    fn empty_certificate_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        config.write_certificate_file(b"").unwrap();

        assert!(config.read_certificate().is_err());
    }
}
