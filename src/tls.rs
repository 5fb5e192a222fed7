//! TLS key material.
//!
//! PEM files are read and validated up front, when the server starts. Any
//! problem (missing file, no certificate, no private key, key not matching
//! the certificate) is an [`Error::Tls`] returned from
//! [`Server::serve`](crate::Server::serve) before the port is bound.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::ServerConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::TlsAcceptor;

use crate::error::Error;

/// Paths to a PEM private key and certificate chain.
#[derive(Clone, Debug)]
pub struct TlsConfig {
    key: PathBuf,
    cert: PathBuf,
}

impl TlsConfig {
    pub fn from_pem_files(key: impl Into<PathBuf>, cert: impl Into<PathBuf>) -> Self {
        Self { key: key.into(), cert: cert.into() }
    }

    /// Loads both files and builds the acceptor used for every connection.
    pub(crate) fn acceptor(&self) -> Result<TlsAcceptor, Error> {
        let certs = load_certs(&self.cert)?;
        let key = load_key(&self.key)?;

        let mut config = ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .map_err(|e| Error::Tls(e.to_string()))?
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .map_err(|e| Error::Tls(format!("key does not match certificate: {e}")))?;
        config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

        Ok(TlsAcceptor::from(Arc::new(config)))
    }
}

fn read(path: &Path) -> Result<Vec<u8>, Error> {
    std::fs::read(path).map_err(|e| Error::Tls(format!("reading `{}`: {e}", path.display())))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, Error> {
    let pem = read(path)?;
    let certs = rustls_pemfile::certs(&mut pem.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| Error::Tls(format!("parsing `{}`: {e}", path.display())))?;
    if certs.is_empty() {
        return Err(Error::Tls(format!("no certificates found in `{}`", path.display())));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, Error> {
    let pem = read(path)?;
    rustls_pemfile::private_key(&mut pem.as_slice())
        .map_err(|e| Error::Tls(format!("parsing `{}`: {e}", path.display())))?
        .ok_or_else(|| Error::Tls(format!("no private key found in `{}`", path.display())))
}
