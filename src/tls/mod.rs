//! TLS support for `wss://` connections (rustls).

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, ServerName};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};

use crate::error::{Error, Result};

/// Client configuration trusting the webpki root certificates.
#[must_use]
pub fn client_config_with_native_roots() -> Arc<ClientConfig> {
    let root_store = RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Arc::new(config)
}

/// Client configuration trusting only the certificates in a PEM file.
///
/// # Errors
///
/// Returns `Error::Tls` if the file cannot be read, holds no certificates, or
/// a certificate is rejected by the root store.
pub fn client_config_with_ca_file(path: &Path) -> Result<Arc<ClientConfig>> {
    let mut root_store = RootCertStore::empty();
    for cert in load_certs_from_file(path)? {
        root_store
            .add(cert)
            .map_err(|e| Error::Tls(format!("invalid CA certificate: {}", e)))?;
    }

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Ok(Arc::new(config))
}

/// Load all PEM certificates from `path`.
///
/// # Errors
///
/// Returns `Error::Tls` if the file cannot be read or contains no certificates.
pub fn load_certs_from_file(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path)
        .map_err(|e| Error::Tls(format!("{}: {}", path.display(), e)))?;
    let mut reader = BufReader::new(file);

    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Tls(format!("{}: {}", path.display(), e)))?;

    if certs.is_empty() {
        return Err(Error::Tls(format!(
            "no certificates found in {}",
            path.display()
        )));
    }

    Ok(certs)
}

/// Run the TLS client handshake over an established TCP stream.
///
/// # Errors
///
/// Returns `Error::Tls` for an invalid server name or a failed TLS handshake.
pub async fn connect(
    config: Arc<ClientConfig>,
    server_name: &str,
    stream: TcpStream,
) -> Result<TlsStream<TcpStream>> {
    let name = ServerName::try_from(server_name.to_string())
        .map_err(|_| Error::Tls(format!("invalid DNS name: {}", server_name)))?;

    tokio_rustls::TlsConnector::from(config)
        .connect(name, stream)
        .await
        .map_err(|e| Error::Tls(e.to_string()))
}
