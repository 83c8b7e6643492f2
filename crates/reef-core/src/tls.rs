//! TLS support using rustls
//!
//! Certificate chain and private key are loaded from PEM files. The
//! listener speaks HTTP/1.1 only, so ALPN advertises `http/1.1`.

use crate::{Error, Result};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;

/// Build the rustls server config for a certificate and key pair
pub fn server_config(cert_path: &Path, key_path: &Path) -> Result<Arc<rustls::ServerConfig>> {
    let certs = load_certs(cert_path)?;
    let key = load_private_key(key_path)?;

    let mut config = rustls::ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| Error::Tls(e.to_string()))?
    .with_no_client_auth()
    .with_single_cert(certs, key)
    .map_err(|e| Error::Tls(e.to_string()))?;

    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}

/// Acceptor that performs the TLS handshake on accepted streams
pub fn acceptor(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor> {
    let config = server_config(cert_path, key_path)?;
    tracing::debug!(cert = %cert_path.display(), "TLS configured");
    Ok(TlsAcceptor::from(config))
}

/// Load certificates from PEM file
pub fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path)
        .map_err(|e| Error::Tls(format!("Failed to open cert file {}: {}", path.display(), e)))?;
    let mut reader = BufReader::new(file);

    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Tls(format!("Failed to parse certs: {}", e)))?;

    if certs.is_empty() {
        return Err(Error::Tls("No certificates found in file".to_string()));
    }

    Ok(certs)
}

/// Load private key from PEM file
pub fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let file = File::open(path)
        .map_err(|e| Error::Tls(format!("Failed to open key file {}: {}", path.display(), e)))?;
    let mut reader = BufReader::new(file);

    loop {
        match rustls_pemfile::read_one(&mut reader)
            .map_err(|e| Error::Tls(format!("Failed to parse key: {}", e)))?
        {
            Some(rustls_pemfile::Item::Pkcs1Key(key)) => return Ok(PrivateKeyDer::Pkcs1(key)),
            Some(rustls_pemfile::Item::Pkcs8Key(key)) => return Ok(PrivateKeyDer::Pkcs8(key)),
            Some(rustls_pemfile::Item::Sec1Key(key)) => return Ok(PrivateKeyDer::Sec1(key)),
            None => break,
            _ => continue,
        }
    }

    Err(Error::Tls("No private key found in file".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("reef-tls-{}-{}", std::process::id(), name));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_missing_cert_file() {
        let err = load_certs(Path::new("/nonexistent/reef/cert.pem")).unwrap_err();
        assert!(matches!(err, Error::Tls(msg) if msg.contains("Failed to open cert file")));
    }

    #[test]
    fn test_empty_pem_files() {
        let path = temp_file("empty.pem", "not a pem file\n");

        let err = load_certs(&path).unwrap_err();
        assert!(matches!(err, Error::Tls(msg) if msg.contains("No certificates")));

        let err = load_private_key(&path).unwrap_err();
        assert!(matches!(err, Error::Tls(msg) if msg.contains("No private key")));

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_acceptor_requires_valid_files() {
        let missing = Path::new("/nonexistent/reef/cert.pem");
        assert!(matches!(acceptor(missing, missing), Err(Error::Tls(_))));
    }
}
