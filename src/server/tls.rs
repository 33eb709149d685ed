use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

use crate::errors::BridgeError;

/// Build an acceptor from PEM-encoded certificate chain and key files.
pub fn acceptor(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor, BridgeError> {
    let certs = load_certs(cert_path)?;
    let key = load_key(key_path)?;

    let mut config = ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| BridgeError::Tls(e.to_string()))?
    .with_no_client_auth()
    .with_single_cert(certs, key)
    .map_err(|e| BridgeError::Tls(format!("invalid certificate or key: {}", e)))?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn open(path: &Path) -> Result<BufReader<File>, BridgeError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| BridgeError::Tls(format!("opening {}: {}", path.display(), e)))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, BridgeError> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| BridgeError::Tls(format!("parsing {}: {}", path.display(), e)))?;
    if certs.is_empty() {
        return Err(BridgeError::Tls(format!(
            "no certificate found in {}",
            path.display()
        )));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, BridgeError> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| BridgeError::Tls(format!("parsing {}: {}", path.display(), e)))?
        .ok_or_else(|| BridgeError::Tls(format!("no private key found in {}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_files_are_tls_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = acceptor(&dir.path().join("server.pem"), &dir.path().join("server.key"))
            .err()
            .unwrap();
        assert!(matches!(err, BridgeError::Tls(ref m) if m.contains("server.pem")));
    }

    #[test]
    fn pem_without_certificate_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("server.pem");
        std::fs::write(&cert, "not a pem file\n").unwrap();
        let err = load_certs(&cert).unwrap_err();
        assert!(matches!(err, BridgeError::Tls(ref m) if m.contains("no certificate")));
    }
}
