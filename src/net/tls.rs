//! TLS configuration and certificate loading for the HTTPS listener.

use std::path::{Path, PathBuf};

use axum_server::tls_rustls::RustlsConfig;
use thiserror::Error;

use crate::config::HttpsListenerConfig;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("{kind} file not found: {path:?}")]
    Missing { kind: &'static str, path: PathBuf },

    #[error("failed to load certificate: {0}")]
    Load(#[from] std::io::Error),
}

/// Load the listener's PEM certificate chain and private key.
pub async fn load_tls_config(config: &HttpsListenerConfig) -> Result<RustlsConfig, TlsError> {
    let cert_path = Path::new(&config.cert_path);
    let key_path = Path::new(&config.key_path);

    if !cert_path.exists() {
        return Err(TlsError::Missing {
            kind: "certificate",
            path: cert_path.to_path_buf(),
        });
    }
    if !key_path.exists() {
        return Err(TlsError::Missing {
            kind: "private key",
            path: key_path.to_path_buf(),
        });
    }

    Ok(RustlsConfig::from_pem_file(cert_path, key_path).await?)
}
