//! RSA key handling for the legacy protocol.
//!
//! The legacy frame is a single RSA block, so the server key must have a
//! 2048-bit modulus (256 bytes). Keys are stored as PKCS#8 PEM in a key
//! directory and generated on first start when missing.

use crate::core::legacy::LEGACY_FRAME_SIZE;
use crate::error::{BoxError, ProtocolError, Result};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// Modulus size for generated keys
pub const KEY_BITS: usize = 2048;

/// File name of the private key inside the key directory
pub const PRIVATE_KEY_FILE: &str = "private.pem";

/// File name of the public key inside the key directory
pub const PUBLIC_KEY_FILE: &str = "public.pem";

/// Supplies the private-key operation used to open legacy frames
pub trait KeyProvider: Send + Sync {
    /// Decrypt one legacy block, returning the plaintext
    fn decrypt(&self, block: &[u8]) -> std::result::Result<Vec<u8>, BoxError>;
}

/// RSA key pair backed provider using PKCS#1 v1.5 padding
pub struct RsaKeyProvider {
    private_key: RsaPrivateKey,
}

impl RsaKeyProvider {
    /// Wrap an existing private key; rejects keys whose block size is not 256 bytes
    pub fn new(private_key: RsaPrivateKey) -> Result<Self> {
        if private_key.size() != LEGACY_FRAME_SIZE {
            return Err(ProtocolError::KeyError(format!(
                "RSA key must be {} bits, got {}",
                LEGACY_FRAME_SIZE * 8,
                private_key.size() * 8
            )));
        }
        Ok(Self { private_key })
    }

    /// Generate a fresh 2048-bit key pair
    pub fn generate() -> Result<Self> {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, KEY_BITS)
            .map_err(|e| ProtocolError::KeyError(format!("Failed to generate key pair: {e}")))?;
        Self::new(private_key)
    }

    /// Parse a PKCS#8 (`BEGIN PRIVATE KEY`) or PKCS#1 (`BEGIN RSA PRIVATE KEY`) PEM
    pub fn from_pem(pem: &str) -> Result<Self> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| ProtocolError::KeyError(format!("Failed to parse private key: {e}")))?;
        Self::new(private_key)
    }

    pub fn from_pem_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let pem = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ProtocolError::KeyError(format!(
                "Failed to read key file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_pem(&pem)
    }

    /// Load `private.pem` from `dir`, or generate a key pair and write both
    /// `private.pem` and `public.pem` there.
    #[instrument(skip(dir), fields(directory = %dir.as_ref().display()))]
    pub fn load_or_generate<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let private_path = dir.as_ref().join(PRIVATE_KEY_FILE);
        if private_path.exists() {
            info!(path = %private_path.display(), "Loading RSA key pair");
            return Self::from_pem_file(&private_path);
        }

        info!("No RSA key pair found, generating a new one");
        let provider = Self::generate()?;
        provider.save(dir.as_ref())?;
        Ok(provider)
    }

    /// Write the key pair as PEM files into `dir`, creating it if needed
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| {
            ProtocolError::KeyError(format!(
                "Failed to create key directory {}: {e}",
                dir.display()
            ))
        })?;

        let private_pem = self
            .private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| ProtocolError::KeyError(format!("Failed to encode private key: {e}")))?;
        std::fs::write(dir.join(PRIVATE_KEY_FILE), private_pem.as_bytes())
            .map_err(|e| ProtocolError::KeyError(format!("Failed to write private key: {e}")))?;

        let public_path = dir.join(PUBLIC_KEY_FILE);
        std::fs::write(&public_path, self.public_key_pem()?)
            .map_err(|e| ProtocolError::KeyError(format!("Failed to write public key: {e}")))?;

        Ok(public_path)
    }

    pub fn public_key(&self) -> RsaPublicKey {
        self.private_key.to_public_key()
    }

    /// SubjectPublicKeyInfo PEM, the form server lists ask for
    pub fn public_key_pem(&self) -> Result<String> {
        self.public_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| ProtocolError::KeyError(format!("Failed to encode public key: {e}")))
    }
}

impl KeyProvider for RsaKeyProvider {
    fn decrypt(&self, block: &[u8]) -> std::result::Result<Vec<u8>, BoxError> {
        self.private_key
            .decrypt(Pkcs1v15Encrypt, block)
            .map_err(|e| Box::new(e) as BoxError)
    }
}
