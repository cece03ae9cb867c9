use std::path::Path;

use jsonwebtoken::EncodingKey;
use serde_json::{Value, json};

use crate::layout::Layout;
use crate::lms::LmsError;

/// RSA key pair the tool signs with, plus its public JWK.
#[derive(Clone)]
pub struct ToolKeys {
    encoding: EncodingKey,
    kid: String,
    jwk: Value,
}

impl std::fmt::Debug for ToolKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolKeys").field("kid", &self.kid).finish()
    }
}

impl ToolKeys {
    /// Loads `lti_key` (PEM) and `lti_key.json` (JWK) from the keys dir.
    pub fn load(layout: &Layout) -> Result<Self, LmsError> {
        let pem = read(&layout.private_key_path())?;
        let jwk = load_public_jwk(&layout.public_jwk_path())?;
        Self::from_parts(&pem, jwk)
    }

    /// Builds the key pair from PEM bytes and the public JWK, which must
    /// carry a `kid`.
    pub fn from_parts(pem: &[u8], jwk: Value) -> Result<Self, LmsError> {
        let encoding = EncodingKey::from_rsa_pem(pem)
            .map_err(|err| LmsError::Key(err.to_string()))?;
        let kid = jwk
            .get("kid")
            .and_then(Value::as_str)
            .ok_or_else(|| LmsError::Key("public JWK has no `kid`".into()))?
            .to_string();
        Ok(Self { encoding, kid, jwk })
    }

    /// Key id announced in assertion headers.
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Private key for signing.
    pub fn encoding_key(&self) -> &EncodingKey {
        &self.encoding
    }

    /// Public key set (`{"keys": [jwk]}`) served to the LMS.
    pub fn jwks(&self) -> Value {
        json!({ "keys": [self.jwk] })
    }
}

/// Reads only the public JWK, for serving the key set.
pub fn load_public_jwk(path: &Path) -> Result<Value, LmsError> {
    let bytes = read(path)?;
    serde_json::from_slice(&bytes).map_err(|err| LmsError::Key(err.to_string()))
}

fn read(path: &Path) -> Result<Vec<u8>, LmsError> {
    std::fs::read(path).map_err(|source| LmsError::KeyFile {
        path: path.to_path_buf(),
        source,
    })
}
