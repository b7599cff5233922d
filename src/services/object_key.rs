use crate::services::media::AspectClass;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;
use std::fmt;
use thiserror::Error;

/// Bytes of randomness per key (128 bits).
const TOKEN_BYTES: usize = 16;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("random source unavailable: {0}")]
    Randomness(#[from] rand::Error),
}

/// `<aspect>/<token>.<extension>`, where the token is 128 random bits in
/// unpadded base64url. Uniqueness rests on the randomness alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey(String);

impl ObjectKey {
    pub fn generate(aspect: AspectClass, extension: &str) -> Result<Self, KeyError> {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.try_fill_bytes(&mut bytes)?;
        let token = URL_SAFE_NO_PAD.encode(bytes);
        Ok(Self(format!("{}/{}.{}", aspect, token, extension)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
