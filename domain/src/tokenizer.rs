use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use age::secrecy::SecretString;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};
use dashmap::DashMap;
use log::{debug, info};
use rand::Rng;
use tokio::time::Instant;

use events::{Clock, IdGenerator, UuidGenerator};

use crate::session::{SessionError, SessionState};

/// Name of the simple tokenizer backend type.
pub const TOKENIZER_SIMPLE: &str = "simple";

/// Name of the age tokenizer backend type.
pub const TOKENIZER_AGE: &str = "age";

/// Name of the AES tokenizer backend type.
pub const TOKENIZER_AES: &str = "aes";

/// Encodes and decodes session state tokens.
///
/// Decoding is pure with respect to the token bytes: the same token
/// always yields the same state (or the same error).
pub trait SessionTokenizer: Send + Sync {
    /// Returns a tokenized string representing the session state. The
    /// token can be decoded with the same tokenizer implementation.
    fn token_encode(&self, state: &SessionState) -> Result<String, SessionError>;

    /// Decodes the given string token into a valid session state.
    fn token_decode(&self, token: &str) -> Result<SessionState, SessionError>;
}

/// Simple key/value storage mapping random string tokens to session
/// states of users. State lives in process memory only and is lost on
/// restart.
pub struct SessionSimpleTokenizer {
    generator: Arc<dyn IdGenerator>,
    storage: RwLock<HashMap<String, SessionState>>,
}

impl SessionSimpleTokenizer {
    pub fn new() -> Self {
        Self {
            generator: Arc::new(UuidGenerator),
            storage: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for SessionSimpleTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionTokenizer for SessionSimpleTokenizer {
    fn token_encode(&self, state: &SessionState) -> Result<String, SessionError> {
        let mut token = self.generator.generate_id();

        if let Ok(hostname) = std::env::var("HOSTNAME") {
            if !hostname.is_empty() {
                token = format!("{hostname}/{token}");
            }
        }

        self.storage
            .write()
            .unwrap()
            .insert(token.clone(), state.clone());

        Ok(URL_SAFE.encode(token))
    }

    fn token_decode(&self, token: &str) -> Result<SessionState, SessionError> {
        let bytes = URL_SAFE
            .decode(token)
            .map_err(|err| SessionError::Decode(format!("invalid base64 token: {err}")))?;
        let token = String::from_utf8(bytes)
            .map_err(|err| SessionError::Decode(format!("token is not valid utf-8: {err}")))?;

        self.storage
            .read()
            .unwrap()
            .get(&token)
            .cloned()
            .ok_or(SessionError::MissingToken)
    }
}

/// Stateless tokenizer encrypting the JSON session state with an age
/// scrypt passphrase recipient. Tokens survive restarts as long as the
/// secret stays the same. Make sure the secret is long enough and has
/// high entropy.
pub struct SessionAgeTokenizer {
    recipient: age::scrypt::Recipient,
    identity: age::scrypt::Identity,
}

impl SessionAgeTokenizer {
    pub fn new(secret: &str) -> Self {
        Self {
            recipient: age::scrypt::Recipient::new(SecretString::from(secret.to_owned())),
            identity: age::scrypt::Identity::new(SecretString::from(secret.to_owned())),
        }
    }
}

impl SessionTokenizer for SessionAgeTokenizer {
    fn token_encode(&self, state: &SessionState) -> Result<String, SessionError> {
        let json = serde_json::to_vec(state)
            .map_err(|err| SessionError::Encode(format!("failed to encode state as json: {err}")))?;

        let encrypted = age::encrypt(&self.recipient, &json)
            .map_err(|err| SessionError::Encode(format!("failed to encrypt state: {err}")))?;

        Ok(URL_SAFE.encode(encrypted))
    }

    fn token_decode(&self, token: &str) -> Result<SessionState, SessionError> {
        let bytes = URL_SAFE
            .decode(token)
            .map_err(|err| SessionError::Decode(format!("invalid base64 token: {err}")))?;

        let decrypted = age::decrypt(&self.identity, &bytes)
            .map_err(|err| SessionError::Decode(format!("failed to decrypt token: {err}")))?;

        serde_json::from_slice(&decrypted)
            .map_err(|err| SessionError::Decode(format!("failed to decode state json: {err}")))
    }
}

/// Stateless tokenizer using AES in CFB mode with a random per-token
/// initialization vector. The token is `base64(iv):base64(ciphertext)`
/// in url-safe encoding.
#[derive(Debug)]
pub struct SessionAesTokenizer {
    key: Vec<u8>,
}

const AES_BLOCK_SIZE: usize = 16;

impl SessionAesTokenizer {
    /// The secret must be 16, 24 or 32 bytes long, selecting AES-128,
    /// AES-192 or AES-256 respectively.
    pub fn new(secret: &[u8]) -> Result<Self, SessionError> {
        match secret.len() {
            16 | 24 | 32 => Ok(Self {
                key: secret.to_vec(),
            }),
            n => Err(SessionError::InvalidKeyLength(n)),
        }
    }

    fn encrypt(&self, iv: &[u8; AES_BLOCK_SIZE], data: &mut [u8]) -> Result<(), SessionError> {
        let invalid =
            |_| SessionError::Encode("invalid aes cipher key or iv length".to_owned());
        match self.key.len() {
            16 => cfb_mode::Encryptor::<aes::Aes128>::new_from_slices(&self.key, iv)
                .map_err(invalid)?
                .encrypt(data),
            24 => cfb_mode::Encryptor::<aes::Aes192>::new_from_slices(&self.key, iv)
                .map_err(invalid)?
                .encrypt(data),
            _ => cfb_mode::Encryptor::<aes::Aes256>::new_from_slices(&self.key, iv)
                .map_err(invalid)?
                .encrypt(data),
        }
        Ok(())
    }

    fn decrypt(&self, iv: &[u8], data: &mut [u8]) -> Result<(), SessionError> {
        let invalid =
            |_| SessionError::Decode("invalid aes cipher key or iv length".to_owned());
        match self.key.len() {
            16 => cfb_mode::Decryptor::<aes::Aes128>::new_from_slices(&self.key, iv)
                .map_err(invalid)?
                .decrypt(data),
            24 => cfb_mode::Decryptor::<aes::Aes192>::new_from_slices(&self.key, iv)
                .map_err(invalid)?
                .decrypt(data),
            _ => cfb_mode::Decryptor::<aes::Aes256>::new_from_slices(&self.key, iv)
                .map_err(invalid)?
                .decrypt(data),
        }
        Ok(())
    }
}

impl SessionTokenizer for SessionAesTokenizer {
    fn token_encode(&self, state: &SessionState) -> Result<String, SessionError> {
        let mut data = serde_json::to_vec(state)
            .map_err(|err| SessionError::Encode(format!("failed to encode state as json: {err}")))?;

        let mut iv = [0u8; AES_BLOCK_SIZE];
        rand::thread_rng().fill(&mut iv);

        self.encrypt(&iv, &mut data)?;

        Ok(format!("{}:{}", URL_SAFE.encode(iv), URL_SAFE.encode(data)))
    }

    fn token_decode(&self, token: &str) -> Result<SessionState, SessionError> {
        let (iv, ciphertext) = token
            .split_once(':')
            .ok_or_else(|| SessionError::Decode("token is missing iv separator".to_owned()))?;

        let iv = URL_SAFE
            .decode(iv)
            .map_err(|err| SessionError::Decode(format!("invalid base64 iv: {err}")))?;
        let mut data = URL_SAFE
            .decode(ciphertext)
            .map_err(|err| SessionError::Decode(format!("invalid base64 token: {err}")))?;

        self.decrypt(&iv, &mut data)?;

        serde_json::from_slice(&data)
            .map_err(|err| SessionError::Decode(format!("failed to decode state json: {err}")))
    }
}

struct CacheEntry {
    state: SessionState,
    expires_at: Instant,
}

/// Wraps a [`SessionTokenizer`] with a concurrent in-memory cache of
/// successful decodes.
///
/// A cache hit resets the entry's time to live. Entries are purged by
/// a timer task keyed to their insertion; an entry is never served
/// past its TTL, and session states whose own expiration date has
/// passed are rejected and evicted regardless of the TTL.
pub struct SessionTokenizerCache {
    wrapped: Arc<dyn SessionTokenizer>,
    timeout: Duration,
    clock: Arc<dyn Clock>,
    cache: Arc<DashMap<String, CacheEntry>>,
}

impl SessionTokenizerCache {
    pub fn new(
        wrapped: Arc<dyn SessionTokenizer>,
        timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            wrapped,
            timeout,
            clock,
            cache: Arc::new(DashMap::new()),
        }
    }

    /// Fires garbage collection for the token once its TTL elapses.
    /// Cache hits push the deadline forward, in which case the timer
    /// re-arms itself.
    fn spawn_purge_timer(&self, token: String) {
        let cache = Arc::clone(&self.cache);
        tokio::spawn(async move {
            loop {
                let deadline = match cache.get(&token) {
                    Some(entry) => entry.expires_at,
                    None => break,
                };

                tokio::time::sleep_until(deadline).await;

                let now = Instant::now();
                if cache
                    .remove_if(&token, |_, entry| entry.expires_at <= now)
                    .is_some()
                {
                    debug!("Garbage collection of tokenizer cache.");
                    break;
                }

                if !cache.contains_key(&token) {
                    break;
                }
            }
        });
    }
}

impl SessionTokenizer for SessionTokenizerCache {
    fn token_encode(&self, state: &SessionState) -> Result<String, SessionError> {
        self.wrapped.token_encode(state)
    }

    fn token_decode(&self, token: &str) -> Result<SessionState, SessionError> {
        if let Some(mut entry) = self.cache.get_mut(token) {
            if entry.state.expire_at < self.clock.now() {
                drop(entry);
                self.cache.remove(token);
                return Err(SessionError::SessionExpired);
            }

            entry.expires_at = Instant::now() + self.timeout;
            return Ok(entry.state.clone());
        }

        let state = self.wrapped.token_decode(token)?;

        if state.expire_at < self.clock.now() {
            return Err(SessionError::SessionExpired);
        }

        self.cache.insert(
            token.to_owned(),
            CacheEntry {
                state: state.clone(),
                expires_at: Instant::now() + self.timeout,
            },
        );
        self.spawn_purge_timer(token.to_owned());

        Ok(state)
    }
}

/// Builds the session tokenizer backend selected by configuration,
/// always wrapped with the TTL cache.
pub struct SessionTokenizerFactory {
    pub timeout: Duration,
    pub clock: Arc<dyn Clock>,
}

impl SessionTokenizerFactory {
    pub fn tokenizer(
        &self,
        kind: &str,
        secret: &str,
    ) -> Result<Arc<dyn SessionTokenizer>, SessionError> {
        let wrapped: Arc<dyn SessionTokenizer> = match kind {
            TOKENIZER_SIMPLE => {
                info!("Chose simple tokenizer backend.");
                Arc::new(SessionSimpleTokenizer::new())
            }
            TOKENIZER_AGE => {
                info!("Chose age tokenizer backend.");
                Arc::new(SessionAgeTokenizer::new(secret))
            }
            TOKENIZER_AES => {
                info!("Chose AES tokenizer backend.");
                Arc::new(SessionAesTokenizer::new(secret.as_bytes())?)
            }
            _ => return Err(SessionError::InvalidTokenizerType),
        };

        Ok(Arc::new(SessionTokenizerCache::new(
            wrapped,
            self.timeout,
            Arc::clone(&self.clock),
        )))
    }
}
