//! Request signing for the portal's day-rotating encryption scheme.
//!
//! The backend rotates its AES key daily by deriving it from the current
//! date: a 7-character date sequence is sandwiched between the fixed prefix
//! `qa8y` and suffix `ty1pn`, giving a 16-byte AES-128-CBC key. The IV is
//! fixed. Signed request bodies are `base64(AES-CBC(JSON))`; every request
//! additionally carries a freshly generated encrypted `LocalName` token.
//!
//! All of this must stay byte-exact: the backend derives the same sequence
//! independently and rejects anything else.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{Datelike, Local, NaiveDate};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;

use crate::error::{PortalError, Result};

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

const KEY_PREFIX: &[u8; 4] = b"qa8y";
const KEY_SUFFIX: &[u8; 5] = b"ty1pn";
const IV: &[u8; 16] = b"dcek9wb8frty1pnm";

/// The date the key rotation is currently based on (local time).
pub(crate) fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Produces the 7-character date sequence in the interleave order
/// d1,m1,y1,weekday,d2,m2,y2 with zero-padded day/month/two-digit-year and a
/// Sunday=0 weekday digit, matching `Date.prototype.getDay` in the portal's
/// own frontend.
pub(crate) fn date_seq(date: NaiveDate) -> [u8; 7] {
    let day = [b'0' + (date.day() / 10) as u8, b'0' + (date.day() % 10) as u8];
    let month = [
        b'0' + (date.month() / 10) as u8,
        b'0' + (date.month() % 10) as u8,
    ];
    let year = date.year().rem_euclid(100) as u32;
    let year = [b'0' + (year / 10) as u8, b'0' + (year % 10) as u8];
    let weekday = b'0' + date.weekday().num_days_from_sunday() as u8;

    [
        day[0], month[0], year[0], weekday, day[1], month[1], year[1],
    ]
}

/// Builds the 16-byte AES key for the given date. Idempotent per date.
pub(crate) fn derive_key(date: NaiveDate) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..4].copy_from_slice(KEY_PREFIX);
    key[4..11].copy_from_slice(&date_seq(date));
    key[11..].copy_from_slice(KEY_SUFFIX);
    key
}

/// AES-128-CBC/PKCS7 encryption under the date-derived key and fixed IV.
pub(crate) fn encrypt(date: NaiveDate, plaintext: &[u8]) -> Vec<u8> {
    let key = derive_key(date);
    Aes128CbcEnc::new(&key.into(), IV.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/// Decryption counterpart, used for round-trip verification.
pub(crate) fn decrypt(date: NaiveDate, ciphertext: &[u8]) -> Result<Vec<u8>> {
    let key = derive_key(date);
    Aes128CbcDec::new(&key.into(), IV.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|e| PortalError::crypto(format!("invalid padding: {e}")))
}

/// Canonical signed POST body: JSON-encode, encrypt, base64.
pub(crate) fn serialize_payload<T: Serialize>(date: NaiveDate, payload: &T) -> Result<String> {
    let json = serde_json::to_vec(payload)
        .map_err(|e| PortalError::crypto(format!("payload not serializable: {e}")))?;
    Ok(STANDARD.encode(encrypt(date, &json)))
}

/// Fresh `LocalName` header value: random 4 chars + date sequence + random
/// 5 chars (16 bytes total), encrypted and base64-encoded. Generated anew for
/// every request, never cached.
pub(crate) fn local_name(date: NaiveDate) -> String {
    let mut rng = rand::thread_rng();
    let mut plain = Vec::with_capacity(16);
    plain.extend((&mut rng).sample_iter(&Alphanumeric).take(4));
    plain.extend_from_slice(&date_seq(date));
    plain.extend((&mut rng).sample_iter(&Alphanumeric).take(5));
    STANDARD.encode(encrypt(date, &plain))
}
