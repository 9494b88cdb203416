//! ECIES secret delivery over secp256k1.
//!
//! The wire form is fixed by the contract ecosystem: a JSON object
//! `{iv, ephemPublicKey, ciphertext, mac}` with lowercase un-prefixed hex
//! fields, UTF-8 encoded and `0x`-hex wrapped. Key schedule is the
//! classic ECIES construction: ECDH x-coordinate → SHA-512 → AES-256-CBC
//! key ‖ HMAC-SHA256 key, MAC over `iv ‖ ephemPublicKey ‖ ciphertext`.

use {
    crate::Error,
    aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7},
    alloy_primitives::B256,
    hmac::{Hmac, Mac},
    k256::{PublicKey, SecretKey, ecdh, elliptic_curve::sec1::ToEncodedPoint},
    rand::RngCore,
    serde::{Deserialize, Serialize},
    sha2::{Digest, Sha512},
};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<sha2::Sha256>;

/// Field order is part of the wire contract; serde keeps declaration order.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct Envelope {
    iv: String,
    ephem_public_key: String,
    ciphertext: String,
    mac: String,
}

/// Encrypts a 32-byte secret to the recipient's uncompressed public key.
///
/// Returns the `0x`-hex wrapped envelope ready to pass to the contract's
/// `transfer` call.
pub fn encrypt_secret(secret: B256, recipient_public_key: &[u8]) -> Result<String, Error> {
    let recipient = PublicKey::from_sec1_bytes(recipient_public_key)
        .map_err(|err| Error::InvalidPublicKey(err.to_string()))?;

    let ephemeral = SecretKey::random(&mut rand::rngs::OsRng);
    let shared = ecdh::diffie_hellman(ephemeral.to_nonzero_scalar(), recipient.as_affine());
    let kdf = Sha512::digest(shared.raw_secret_bytes());
    let (enc_key, mac_key) = kdf.split_at(32);

    let mut iv = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut iv);

    let cipher = Aes256CbcEnc::new_from_slices(enc_key, &iv)
        .map_err(|err| Error::Encryption(err.to_string()))?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(secret.as_slice());

    let ephem_public_key = ephemeral.public_key().to_encoded_point(false);

    let mut mac = HmacSha256::new_from_slice(mac_key)
        .map_err(|err| Error::Encryption(err.to_string()))?;
    mac.update(&iv);
    mac.update(ephem_public_key.as_bytes());
    mac.update(&ciphertext);
    let tag = mac.finalize().into_bytes();

    let envelope = Envelope {
        iv: hex::encode(iv),
        ephem_public_key: hex::encode(ephem_public_key.as_bytes()),
        ciphertext: hex::encode(&ciphertext),
        mac: hex::encode(tag),
    };
    let json = serde_json::to_string(&envelope)
        .map_err(|err| Error::Encryption(err.to_string()))?;
    Ok(format!("0x{}", hex::encode(json.as_bytes())))
}

/// Attempts to open an envelope with the wallet's private key.
///
/// `None` means "not addressed to this wallet". Malformed hex, bad JSON, a
/// foreign ephemeral key, and a MAC mismatch are deliberately
/// indistinguishable; the scanner treats them all the same way.
pub fn decrypt_secret(payload: &[u8], private_key: B256) -> Option<B256> {
    let json = std::str::from_utf8(payload).ok()?;
    let envelope: Envelope = serde_json::from_str(json).ok()?;

    let iv: [u8; 16] = hex::decode(&envelope.iv).ok()?.try_into().ok()?;
    let ephem_public_key = hex::decode(&envelope.ephem_public_key).ok()?;
    let ciphertext = hex::decode(&envelope.ciphertext).ok()?;
    let tag = hex::decode(&envelope.mac).ok()?;

    let secret_key = SecretKey::from_slice(private_key.as_slice()).ok()?;
    let ephemeral = PublicKey::from_sec1_bytes(&ephem_public_key).ok()?;
    let shared = ecdh::diffie_hellman(secret_key.to_nonzero_scalar(), ephemeral.as_affine());
    let kdf = Sha512::digest(shared.raw_secret_bytes());
    let (enc_key, mac_key) = kdf.split_at(32);

    let mut mac = HmacSha256::new_from_slice(mac_key).ok()?;
    mac.update(&iv);
    mac.update(&ephem_public_key);
    mac.update(&ciphertext);
    mac.verify_slice(&tag).ok()?;

    let cipher = Aes256CbcDec::new_from_slices(enc_key, &iv).ok()?;
    let plaintext = cipher.decrypt_padded_vec_mut::<Pkcs7>(&ciphertext).ok()?;
    (plaintext.len() == 32).then(|| B256::from_slice(&plaintext))
}

/// Unwraps the outer `0x`-hex layer of an envelope string.
pub fn unwrap_payload(envelope_hex: &str) -> Option<Vec<u8>> {
    hex::decode(envelope_hex.strip_prefix("0x")?).ok()
}
