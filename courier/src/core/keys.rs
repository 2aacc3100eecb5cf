//! secp256k1 ("K1") keys in the chain's string formats, and canonical signing.

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow, bail};
use k256::ecdsa::signature::hazmat::{PrehashSigner, RandomizedPrehashSigner};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

const WIF_VERSION: u8 = 0x80;
const K1_SUFFIX: &[u8] = b"K1";
/// The deterministic nonce is tried first; random nonces cover the rare
/// non-canonical result.
const MAX_SIGN_ATTEMPTS: usize = 64;

/// A K1 signing key parsed from legacy WIF or `PVT_K1_` form.
#[derive(Clone)]
pub struct PrivateKey {
    signing: SigningKey,
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("public_key", &self.public_key().to_string())
            .finish()
    }
}

impl FromStr for PrivateKey {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let secret = match raw.strip_prefix("PVT_K1_") {
            Some(body) => decode_k1_checked(body).context("decode PVT_K1 private key")?,
            None => decode_wif(raw).context("decode WIF private key")?,
        };
        let signing =
            SigningKey::from_slice(&secret).map_err(|_| anyhow!("invalid secp256k1 scalar"))?;
        Ok(Self { signing })
    }
}

impl PrivateKey {
    pub fn public_key(&self) -> PublicKey {
        PublicKey(*self.signing.verifying_key())
    }

    /// Sign a 32-byte digest and render it as `SIG_K1_...`.
    ///
    /// Only canonical signatures (r and s both encode without a leading
    /// sign bit or redundant zero) are returned.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Result<String> {
        let mut rng = OsRng;
        for attempt in 0..MAX_SIGN_ATTEMPTS {
            let signature: Signature = if attempt == 0 {
                self.signing.sign_prehash(digest)
            } else {
                self.signing.sign_prehash_with_rng(&mut rng, digest)
            }
            .context("sign digest")?;
            let signature = signature.normalize_s().unwrap_or(signature);
            let rs = signature.to_bytes();
            if !is_canonical(&rs) {
                continue;
            }
            let recovery_id = RecoveryId::trial_recovery_from_prehash(
                self.signing.verifying_key(),
                digest,
                &signature,
            )
            .context("derive recovery id")?;
            let mut data = Vec::with_capacity(65);
            data.push(recovery_id.to_byte() + 27 + 4);
            data.extend_from_slice(&rs);
            return Ok(format!("SIG_K1_{}", encode_k1_checked(&data)));
        }
        bail!("no canonical signature after {MAX_SIGN_ATTEMPTS} attempts")
    }
}

/// Compressed public key; displays in legacy `EOS...` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let point = k256::PublicKey::from(&self.0).to_encoded_point(true);
        let compressed = point.as_bytes();
        let checksum = Ripemd160::digest(compressed);
        let mut data = compressed.to_vec();
        data.extend_from_slice(&checksum[..4]);
        write!(f, "EOS{}", bs58::encode(data).into_string())
    }
}

/// Recover the public key that produced a `SIG_K1_` signature over `digest`.
pub fn recover_public_key(signature: &str, digest: &[u8; 32]) -> Result<PublicKey> {
    let body = signature
        .strip_prefix("SIG_K1_")
        .ok_or_else(|| anyhow!("signature must start with SIG_K1_"))?;
    let data = decode_k1_checked(body).context("decode signature")?;
    if data.len() != 65 {
        bail!("signature data must be 65 bytes, got {}", data.len());
    }
    let rs = Signature::from_slice(&data[1..]).context("parse signature")?;
    let recovery_id = data[0]
        .checked_sub(31)
        .and_then(RecoveryId::from_byte)
        .ok_or_else(|| anyhow!("invalid recovery header {}", data[0]))?;
    let key = VerifyingKey::recover_from_prehash(digest, &rs, recovery_id)
        .context("recover public key")?;
    Ok(PublicKey(key))
}

fn is_canonical(rs: &[u8]) -> bool {
    let r = &rs[..32];
    let s = &rs[32..];
    r[0] & 0x80 == 0
        && !(r[0] == 0 && r[1] & 0x80 == 0)
        && s[0] & 0x80 == 0
        && !(s[0] == 0 && s[1] & 0x80 == 0)
}

fn decode_wif(raw: &str) -> Result<Vec<u8>> {
    let bytes = bs58::decode(raw).into_vec().context("base58")?;
    if bytes.len() != 37 || bytes[0] != WIF_VERSION {
        bail!("expected 37-byte WIF with version 0x80");
    }
    let (payload, checksum) = bytes.split_at(33);
    let expected = Sha256::digest(Sha256::digest(payload));
    if checksum != &expected[..4] {
        bail!("WIF checksum mismatch");
    }
    Ok(payload[1..].to_vec())
}

fn decode_k1_checked(body: &str) -> Result<Vec<u8>> {
    let bytes = bs58::decode(body).into_vec().context("base58")?;
    if bytes.len() < 5 {
        bail!("key data too short");
    }
    let (payload, checksum) = bytes.split_at(bytes.len() - 4);
    if checksum != &k1_checksum(payload)[..] {
        bail!("K1 checksum mismatch");
    }
    Ok(payload.to_vec())
}

fn encode_k1_checked(payload: &[u8]) -> String {
    let mut data = payload.to_vec();
    data.extend_from_slice(&k1_checksum(payload));
    bs58::encode(data).into_string()
}

fn k1_checksum(payload: &[u8]) -> [u8; 4] {
    let mut hasher = Ripemd160::new();
    hasher.update(payload);
    hasher.update(K1_SUFFIX);
    let digest = hasher.finalize();
    [digest[0], digest[1], digest[2], digest[3]]
}
