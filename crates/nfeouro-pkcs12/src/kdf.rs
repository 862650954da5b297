#![forbid(unsafe_code)]

//! PKCS#12 key derivation (RFC 7292 Appendix B) and the integrity MAC.

use digest::Digest;
use hmac::{Hmac, Mac};
use nfeouro_core::Error;

/// Diversifier values of the PKCS#12 KDF (RFC 7292 B.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Purpose {
    Key = 1,
    Iv = 2,
    Mac = 3,
}

/// Hash behind the PKCS#12 KDF and the container MAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KdfHash {
    Sha1,
    Sha256,
}

impl KdfHash {
    pub fn output_len(&self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
        }
    }
}

// Both SHA-1 and SHA-256 have a 64-byte input block.
const BLOCK_LEN: usize = 64;

/// Derive `len` bytes from a BMP-encoded password.
pub fn derive(
    hash: KdfHash,
    purpose: Purpose,
    bmp_password: &[u8],
    salt: &[u8],
    iterations: u32,
    len: usize,
) -> Vec<u8> {
    match hash {
        KdfHash::Sha1 => derive_with::<sha1::Sha1>(purpose, bmp_password, salt, iterations, len),
        KdfHash::Sha256 => {
            derive_with::<sha2::Sha256>(purpose, bmp_password, salt, iterations, len)
        }
    }
}

fn derive_with<D: Digest>(
    purpose: Purpose,
    bmp_password: &[u8],
    salt: &[u8],
    iterations: u32,
    len: usize,
) -> Vec<u8> {
    let diversifier = [purpose as u8; BLOCK_LEN];

    // I = S || P, each stretched to a multiple of the block length.
    let mut input = repeat_to_block_multiple(salt);
    input.extend(repeat_to_block_multiple(bmp_password));

    let mut out = Vec::with_capacity(len + <D as Digest>::output_size());
    while out.len() < len {
        let mut a = D::new()
            .chain_update(diversifier)
            .chain_update(&input)
            .finalize();
        for _ in 1..iterations {
            a = D::digest(&a);
        }
        out.extend_from_slice(&a);

        if out.len() < len {
            let b = repeat_to_block_multiple(&a);
            for chunk in input.chunks_mut(BLOCK_LEN) {
                add_with_carry(chunk, &b);
            }
        }
    }
    out.truncate(len);
    out
}

/// Repeat `data` until it fills a whole number of blocks; empty stays empty.
fn repeat_to_block_multiple(data: &[u8]) -> Vec<u8> {
    if data.is_empty() {
        return Vec::new();
    }
    let len = data.len().div_ceil(BLOCK_LEN) * BLOCK_LEN;
    data.iter().copied().cycle().take(len).collect()
}

/// `chunk = (chunk + b + 1) mod 2^(8 * BLOCK_LEN)`, big-endian.
fn add_with_carry(chunk: &mut [u8], b: &[u8]) {
    let mut carry = 1u16;
    for (x, y) in chunk.iter_mut().zip(b).rev() {
        let sum = u16::from(*x) + u16::from(*y) + carry;
        *x = sum as u8;
        carry = sum >> 8;
    }
}

/// Encode a passphrase as a NUL-terminated UTF-16BE string.
pub fn bmp_password(password: &str) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }
    password
        .encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(u16::to_be_bytes)
        .collect()
}

/// Check the container MAC over the authSafe content.
pub fn verify_mac(
    hash: KdfHash,
    password: &str,
    salt: &[u8],
    iterations: u32,
    data: &[u8],
    expected: &[u8],
) -> Result<(), Error> {
    let key = derive(
        hash,
        Purpose::Mac,
        &bmp_password(password),
        salt,
        iterations,
        hash.output_len(),
    );
    let ok = match hash {
        KdfHash::Sha1 => hmac_matches::<Hmac<sha1::Sha1>>(&key, data, expected),
        KdfHash::Sha256 => hmac_matches::<Hmac<sha2::Sha256>>(&key, data, expected),
    }?;
    if !ok {
        return Err(Error::Credential(
            "PKCS#12 MAC verification failed (wrong passphrase?)".into(),
        ));
    }
    Ok(())
}

fn hmac_matches<M: Mac + hmac::digest::KeyInit>(
    key: &[u8],
    data: &[u8],
    expected: &[u8],
) -> Result<bool, Error> {
    let mut mac = <M as Mac>::new_from_slice(key)
        .map_err(|e| Error::Credential(format!("PKCS#12 MAC key: {e}")))?;
    mac.update(data);
    Ok(mac.verify_slice(expected).is_ok())
}
