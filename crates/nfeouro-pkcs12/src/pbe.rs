#![forbid(unsafe_code)]

//! Password-based decryption of PKCS#12 bags.
//!
//! Legacy PKCS#12 PBE (3DES, RC2-128, RC2-40) keys and IVs come from the
//! PKCS#12 KDF over the BMP passphrase. PBES2 uses PBKDF2 over the UTF-8
//! passphrase with an AES-CBC scheme.

use crate::kdf::{self, KdfHash, Purpose};
use cipher::{block_padding::Pkcs7, BlockDecryptMut, InnerIvInit, KeyIvInit};
use nfeouro_core::Error;

/// Ciphers of the `pbeWithSHAAnd*` family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyCipher {
    TripleDes,
    Rc2_128,
    Rc2_40,
}

impl LegacyCipher {
    fn key_len(&self) -> usize {
        match self {
            Self::TripleDes => 24,
            Self::Rc2_128 => 16,
            Self::Rc2_40 => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prf {
    HmacSha1,
    HmacSha256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AesKeySize {
    Aes128,
    Aes192,
    Aes256,
}

impl AesKeySize {
    fn key_len(&self) -> usize {
        match self {
            Self::Aes128 => 16,
            Self::Aes192 => 24,
            Self::Aes256 => 32,
        }
    }
}

/// Encryption algorithm of an encrypted bag or encrypted content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncryptionAlgorithm {
    Legacy {
        cipher: LegacyCipher,
        salt: Vec<u8>,
        iterations: u32,
    },
    Pbes2 {
        salt: Vec<u8>,
        iterations: u32,
        prf: Prf,
        aes: AesKeySize,
        iv: Vec<u8>,
    },
}

impl EncryptionAlgorithm {
    pub fn decrypt(&self, ciphertext: &[u8], password: &str) -> Result<Vec<u8>, Error> {
        match self {
            Self::Legacy {
                cipher,
                salt,
                iterations,
            } => decrypt_legacy(*cipher, ciphertext, password, salt, *iterations),
            Self::Pbes2 {
                salt,
                iterations,
                prf,
                aes,
                iv,
            } => decrypt_pbes2(ciphertext, password, salt, *iterations, *prf, *aes, iv),
        }
    }
}

fn decrypt_legacy(
    cipher: LegacyCipher,
    ciphertext: &[u8],
    password: &str,
    salt: &[u8],
    iterations: u32,
) -> Result<Vec<u8>, Error> {
    let bmp = kdf::bmp_password(password);
    let key = kdf::derive(KdfHash::Sha1, Purpose::Key, &bmp, salt, iterations, cipher.key_len());
    let iv = kdf::derive(KdfHash::Sha1, Purpose::Iv, &bmp, salt, iterations, 8);

    match cipher {
        LegacyCipher::TripleDes => {
            let dec = cbc::Decryptor::<des::TdesEde3>::new_from_slices(&key, &iv)
                .map_err(|e| Error::Credential(format!("3DES-CBC init failed: {e}")))?;
            unpad(dec, ciphertext, "3DES-CBC")
        }
        LegacyCipher::Rc2_128 | LegacyCipher::Rc2_40 => {
            let effective_bits = cipher.key_len() * 8;
            let rc2 = rc2::Rc2::new_with_eff_key_len(&key, effective_bits);
            let dec = cbc::Decryptor::<rc2::Rc2>::inner_iv_slice_init(rc2, &iv)
                .map_err(|e| Error::Credential(format!("RC2-CBC init failed: {e}")))?;
            unpad(dec, ciphertext, "RC2-CBC")
        }
    }
}

fn decrypt_pbes2(
    ciphertext: &[u8],
    password: &str,
    salt: &[u8],
    iterations: u32,
    prf: Prf,
    aes: AesKeySize,
    iv: &[u8],
) -> Result<Vec<u8>, Error> {
    let mut key = vec![0u8; aes.key_len()];
    match prf {
        Prf::HmacSha1 => {
            pbkdf2::pbkdf2_hmac::<sha1::Sha1>(password.as_bytes(), salt, iterations, &mut key)
        }
        Prf::HmacSha256 => {
            pbkdf2::pbkdf2_hmac::<sha2::Sha256>(password.as_bytes(), salt, iterations, &mut key)
        }
    }

    let init_err = |e: cipher::InvalidLength| Error::Credential(format!("AES-CBC init failed: {e}"));
    match aes {
        AesKeySize::Aes128 => unpad(
            cbc::Decryptor::<aes::Aes128>::new_from_slices(&key, iv).map_err(init_err)?,
            ciphertext,
            "AES-128-CBC",
        ),
        AesKeySize::Aes192 => unpad(
            cbc::Decryptor::<aes::Aes192>::new_from_slices(&key, iv).map_err(init_err)?,
            ciphertext,
            "AES-192-CBC",
        ),
        AesKeySize::Aes256 => unpad(
            cbc::Decryptor::<aes::Aes256>::new_from_slices(&key, iv).map_err(init_err)?,
            ciphertext,
            "AES-256-CBC",
        ),
    }
}

// A padding failure is what a wrong passphrase looks like when there is no MAC.
fn unpad<D: BlockDecryptMut>(decryptor: D, ciphertext: &[u8], name: &str) -> Result<Vec<u8>, Error> {
    decryptor
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| Error::Credential(format!("{name} decryption failed (wrong passphrase?)")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cipher::{BlockEncryptMut, KeyIvInit};

    #[test]
    fn test_pbes2_aes256_round_trip() {
        let salt = b"0123456789abcdef";
        let iv = [7u8; 16];
        let mut key = [0u8; 32];
        pbkdf2::pbkdf2_hmac::<sha2::Sha256>(b"senha1", salt, 1000, &mut key);
        let ciphertext = cbc::Encryptor::<aes::Aes256>::new_from_slices(&key, &iv)
            .unwrap()
            .encrypt_padded_vec_mut::<Pkcs7>(b"private key info");

        let alg = EncryptionAlgorithm::Pbes2 {
            salt: salt.to_vec(),
            iterations: 1000,
            prf: Prf::HmacSha256,
            aes: AesKeySize::Aes256,
            iv: iv.to_vec(),
        };
        assert_eq!(alg.decrypt(&ciphertext, "senha1").unwrap(), b"private key info");
    }

    #[test]
    fn test_legacy_3des_round_trip() {
        let salt = b"saltsalt";
        let bmp = kdf::bmp_password("senha1");
        let key = kdf::derive(KdfHash::Sha1, Purpose::Key, &bmp, salt, 2048, 24);
        let iv = kdf::derive(KdfHash::Sha1, Purpose::Iv, &bmp, salt, 2048, 8);
        let ciphertext = cbc::Encryptor::<des::TdesEde3>::new_from_slices(&key, &iv)
            .unwrap()
            .encrypt_padded_vec_mut::<Pkcs7>(b"certificate bag");

        let alg = EncryptionAlgorithm::Legacy {
            cipher: LegacyCipher::TripleDes,
            salt: salt.to_vec(),
            iterations: 2048,
        };
        assert_eq!(alg.decrypt(&ciphertext, "senha1").unwrap(), b"certificate bag");
    }

    #[test]
    fn test_bad_ciphertext_is_credential_error() {
        let alg = EncryptionAlgorithm::Legacy {
            cipher: LegacyCipher::Rc2_40,
            salt: b"saltsalt".to_vec(),
            iterations: 1,
        };
        // Not a whole number of blocks.
        let err = alg.decrypt(&[1, 2, 3], "senha1").unwrap_err();
        assert!(matches!(err, Error::Credential(_)));
    }
}
