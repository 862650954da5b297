#![forbid(unsafe_code)]

//! BER parsing of PKCS#12 (PFX) structures (RFC 7292).
//!
//! `yasna::parse_ber` is used throughout since PKCS#12 files produced by
//! Windows and Java tooling are BER, not strict DER.

use crate::kdf::{self, KdfHash};
use crate::pbe::{AesKeySize, EncryptionAlgorithm, LegacyCipher, Prf};
use crate::{CertBag, KeyBag, Pkcs12Contents};
use nfeouro_core::Error;
use yasna::models::ObjectIdentifier;
use yasna::{ASN1Error, ASN1ErrorKind, BERReader, BERReaderSeq, Tag};

// ── OID constants ──────────────────────────────────────────────────────────

const OID_DATA: &[u64] = &[1, 2, 840, 113549, 1, 7, 1];
const OID_ENCRYPTED_DATA: &[u64] = &[1, 2, 840, 113549, 1, 7, 6];

const OID_KEY_BAG: &[u64] = &[1, 2, 840, 113549, 1, 12, 10, 1, 1];
const OID_PKCS8_SHROUDED_KEY_BAG: &[u64] = &[1, 2, 840, 113549, 1, 12, 10, 1, 2];
const OID_CERT_BAG: &[u64] = &[1, 2, 840, 113549, 1, 12, 10, 1, 3];
const OID_X509_CERTIFICATE: &[u64] = &[1, 2, 840, 113549, 1, 9, 22, 1];
const OID_LOCAL_KEY_ID: &[u64] = &[1, 2, 840, 113549, 1, 9, 21];

const OID_PBE_SHA1_RC2_128: &[u64] = &[1, 2, 840, 113549, 1, 12, 1, 5];
const OID_PBE_SHA1_RC2_40: &[u64] = &[1, 2, 840, 113549, 1, 12, 1, 6];
const OID_PBE_SHA1_3DES: &[u64] = &[1, 2, 840, 113549, 1, 12, 1, 3];
const OID_PBES2: &[u64] = &[1, 2, 840, 113549, 1, 5, 13];
const OID_PBKDF2: &[u64] = &[1, 2, 840, 113549, 1, 5, 12];

const OID_AES_128_CBC: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 1, 2];
const OID_AES_192_CBC: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 1, 22];
const OID_AES_256_CBC: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 1, 42];

const OID_SHA1: &[u64] = &[1, 3, 14, 3, 2, 26];
const OID_SHA256: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 2, 1];
const OID_HMAC_SHA1: &[u64] = &[1, 2, 840, 113549, 2, 7];
const OID_HMAC_SHA256: &[u64] = &[1, 2, 840, 113549, 2, 9];

fn oid(components: &[u64]) -> ObjectIdentifier {
    ObjectIdentifier::from_slice(components)
}

fn invalid() -> ASN1Error {
    ASN1Error::new(ASN1ErrorKind::Invalid)
}

// ── Parsed structures ──────────────────────────────────────────────────────

struct MacData {
    hash: KdfHash,
    digest: Vec<u8>,
    salt: Vec<u8>,
    iterations: u32,
}

enum ContentInfo {
    Data(Vec<u8>),
    Encrypted {
        algorithm: EncryptionAlgorithm,
        ciphertext: Vec<u8>,
    },
}

enum SafeBag {
    Key {
        pkcs8_der: Vec<u8>,
        local_key_id: Option<Vec<u8>>,
    },
    ShroudedKey {
        algorithm: EncryptionAlgorithm,
        ciphertext: Vec<u8>,
        local_key_id: Option<Vec<u8>>,
    },
    Cert {
        der: Vec<u8>,
        local_key_id: Option<Vec<u8>>,
    },
    Other,
}

// ── Top-level parser ───────────────────────────────────────────────────────

pub fn parse_pfx(data: &[u8], password: &str) -> Result<Pkcs12Contents, Error> {
    let (auth_safe, mac) = yasna::parse_ber(data, |r| {
        r.read_sequence(|r| {
            if r.next().read_u32()? != 3 {
                return Err(invalid());
            }
            let auth_safe = parse_data_content_info(r.next())?;
            let mac = r.read_optional(parse_mac_data)?;
            Ok((auth_safe, mac))
        })
    })
    .map_err(|e| Error::Credential(format!("malformed PKCS#12 container: {e}")))?;

    match &mac {
        Some(mac) => kdf::verify_mac(
            mac.hash,
            password,
            &mac.salt,
            mac.iterations,
            &auth_safe,
            &mac.digest,
        )?,
        None => tracing::debug!("PKCS#12 container carries no MAC"),
    }

    let content_infos =
        yasna::parse_ber(&auth_safe, |r| r.collect_sequence_of(parse_content_info))
            .map_err(|e| Error::Credential(format!("malformed authSafe: {e}")))?;

    let mut contents = Pkcs12Contents::default();
    for content_info in content_infos {
        let bags_der = match content_info {
            ContentInfo::Data(data) => data,
            ContentInfo::Encrypted {
                algorithm,
                ciphertext,
            } => algorithm.decrypt(&ciphertext, password)?,
        };

        let bags = yasna::parse_ber(&bags_der, |r| r.collect_sequence_of(parse_safe_bag))
            .map_err(|e| Error::Credential(format!("malformed SafeContents: {e}")))?;

        for bag in bags {
            match bag {
                SafeBag::Key {
                    pkcs8_der,
                    local_key_id,
                } => contents.keys.push(KeyBag {
                    pkcs8_der,
                    local_key_id,
                }),
                SafeBag::ShroudedKey {
                    algorithm,
                    ciphertext,
                    local_key_id,
                } => contents.keys.push(KeyBag {
                    pkcs8_der: algorithm.decrypt(&ciphertext, password)?,
                    local_key_id,
                }),
                SafeBag::Cert { der, local_key_id } => {
                    contents.certificates.push(CertBag { der, local_key_id })
                }
                SafeBag::Other => {}
            }
        }
    }

    tracing::debug!(
        keys = contents.keys.len(),
        certificates = contents.certificates.len(),
        "PKCS#12 bags decoded"
    );
    Ok(contents)
}

// ── ContentInfo parsing ────────────────────────────────────────────────────

/// The outer authSafe ContentInfo: content type `data`, OCTET STRING payload.
fn parse_data_content_info(r: BERReader) -> Result<Vec<u8>, ASN1Error> {
    r.read_sequence(|r| {
        if r.next().read_oid()? != oid(OID_DATA) {
            return Err(invalid());
        }
        r.next().read_tagged(Tag::context(0), |r| r.read_bytes())
    })
}

fn parse_content_info(r: BERReader) -> Result<ContentInfo, ASN1Error> {
    r.read_sequence(|r| {
        let content_type = r.next().read_oid()?;
        if content_type == oid(OID_DATA) {
            let data = r.next().read_tagged(Tag::context(0), |r| r.read_bytes())?;
            return Ok(ContentInfo::Data(data));
        }
        if content_type != oid(OID_ENCRYPTED_DATA) {
            return Err(invalid());
        }
        // [0] EXPLICIT EncryptedData { version, EncryptedContentInfo }
        r.next().read_tagged(Tag::context(0), |r| {
            r.read_sequence(|r| {
                let _version = r.next().read_u32()?;
                r.next().read_sequence(|r| {
                    let _content_type = r.next().read_oid()?;
                    let algorithm = parse_encryption_algorithm(r.next())?;
                    let ciphertext = r
                        .next()
                        .read_tagged_implicit(Tag::context(0), |r| r.read_bytes())?;
                    Ok(ContentInfo::Encrypted {
                        algorithm,
                        ciphertext,
                    })
                })
            })
        })
    })
}

// ── SafeBag parsing ────────────────────────────────────────────────────────

fn parse_safe_bag(r: BERReader) -> Result<SafeBag, ASN1Error> {
    r.read_sequence(|r| {
        let bag_type = r.next().read_oid()?;

        let bag = if bag_type == oid(OID_KEY_BAG) {
            let pkcs8_der = r.next().read_tagged(Tag::context(0), |r| r.read_der())?;
            SafeBag::Key {
                pkcs8_der,
                local_key_id: parse_local_key_id(r)?,
            }
        } else if bag_type == oid(OID_PKCS8_SHROUDED_KEY_BAG) {
            // [0] EXPLICIT EncryptedPrivateKeyInfo
            let (algorithm, ciphertext) = r.next().read_tagged(Tag::context(0), |r| {
                r.read_sequence(|r| {
                    let algorithm = parse_encryption_algorithm(r.next())?;
                    let ciphertext = r.next().read_bytes()?;
                    Ok((algorithm, ciphertext))
                })
            })?;
            SafeBag::ShroudedKey {
                algorithm,
                ciphertext,
                local_key_id: parse_local_key_id(r)?,
            }
        } else if bag_type == oid(OID_CERT_BAG) {
            let der = r.next().read_tagged(Tag::context(0), |r| {
                r.read_sequence(|r| {
                    if r.next().read_oid()? != oid(OID_X509_CERTIFICATE) {
                        return Err(invalid());
                    }
                    r.next().read_tagged(Tag::context(0), |r| r.read_bytes())
                })
            })?;
            SafeBag::Cert {
                der,
                local_key_id: parse_local_key_id(r)?,
            }
        } else {
            let _value = r.next().read_tagged(Tag::context(0), |r| r.read_der())?;
            let _attrs = parse_local_key_id(r)?;
            SafeBag::Other
        };
        Ok(bag)
    })
}

/// Read the optional bag attribute set, keeping only `localKeyId`.
fn parse_local_key_id(r: &mut BERReaderSeq) -> Result<Option<Vec<u8>>, ASN1Error> {
    let found = r.read_optional(|r| {
        let mut local_key_id = None;
        r.read_set_of(|r| {
            r.read_sequence(|r| {
                let attr_type = r.next().read_oid()?;
                let mut values = Vec::new();
                r.next().read_set_of(|r| {
                    values.push(r.read_der()?);
                    Ok(())
                })?;
                if attr_type == oid(OID_LOCAL_KEY_ID) {
                    if let Some(first) = values.first() {
                        local_key_id = Some(yasna::parse_ber(first, |r| r.read_bytes())?);
                    }
                }
                Ok(())
            })
        })?;
        Ok(local_key_id)
    })?;
    Ok(found.flatten())
}

// ── AlgorithmIdentifier parsing ────────────────────────────────────────────

fn parse_encryption_algorithm(r: BERReader) -> Result<EncryptionAlgorithm, ASN1Error> {
    r.read_sequence(|r| {
        let alg = r.next().read_oid()?;

        let legacy = if alg == oid(OID_PBE_SHA1_3DES) {
            Some(LegacyCipher::TripleDes)
        } else if alg == oid(OID_PBE_SHA1_RC2_128) {
            Some(LegacyCipher::Rc2_128)
        } else if alg == oid(OID_PBE_SHA1_RC2_40) {
            Some(LegacyCipher::Rc2_40)
        } else {
            None
        };

        if let Some(cipher) = legacy {
            // pkcs-12PbeParams: SEQUENCE { salt, iterations }
            return r.next().read_sequence(|r| {
                let salt = r.next().read_bytes()?;
                let iterations = r.next().read_u32()?;
                Ok(EncryptionAlgorithm::Legacy {
                    cipher,
                    salt,
                    iterations,
                })
            });
        }

        if alg != oid(OID_PBES2) {
            return Err(invalid());
        }

        // PBES2-params: SEQUENCE { keyDerivationFunc, encryptionScheme }
        r.next().read_sequence(|r| {
            let (salt, iterations, prf) = r.next().read_sequence(|r| {
                if r.next().read_oid()? != oid(OID_PBKDF2) {
                    return Err(invalid());
                }
                r.next().read_sequence(parse_pbkdf2_params)
            })?;

            let (aes, iv) = r.next().read_sequence(|r| {
                let scheme = r.next().read_oid()?;
                let aes = if scheme == oid(OID_AES_128_CBC) {
                    AesKeySize::Aes128
                } else if scheme == oid(OID_AES_192_CBC) {
                    AesKeySize::Aes192
                } else if scheme == oid(OID_AES_256_CBC) {
                    AesKeySize::Aes256
                } else {
                    return Err(invalid());
                };
                Ok((aes, r.next().read_bytes()?))
            })?;

            Ok(EncryptionAlgorithm::Pbes2 {
                salt,
                iterations,
                prf,
                aes,
                iv,
            })
        })
    })
}

/// PBKDF2-params: SEQUENCE { salt, iterationCount, keyLength OPTIONAL, prf DEFAULT hmacWithSHA1 }
fn parse_pbkdf2_params(r: &mut BERReaderSeq) -> Result<(Vec<u8>, u32, Prf), ASN1Error> {
    let salt = r.next().read_bytes()?;
    let iterations = r.next().read_u32()?;

    let mut prf = Prf::HmacSha1;
    // keyLength is an INTEGER (0x02), prf an AlgorithmIdentifier SEQUENCE (0x30).
    for _ in 0..2 {
        match r.read_optional(|r| r.read_der())? {
            Some(der) if der.first() == Some(&0x30) => prf = parse_prf(&der)?,
            Some(_) => {}
            None => break,
        }
    }
    Ok((salt, iterations, prf))
}

fn parse_prf(der: &[u8]) -> Result<Prf, ASN1Error> {
    yasna::parse_der(der, |r| {
        r.read_sequence(|r| {
            let prf = r.next().read_oid()?;
            let _params = r.read_optional(|r| r.read_null())?;
            if prf == oid(OID_HMAC_SHA256) {
                Ok(Prf::HmacSha256)
            } else if prf == oid(OID_HMAC_SHA1) {
                Ok(Prf::HmacSha1)
            } else {
                Err(invalid())
            }
        })
    })
}

// ── MacData ────────────────────────────────────────────────────────────────

fn parse_mac_data(r: BERReader) -> Result<MacData, ASN1Error> {
    r.read_sequence(|r| {
        // DigestInfo: SEQUENCE { digestAlgorithm, digest }
        let (hash, digest) = r.next().read_sequence(|r| {
            let hash = r.next().read_sequence(|r| {
                let alg = r.next().read_oid()?;
                let _params = r.read_optional(|r| r.read_null())?;
                if alg == oid(OID_SHA256) {
                    Ok(KdfHash::Sha256)
                } else if alg == oid(OID_SHA1) {
                    Ok(KdfHash::Sha1)
                } else {
                    Err(invalid())
                }
            })?;
            Ok((hash, r.next().read_bytes()?))
        })?;
        let salt = r.next().read_bytes()?;
        let iterations = r.read_optional(|r| r.read_u32())?.unwrap_or(1);
        Ok(MacData {
            hash,
            digest,
            salt,
            iterations,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_is_credential_error() {
        let err = parse_pfx(b"not a pfx", "senha1").unwrap_err();
        assert!(matches!(err, Error::Credential(_)));
    }

    #[test]
    fn test_pbkdf2_params_with_key_length_and_prf() {
        let der = yasna::construct_der(|w| {
            w.write_sequence(|w| {
                w.next().write_bytes(b"salt");
                w.next().write_u32(2048);
                w.next().write_u32(32);
                w.next().write_sequence(|w| {
                    w.next().write_oid(&oid(OID_HMAC_SHA256));
                    w.next().write_null();
                });
            })
        });
        let (salt, iterations, prf) =
            yasna::parse_der(&der, |r| r.read_sequence(parse_pbkdf2_params)).unwrap();
        assert_eq!(salt, b"salt");
        assert_eq!(iterations, 2048);
        assert_eq!(prf, Prf::HmacSha256);
    }

    #[test]
    fn test_pbkdf2_params_default_prf() {
        let der = yasna::construct_der(|w| {
            w.write_sequence(|w| {
                w.next().write_bytes(b"salt");
                w.next().write_u32(1);
            })
        });
        let (_, _, prf) =
            yasna::parse_der(&der, |r| r.read_sequence(parse_pbkdf2_params)).unwrap();
        assert_eq!(prf, Prf::HmacSha1);
    }
}
