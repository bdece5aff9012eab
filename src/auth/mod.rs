use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;

use crate::crypto::{derive_database_key, open_sealed, random_bytes, seal, KdfParams};
use crate::error::StoreError;

const KEY_FILE_NAME: &str = "store.key.json";
const KEYCHECK_PLAINTEXT: &[u8] = b"msgstore.keycheck.v1";
const KEYCHECK_AAD: &[u8] = b"store.key.json:keycheck";

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
struct KeyFile {
    version: u32,
    salt_b64: String,
    keycheck_b64: String,
    kdf_params: KdfParams,
}

pub fn key_file_path(dir: &Path) -> PathBuf {
    dir.join(KEY_FILE_NAME)
}

pub fn is_initialized(dir: &Path) -> bool {
    key_file_path(dir).exists()
}

fn decode_b64(value: &str, what: &str) -> Result<Vec<u8>> {
    B64.decode(value).map_err(|_| anyhow!("invalid key file {what}"))
}

fn create_key_file(dir: &Path, passphrase: &str, kdf_params: KdfParams) -> Result<[u8; 32]> {
    fs::create_dir_all(dir)?;

    let salt = random_bytes::<16>();
    let key = derive_database_key(passphrase, &salt, &kdf_params)?;
    let keycheck = seal(&key, KEYCHECK_PLAINTEXT, KEYCHECK_AAD)?;

    let file = KeyFile {
        version: 1,
        salt_b64: B64.encode(salt),
        keycheck_b64: B64.encode(keycheck),
        kdf_params,
    };
    fs::write(key_file_path(dir), serde_json::to_vec_pretty(&file)?)?;
    tracing::info!(dir = %dir.display(), "created store key file");
    Ok(key)
}

fn unlock_key_file(dir: &Path, passphrase: &str) -> Result<[u8; 32]> {
    let bytes = fs::read(key_file_path(dir))?;
    let file: KeyFile = serde_json::from_slice(&bytes)?;

    let salt = decode_b64(&file.salt_b64, "salt")?;
    if salt.len() != 16 {
        return Err(anyhow!("invalid key file salt length"));
    }
    let keycheck = decode_b64(&file.keycheck_b64, "keycheck")?;

    let key = derive_database_key(passphrase, &salt, &file.kdf_params)?;
    match open_sealed(&key, &keycheck, KEYCHECK_AAD) {
        Ok(plaintext) if plaintext == KEYCHECK_PLAINTEXT => Ok(key),
        _ => Err(StoreError::InvalidKey.into()),
    }
}

/// Derives the database key for `dir`, creating the key file on first use.
///
/// A passphrase that does not match an existing key file fails with
/// [`StoreError::InvalidKey`].
pub fn unlock_or_create(dir: &Path, passphrase: &str, kdf_params: &KdfParams) -> Result<[u8; 32]> {
    if passphrase.is_empty() {
        return Err(anyhow!("database key is required"));
    }
    if is_initialized(dir) {
        unlock_key_file(dir, passphrase)
    } else {
        create_key_file(dir, passphrase, kdf_params.clone())
    }
}

pub fn remove_key_file(dir: &Path) -> Result<()> {
    match fs::remove_file(key_file_path(dir)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlock_returns_same_key_and_rejects_wrong_passphrase() {
        let temp_dir = tempfile::tempdir().expect("tempdir");
        let dir = temp_dir.path().join("store");

        assert!(!is_initialized(&dir));
        let key = unlock_or_create(&dir, "pw", &KdfParams::for_test()).expect("create");
        assert!(is_initialized(&dir));

        let again = unlock_or_create(&dir, "pw", &KdfParams::for_test()).expect("unlock");
        assert_eq!(key, again);

        let err = unlock_or_create(&dir, "nope", &KdfParams::for_test()).expect_err("wrong");
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::InvalidKey)
        ));

        remove_key_file(&dir).expect("remove");
        assert!(!is_initialized(&dir));
        remove_key_file(&dir).expect("remove twice");
    }

    #[test]
    fn empty_passphrase_is_rejected() {
        let temp_dir = tempfile::tempdir().expect("tempdir");
        assert!(unlock_or_create(temp_dir.path(), "", &KdfParams::for_test()).is_err());
    }
}
