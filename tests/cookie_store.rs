use std::path::Path;

use aes::Aes128;
use cbc::cipher::{block_padding::Pkcs7, BlockEncryptMut, KeyIvInit};
use cookieferry::error::CookieFerryError;
use cookieferry::store::decrypt::CookieDecryptor;
use cookieferry::store::epoch::to_store_epoch_micros;
use cookieferry::store::{CookieStoreReader, SqliteCookieRepository};
use pbkdf2::pbkdf2_hmac;
use rusqlite::Connection;
use sha1::Sha1;
use tempfile::tempdir;

const PASSPHRASE: &[u8] = b"fixture-passphrase";
const NOW: i64 = 1_700_000_000;

/// Encrypt a cookie value the way the browser stores it: PBKDF2-derived
/// AES-128 key, CBC with the fixed space IV, 32-byte digest prefix, `v10`
/// marker.
fn encrypt_value(plaintext: &[u8]) -> Vec<u8> {
    let mut key = [0u8; 16];
    pbkdf2_hmac::<Sha1>(PASSPHRASE, b"saltysalt", 1003, &mut key);

    let mut message = vec![0xCDu8; 32];
    message.extend_from_slice(plaintext);
    let message_len = message.len();
    message.resize(message_len + 16, 0);

    let cipher = cbc::Encryptor::<Aes128>::new_from_slices(&key, b"                ")
        .expect("cipher");
    let ciphertext = cipher
        .encrypt_padded_mut::<Pkcs7>(&mut message, message_len)
        .expect("encrypt");

    let mut blob = b"v10".to_vec();
    blob.extend_from_slice(ciphertext);
    blob
}

fn create_store(path: &Path) -> Connection {
    let conn = Connection::open(path).expect("open store");
    conn.execute(
        "CREATE TABLE cookies (
            creation_utc INTEGER,
            host_key TEXT,
            top_frame_site_key TEXT,
            name TEXT,
            value TEXT,
            encrypted_value BLOB,
            path TEXT,
            expires_utc INTEGER,
            is_secure INTEGER,
            is_httponly INTEGER,
            last_access_utc INTEGER,
            has_expires INTEGER,
            is_persistent INTEGER,
            priority INTEGER,
            samesite INTEGER,
            source_scheme INTEGER,
            source_port INTEGER,
            last_update_utc INTEGER,
            source_type INTEGER,
            has_cross_site_ancestor INTEGER
        )",
        [],
    )
    .expect("create cookies table");
    conn
}

#[allow(clippy::too_many_arguments)]
fn insert_cookie(
    conn: &Connection,
    host_key: &str,
    name: &str,
    value: &str,
    encrypted_value: &[u8],
    expires_utc: i64,
    is_persistent: i64,
    samesite: i64,
) {
    conn.execute(
        "INSERT INTO cookies (
            creation_utc, host_key, top_frame_site_key, name, value, encrypted_value,
            path, expires_utc, is_secure, is_httponly, last_access_utc, has_expires,
            is_persistent, priority, samesite, source_scheme, source_port,
            last_update_utc, source_type, has_cross_site_ancestor
        ) VALUES (?1, ?2, '', ?3, ?4, ?5, '/', ?6, 1, 1, ?1, 1, ?7, 1, ?8, 2, 443, ?1, 0, 0)",
        rusqlite::params![
            to_store_epoch_micros(NOW - 60),
            host_key,
            name,
            value,
            encrypted_value,
            expires_utc,
            is_persistent,
            samesite,
        ],
    )
    .expect("insert cookie");
}

fn reader_for(path: &Path) -> CookieStoreReader<SqliteCookieRepository> {
    CookieStoreReader::new(
        SqliteCookieRepository::open(path).expect("repository"),
        CookieDecryptor::from_passphrase(PASSPHRASE),
    )
}

#[test]
fn reads_and_decrypts_a_parent_domain_cookie() {
    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("Cookies");
    let conn = create_store(&db_path);
    insert_cookie(
        &conn,
        ".example.com",
        "session",
        "",
        &encrypt_value(b"decrypted-session-token"),
        to_store_epoch_micros(NOW + 3600),
        1,
        1,
    );
    drop(conn);

    let cookies = reader_for(&db_path)
        .read_cookies("app.example.com", NOW)
        .expect("cookies");

    assert_eq!(cookies.len(), 1);
    let cookie = &cookies[0];
    assert_eq!(cookie.domain, ".example.com");
    assert_eq!(cookie.name, "session");
    assert_eq!(cookie.value, "decrypted-session-token");
    assert!(!cookie.host_only);
    assert!(!cookie.session);
    assert_eq!(cookie.expiration_date, Some((NOW + 3600) as f64));
    assert_eq!(cookie.store_id, "0");
}

#[test]
fn keeps_legacy_plaintext_rows_verbatim() {
    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("Cookies");
    let conn = create_store(&db_path);
    insert_cookie(
        &conn,
        "login.example.com",
        "legacy",
        "plain-value",
        &[],
        to_store_epoch_micros(NOW + 3600),
        0,
        0,
    );
    drop(conn);

    let cookies = reader_for(&db_path)
        .read_cookies("example.com", NOW)
        .expect("cookies");

    assert_eq!(cookies[0].value, "plain-value");
    assert!(cookies[0].host_only);
    assert!(cookies[0].session);
}

#[test]
fn empty_store_fails_the_precondition() {
    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("Cookies");
    drop(create_store(&db_path));

    let err = reader_for(&db_path)
        .read_cookies("example.com", NOW)
        .expect_err("no cookies");
    assert!(matches!(err, CookieFerryError::StoreEmpty(_)));
}

#[test]
fn expired_rows_alone_fail_the_precondition() {
    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("Cookies");
    let conn = create_store(&db_path);
    insert_cookie(
        &conn,
        ".example.com",
        "stale",
        "old",
        &[],
        to_store_epoch_micros(NOW - 3600),
        1,
        1,
    );
    drop(conn);

    let err = reader_for(&db_path)
        .read_cookies("example.com", NOW)
        .expect_err("expired only");
    assert!(matches!(err, CookieFerryError::StoreEmpty(_)));
}

#[test]
fn rows_for_other_hosts_never_leak_into_the_result() {
    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("Cookies");
    let conn = create_store(&db_path);
    insert_cookie(
        &conn,
        ".example.com",
        "mine",
        "keep",
        &[],
        to_store_epoch_micros(NOW + 3600),
        1,
        1,
    );
    insert_cookie(
        &conn,
        ".other.org",
        "theirs",
        "drop",
        &[],
        to_store_epoch_micros(NOW + 3600),
        1,
        1,
    );
    drop(conn);

    let cookies = reader_for(&db_path)
        .read_cookies("example.com", NOW)
        .expect("cookies");
    assert_eq!(cookies.len(), 1);
    assert_eq!(cookies[0].name, "mine");
}
