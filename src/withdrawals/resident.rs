//! Korean resident registration numbers: validation, masking and
//! encryption at rest through the Biz database's pgcrypto helpers.

use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, Statement};

use crate::error::AppError;

const CHECK_WEIGHTS: [u32; 12] = [2, 3, 4, 5, 6, 7, 8, 9, 2, 3, 4, 5];

fn digits_only(number: &str) -> String {
    number.chars().filter(|c| *c != '-').collect()
}

/// Checks length, birth date fields, gender code and the check digit.
pub fn is_valid(number: &str) -> bool {
    let cleaned = digits_only(number.trim());
    if cleaned.len() != 13 {
        return false;
    }
    let Some(digits) = cleaned.chars().map(|c| c.to_digit(10)).collect::<Option<Vec<u32>>>() else {
        return false;
    };

    let month = digits[2] * 10 + digits[3];
    let day = digits[4] * 10 + digits[5];
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return false;
    }
    if !(1..=4).contains(&digits[6]) {
        return false;
    }

    let sum: u32 = digits.iter().zip(CHECK_WEIGHTS).map(|(d, w)| d * w).sum();
    (11 - sum % 11) % 10 == digits[12]
}

/// `9001011234568` -> `900101-1******`. Anything that is not 13 digits is
/// returned as given.
pub fn mask(number: &str) -> String {
    let cleaned = digits_only(number);
    if cleaned.len() != 13 || !cleaned.is_ascii() {
        return number.to_string();
    }
    format!("{}-{}******", &cleaned[..6], &cleaned[6..7])
}

pub async fn encrypt(db: &DatabaseConnection, plaintext: &str, key: &str) -> Result<String, AppError> {
    let row = db
        .query_one(Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT encrypt_text($1, $2) AS encrypted",
            [plaintext.into(), key.into()],
        ))
        .await?
        .ok_or_else(|| AppError::InternalError("주민등록번호 암호화에 실패했습니다.".to_string()))?;

    Ok(row.try_get::<String>("", "encrypted")?)
}

pub async fn decrypt(db: &DatabaseConnection, encrypted: &str, key: &str) -> Result<String, AppError> {
    let row = db
        .query_one(Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT decrypt_text($1, $2) AS decrypted",
            [encrypted.into(), key.into()],
        ))
        .await?
        .ok_or_else(|| AppError::InternalError("주민등록번호 복호화에 실패했습니다.".to_string()))?;

    Ok(row.try_get::<String>("", "decrypted")?)
}

/// Decrypts a stored number for display and masks it. Failures are logged
/// and shown as no number.
pub async fn masked(db: &DatabaseConnection, encrypted: &str, key: &str) -> Option<String> {
    match decrypt(db, encrypted, key).await {
        Ok(plain) => Some(mask(&plain)),
        Err(e) => {
            tracing::warn!("Could not decrypt resident registration number: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use sea_orm::{DatabaseBackend, MockDatabase, Value};

    #[test]
    fn accepts_valid_numbers_with_or_without_dash() {
        assert!(is_valid("900101-1234568"));
        assert!(is_valid("8503152345678"));
    }

    #[test]
    fn rejects_bad_check_digit_and_fields() {
        assert!(!is_valid("900101-1234567"));
        // month 13
        assert!(!is_valid("901301-1234568"));
        // gender 5
        assert!(!is_valid("900101-5234568"));
        assert!(!is_valid("90010112345"));
        assert!(!is_valid("90010a-1234568"));
    }

    #[test]
    fn masks_back_half() {
        assert_eq!(mask("900101-1234568"), "900101-1******");
        assert_eq!(mask("12345"), "12345");
    }

    #[tokio::test]
    async fn encrypt_reads_function_result() {
        let row = BTreeMap::from([("encrypted", Value::from("c2VjcmV0"))]);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[row]])
            .into_connection();

        let out = encrypt(&db, "9001011234568", "k").await.unwrap();
        assert_eq!(out, "c2VjcmV0");
    }

    #[tokio::test]
    async fn masked_decrypts_then_hides_back_half() {
        let row = BTreeMap::from([("decrypted", Value::from("9001011234568"))]);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[row]])
            .into_connection();

        assert_eq!(masked(&db, "c2VjcmV0", "k").await.as_deref(), Some("900101-1******"));
    }

    #[tokio::test]
    async fn masked_is_none_when_decryption_fails() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_errors([sea_orm::DbErr::Custom("wrong key".to_string())])
            .into_connection();

        assert_eq!(masked(&db, "c2VjcmV0", "k").await, None);
    }
}
