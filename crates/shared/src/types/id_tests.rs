use super::*;
use std::str::FromStr;
use uuid::Uuid;

#[test]
fn test_typed_id_creation() {
    let id = UserId::new();
    assert!(!id.to_string().is_empty());
    assert!(!id.is_nil());
}

#[test]
fn test_typed_id_from_uuid() {
    let uuid = Uuid::new_v4();
    let id = AccountId::from_uuid(uuid);
    assert_eq!(id.into_inner(), uuid);
}

#[test]
fn test_typed_id_display_is_simple_hex() {
    let uuid = Uuid::parse_str("0191b3c4-9a1e-7c4d-8e2f-1234567890ab").unwrap();
    let id = AccountId::from_uuid(uuid);
    assert_eq!(id.to_string(), "0191b3c49a1e7c4d8e2f1234567890ab");
}

#[test]
fn test_typed_id_from_str_accepts_both_forms() {
    let uuid = Uuid::new_v4();
    let hyphenated = TransactionId::from_str(&uuid.to_string()).unwrap();
    let simple = TransactionId::from_str(&uuid.simple().to_string()).unwrap();
    assert_eq!(hyphenated, simple);
}

#[test]
fn test_typed_id_from_str_error() {
    assert!(OrganizationId::from_str("invalid").is_err());
}

#[test]
fn test_typed_id_ordering_follows_uuid() {
    let low = PriceId::from_uuid(Uuid::from_u128(1));
    let high = PriceId::from_uuid(Uuid::from_u128(2));
    assert!(low < high);
}

#[test]
fn test_nil_id() {
    assert!(AccountId::from_uuid(Uuid::nil()).is_nil());
}
