//! Typed ID definitions for operator objects.

use crate::define_id;

define_id!(ObjectUid, "uid");

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_object_uid_roundtrip() {
        let id = ObjectUid::new();
        let s = id.to_string();
        let parsed: ObjectUid = s.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_object_uid_prefix() {
        let id = ObjectUid::new();
        assert!(id.to_string().starts_with("uid_"));
    }

    #[test]
    fn test_object_uid_invalid_prefix() {
        let result: Result<ObjectUid, _> = "app_01HV4Z2WQXKJNM8GPQY6VBKC3D".parse();
        assert!(matches!(
            result.unwrap_err(),
            crate::IdError::InvalidPrefix { .. }
        ));
    }

    #[test]
    fn test_object_uid_missing_separator() {
        let result: Result<ObjectUid, _> = "uid01HV4Z2WQXKJNM8GPQY6VBKC3D".parse();
        assert!(matches!(
            result.unwrap_err(),
            crate::IdError::MissingSeparator
        ));
    }

    #[test]
    fn test_object_uid_empty() {
        let result: Result<ObjectUid, _> = "".parse();
        assert!(matches!(result.unwrap_err(), crate::IdError::Empty));
    }

    #[test]
    fn test_object_uid_invalid_ulid() {
        let result: Result<ObjectUid, _> = "uid_not-a-ulid".parse();
        assert!(matches!(
            result.unwrap_err(),
            crate::IdError::InvalidUlid(_)
        ));
    }

    #[test]
    fn test_object_uid_json_roundtrip() {
        let id = ObjectUid::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let parsed: ObjectUid = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    proptest! {
        #[test]
        fn prop_uid_from_any_ulid_parses_back(hi in any::<u64>(), lo in any::<u64>()) {
            let ulid = crate::Ulid::from((hi, lo));
            let id = ObjectUid::from_ulid(ulid);
            let parsed = ObjectUid::parse(&id.to_string()).unwrap();
            prop_assert_eq!(parsed.ulid(), ulid);
        }
    }
}
