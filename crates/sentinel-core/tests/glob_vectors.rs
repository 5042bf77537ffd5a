//! Wildcard matcher vector tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use sentinel_core::error::ClientCode;
use sentinel_core::Glob;


#[test]
fn glob_vectors() {
    let v = vector_loader::load_glob("glob_cases.json");
    assert!(!v.cases.is_empty(), "{}", v.description);

    for case in v.cases {
        let glob = Glob::new(&case.pattern).expect("pattern must compile");
        assert_eq!(
            glob.matches(&case.text),
            case.expect,
            "pattern={:?} text={:?}",
            case.pattern,
            case.text
        );
    }
}

#[test]
fn empty_pattern_rejected() {
    let err = Glob::new("").expect_err("must fail");
    assert_eq!(err.client_code(), ClientCode::InvalidPolicy);
}

#[test]
fn serde_uses_plain_string() {
    let glob: Glob = serde_json::from_str("\"delete_*\"").unwrap();
    assert!(!glob.is_literal());
    assert!(glob.matches("delete_dir"));
    assert_eq!(serde_json::to_string(&glob).unwrap(), "\"delete_*\"");

    let bad: Result<Glob, _> = serde_json::from_str("\"\"");
    assert!(bad.is_err());
}
