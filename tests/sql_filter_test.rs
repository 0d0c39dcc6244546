//! Integration tests for the read-only SQL filter.
//!
//! Fixed cases pin the documented behaviour; randomized cases check that the
//! filter's properties hold for generated statements.

use rand::Rng;
use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;
use select_mcp_server::error::GatewayError;
use select_mcp_server::tools::sql_validator::{FORBIDDEN_TOKENS, normalize, validate_select};

fn random_word(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Random casing of an ASCII string.
fn random_case(s: &str) -> String {
    let mut rng = rand::thread_rng();
    s.chars()
        .map(|c| {
            if rng.gen_bool(0.5) {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            }
        })
        .collect()
}

/// A SELECT with space-separated alphanumeric words and no forbidden token.
fn random_select() -> String {
    let mut rng = rand::thread_rng();
    let words: Vec<String> = (0..rng.gen_range(1..8))
        .map(|_| {
            let len = rng.gen_range(1..12);
            random_word(len)
        })
        .filter(|w| {
            let padded = format!(" {} ", w.to_lowercase());
            !FORBIDDEN_TOKENS.contains(&padded.as_str())
        })
        .collect();
    format!("{} {}", random_case("select"), words.join(" "))
}

fn is_security(result: &Result<(), GatewayError>, message: &str) -> bool {
    matches!(result, Err(GatewayError::Security { message: m }) if m == message)
}

// ==================== Fixed cases ====================

#[test]
fn test_delete_statement_rejected() {
    let result = validate_select("DELETE FROM t");
    assert!(is_security(&result, "Only SELECT is allowed"), "{:?}", result);
}

#[test]
fn test_addresses_not_mistaken_for_delete() {
    assert!(validate_select("select * from addresses").is_ok());
}

#[test]
fn test_chained_statement_rejected() {
    let result = validate_select("select * from t; drop table t");
    assert!(is_security(&result, "Forbidden token detected"), "{:?}", result);
}

#[test]
fn test_missing_sql_is_invalid_argument() {
    assert!(matches!(
        validate_select("  "),
        Err(GatewayError::InvalidArgument { .. })
    ));
}

#[test]
fn test_other_read_statements_rejected() {
    for sql in [
        "SHOW TABLES",
        "EXPLAIN SELECT 1",
        "VALUES (1)",
        "PRAGMA table_info(t)",
        "with t as (select 1) select * from t",
    ] {
        let result = validate_select(sql);
        assert!(is_security(&result, "Only SELECT is allowed"), "{}", sql);
    }
}

// ==================== Randomized properties ====================

#[test]
fn fuzz_generated_selects_are_accepted() {
    for _ in 0..500 {
        let sql = random_select();
        assert!(validate_select(&sql).is_ok(), "Expected '{}' to pass", sql);
    }
}

#[test]
fn fuzz_surrounding_whitespace_is_ignored() {
    let mut rng = rand::thread_rng();
    let pads = [" ", "\t", "\n", "\r\n", "  \t "];
    for _ in 0..200 {
        let sql = format!(
            "{}{}{}",
            pads.choose(&mut rng).unwrap(),
            random_select(),
            pads.choose(&mut rng).unwrap()
        );
        assert!(validate_select(&sql).is_ok(), "Expected {:?} to pass", sql);
    }
}

#[test]
fn fuzz_non_select_prefix_rejected() {
    let mut rng = rand::thread_rng();
    for _ in 0..500 {
        let len = rng.gen_range(1..20);
        let sql = random_word(len);
        let result = validate_select(&sql);
        if normalize(&sql).starts_with("select") {
            continue;
        }
        assert!(
            is_security(&result, "Only SELECT is allowed"),
            "'{}' gave {:?}",
            sql,
            result
        );
    }
}

#[test]
fn fuzz_padded_forbidden_token_rejected() {
    let mut rng = rand::thread_rng();
    for _ in 0..500 {
        let token = FORBIDDEN_TOKENS.choose(&mut rng).unwrap();
        let sql = format!(
            "{}{}{}",
            random_select(),
            random_case(token),
            random_word(rng.gen_range(1..10))
        );
        let result = validate_select(&sql);
        assert!(
            is_security(&result, "Forbidden token detected"),
            "'{}' gave {:?}",
            sql,
            result
        );
    }
}

#[test]
fn fuzz_semicolon_anywhere_rejected() {
    let mut rng = rand::thread_rng();
    for _ in 0..500 {
        let base = random_select();
        // Insert after the "select" prefix so the prefix check still passes
        let at = rng.gen_range(6..=base.len());
        let sql = format!("{};{}", &base[..at], &base[at..]);
        let result = validate_select(&sql);
        assert!(
            is_security(&result, "Forbidden token detected"),
            "'{}' gave {:?}",
            sql,
            result
        );
    }
}

#[test]
fn fuzz_keyword_inside_identifier_accepted() {
    let mut rng = rand::thread_rng();
    for _ in 0..500 {
        let keyword = FORBIDDEN_TOKENS.choose(&mut rng).unwrap().trim();
        let identifier = format!(
            "{}{}{}",
            random_word(rng.gen_range(0..4)),
            keyword,
            random_word(rng.gen_range(1..4))
        );
        let sql = format!("select {} from t", identifier);
        assert!(validate_select(&sql).is_ok(), "Expected '{}' to pass", sql);
    }
}
