//! SQL statement validation for read-only enforcement.
//!
//! The check is lexical. The statement is trimmed and lower-cased, must begin
//! with `select`, and must not contain any banned keyword surrounded by single
//! spaces or any semicolon. Comments, tabs or newlines around a keyword are
//! not recognised; the database account's own privileges remain the real
//! boundary.
//!
//! The text that is executed is always the original, never the normalized form.

use crate::error::{GatewayError, GatewayResult};

/// Keywords refused anywhere in a statement, padded so `addresses` does not
/// match ` delete ` and `updated_at` does not match ` update `.
pub const FORBIDDEN_TOKENS: &[&str] = &[
    " delete ",
    " update ",
    " insert ",
    " merge ",
    " drop ",
    " truncate ",
    " alter ",
    " grant ",
    " revoke ",
    " begin ",
    " declare ",
];

/// Blocks statement chaining.
pub const STATEMENT_SEPARATOR: char = ';';

mod error_messages {
    pub const SQL_REQUIRED: &str = "sql is required";
    pub const ONLY_SELECT: &str = "Only SELECT is allowed";
    pub const FORBIDDEN_TOKEN: &str = "Forbidden token detected";
}

/// Trimmed, lower-cased copy of `sql` used for inspection only.
///
/// Lower-casing follows Unicode default case mapping, so the result does not
/// depend on the host locale.
pub fn normalize(sql: &str) -> String {
    sql.trim().to_lowercase()
}

/// Validate SQL for read-only execution.
///
/// Returns `Ok(())` if the statement passes every check, in order:
/// non-empty, starts with `select`, contains no forbidden token.
///
/// # Examples
///
/// ```
/// use select_mcp_server::tools::sql_validator::validate_select;
///
/// assert!(validate_select("select * from addresses").is_ok());
/// assert!(validate_select("DELETE FROM t").is_err());
/// assert!(validate_select("select * from t; drop table t").is_err());
/// ```
pub fn validate_select(sql: &str) -> GatewayResult<()> {
    let normalized = normalize(sql);

    if normalized.is_empty() {
        return Err(GatewayError::invalid_argument(error_messages::SQL_REQUIRED));
    }

    if !normalized.starts_with("select") {
        return Err(GatewayError::security(error_messages::ONLY_SELECT));
    }

    if let Some(token) = find_forbidden_token(&normalized) {
        tracing::debug!(token = %token.trim(), "Statement refused by read-only filter");
        return Err(GatewayError::security(error_messages::FORBIDDEN_TOKEN));
    }

    Ok(())
}

/// First forbidden token in already-normalized text, if any.
fn find_forbidden_token(normalized: &str) -> Option<&'static str> {
    if normalized.contains(STATEMENT_SEPARATOR) {
        return Some(";");
    }
    FORBIDDEN_TOKENS
        .iter()
        .copied()
        .find(|token| normalized.contains(token))
}
