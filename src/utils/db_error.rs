//! Classification of PostgreSQL unique-constraint violations on the `urls` table.

/// Constraint guarding the original URL column.
pub const URL_UNIQUE_CONSTRAINT: &str = "urls_url_key";
/// Constraint guarding the alias column.
pub const ALIAS_UNIQUE_CONSTRAINT: &str = "urls_alias_key";

/// Which uniqueness rule an insert violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueViolation {
    OriginalUrl,
    Alias,
}

/// Maps a unique-violation error to the violated rule.
///
/// Returns `None` for any other error. A unique violation on an unrecognised
/// constraint is attributed to the original URL, which is the only dedup rule
/// the table is guaranteed to carry.
pub fn unique_violation(e: &sqlx::Error) -> Option<UniqueViolation> {
    let db_err = e.as_database_error()?;

    if !db_err.is_unique_violation() {
        return None;
    }

    Some(classify_constraint(db_err.constraint()))
}

fn classify_constraint(constraint: Option<&str>) -> UniqueViolation {
    match constraint {
        Some(ALIAS_UNIQUE_CONSTRAINT) => UniqueViolation::Alias,
        _ => UniqueViolation::OriginalUrl,
    }
}
