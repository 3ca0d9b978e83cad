use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::PgConnection;

use crate::schema::protocolos;

/// Minute-granularity bucket prefix: `<TAG><yyyy><MM><dd><HH><mm>`.
pub fn bucket_prefix(tag: &str, at: NaiveDateTime) -> String {
    format!("{}{}", tag, at.format("%Y%m%d%H%M"))
}

/// Picks the successor number within a bucket. The latest existing number is
/// the longest one, then the lexicographically greatest, so numeric suffixes
/// of different widths compare correctly ("9" comes before "10").
pub fn next_in_bucket(prefix: &str, existing: &[String]) -> String {
    let last = existing
        .iter()
        .filter(|numero| numero.starts_with(prefix))
        .max_by(|a, b| {
            a.len()
                .cmp(&b.len())
                .then_with(|| a.as_str().cmp(b.as_str()))
        });

    let next_seq = last
        .and_then(|numero| numero[prefix.len()..].parse::<u64>().ok())
        .map(|seq| seq + 1)
        .unwrap_or(1);

    format!("{prefix}{next_seq}")
}

/// Advisory read of the next free number for the bucket containing `at`.
/// Nothing is reserved here; the unique constraint on `numero_protocolo`
/// stays the arbiter at insert time, and a caller that loses the race gets a
/// conflict and re-fetches.
pub fn advisory_next_number(
    conn: &mut PgConnection,
    tag: &str,
    at: NaiveDateTime,
) -> QueryResult<String> {
    let prefix = bucket_prefix(tag, at);
    let existing: Vec<String> = protocolos::table
        .filter(protocolos::numero_protocolo.like(format!("{prefix}%")))
        .select(protocolos::numero_protocolo)
        .load(conn)?;
    Ok(next_in_bucket(&prefix, &existing))
}
