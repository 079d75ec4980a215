//! Filter-to-SQL translation and row parsing helpers.
//!
//! Every filter becomes one `AND`-ed clause over the JSON `data` column.
//! Field names are restricted to identifier characters so they can be
//! embedded in JSON paths.

use lec_core::documents::{Document, Filter, ID_FIELD};
use lec_core::enums::FilterOp;
use serde_json::Value;

use crate::error::StoreError;

/// Check that a field name is safe to embed in a JSON path.
#[must_use]
pub fn is_valid_field(field: &str) -> bool {
    !field.is_empty()
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Convert a scalar JSON value into the libSQL value `json_extract` would yield.
///
/// Booleans become integers (`json_extract` returns 1/0 for JSON booleans).
///
/// # Errors
///
/// Returns `StoreError::Query` for arrays and objects, which cannot be
/// compared as scalars.
pub fn json_to_sql(value: &Value) -> Result<libsql::Value, StoreError> {
    match value {
        Value::Null => Ok(libsql::Value::Null),
        Value::Bool(b) => Ok(libsql::Value::Integer(i64::from(*b))),
        Value::Number(n) => n.as_i64().map_or_else(
            || {
                n.as_f64()
                    .map(libsql::Value::Real)
                    .ok_or_else(|| StoreError::Query(format!("unrepresentable number {n}")))
            },
            |i| Ok(libsql::Value::Integer(i)),
        ),
        Value::String(s) => Ok(libsql::Value::Text(s.clone())),
        Value::Array(_) | Value::Object(_) => Err(StoreError::Query(
            "filter values must be scalars".to_string(),
        )),
    }
}

/// Build the `WHERE` clause (without the keyword) and its parameters.
///
/// Parameter `?1` is reserved for the collection name; filter parameters
/// start at `?2`.
///
/// # Errors
///
/// Returns `StoreError::Query` for invalid field names or non-scalar values.
pub fn build_where(filters: &[Filter]) -> Result<(String, Vec<libsql::Value>), StoreError> {
    let mut clauses = vec!["collection = ?1".to_string()];
    let mut params = Vec::with_capacity(filters.len());
    let mut idx = 2usize;

    for filter in filters {
        if !is_valid_field(&filter.field) {
            return Err(StoreError::Query(format!(
                "invalid filter field '{}'",
                filter.field
            )));
        }
        let value = json_to_sql(&filter.value)?;
        match filter.op {
            FilterOp::Eq if filter.field == ID_FIELD => {
                clauses.push(format!("id = ?{idx}"));
            }
            FilterOp::Eq if value == libsql::Value::Null => {
                clauses.push(format!("json_extract(data, '$.{}') IS NULL", filter.field));
                continue;
            }
            FilterOp::Eq => {
                clauses.push(format!("json_extract(data, '$.{}') = ?{idx}", filter.field));
            }
            FilterOp::ArrayContains => {
                clauses.push(format!(
                    "EXISTS (SELECT 1 FROM json_each(data, '$.{}') WHERE json_each.value = ?{idx})",
                    filter.field
                ));
            }
        }
        params.push(value);
        idx += 1;
    }

    Ok((clauses.join(" AND "), params))
}

/// Parse a `(id, data)` row into a document.
///
/// # Errors
///
/// Returns `StoreError::InvalidState` if `data` is not valid JSON.
pub fn row_to_document(row: &libsql::Row) -> Result<Document, StoreError> {
    let id: String = row.get(0)?;
    let raw: String = row.get(1)?;
    let data = serde_json::from_str(&raw)
        .map_err(|e| StoreError::InvalidState(format!("document {id} has invalid JSON: {e}")))?;
    Ok(Document { id, data })
}

/// Detect unique/primary-key violations, which the gateway reports as conflicts.
#[must_use]
pub fn is_unique_violation(e: &libsql::Error) -> bool {
    let msg = e.to_string();
    msg.contains("UNIQUE constraint failed") || msg.contains("PRIMARY KEY constraint failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("student_id", true)]
    #[case("assignment_ids", true)]
    #[case("", false)]
    #[case("a.b", false)]
    #[case("x') OR 1=1 --", false)]
    fn field_validation(#[case] field: &str, #[case] valid: bool) {
        assert_eq!(is_valid_field(field), valid);
    }

    #[test]
    fn bool_maps_to_integer() {
        assert_eq!(json_to_sql(&json!(true)).unwrap(), libsql::Value::Integer(1));
        assert_eq!(json_to_sql(&json!(false)).unwrap(), libsql::Value::Integer(0));
    }

    #[test]
    fn where_clause_numbers_params_after_collection() {
        let filters = [
            Filter::eq("course_id", "crs-1"),
            Filter::array_contains("student_ids", "stu-1"),
        ];
        let (clause, params) = build_where(&filters).unwrap();
        assert!(clause.starts_with("collection = ?1"));
        assert!(clause.contains("json_extract(data, '$.course_id') = ?2"));
        assert!(clause.contains("json_each(data, '$.student_ids') WHERE json_each.value = ?3"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn id_field_targets_id_column() {
        let (clause, params) = build_where(&[Filter::eq("id", "ins-1")]).unwrap();
        assert!(clause.contains("id = ?2"));
        assert_eq!(params, vec![libsql::Value::Text("ins-1".into())]);
    }

    #[test]
    fn null_eq_uses_is_null_without_param() {
        let (clause, params) = build_where(&[Filter::eq("mark", Value::Null)]).unwrap();
        assert!(clause.contains("IS NULL"));
        assert!(params.is_empty());
    }

    #[test]
    fn object_values_are_rejected() {
        assert!(build_where(&[Filter::eq("course_id", json!({"a": 1}))]).is_err());
    }
}
