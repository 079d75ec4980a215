//! Store documents, query filters, and batched write operations.
//!
//! The remote store speaks in untyped JSON documents grouped into
//! [`Collection`]s. Typed entities convert to and from documents through the
//! [`Entity`] trait; everything above the gateway works with typed values.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::enums::{Collection, FilterOp, WriteMode};
use crate::errors::CoreError;

/// Field name that addresses the document ID rather than a data field.
pub const ID_FIELD: &str = "id";

/// One stored document: its ID plus the JSON body.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    /// Read a top-level field, treating `id` as the document ID.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<Value> {
        if name == ID_FIELD {
            return Some(Value::String(self.id.clone()));
        }
        self.data.get(name).cloned()
    }
}

/// A typed entity that lives in exactly one collection.
pub trait Entity: Serialize + DeserializeOwned {
    const COLLECTION: Collection;

    fn id(&self) -> &str;

    /// Encode into a store document. The body carries the ID as well.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` if the entity does not serialize to a
    /// JSON object.
    fn to_document(&self) -> Result<Document, CoreError> {
        let data = serde_json::to_value(self).map_err(|e| CoreError::Other(e.into()))?;
        if !data.is_object() {
            return Err(CoreError::Validation(format!(
                "{} entity must serialize to an object",
                Self::COLLECTION
            )));
        }
        Ok(Document {
            id: self.id().to_string(),
            data,
        })
    }

    /// Decode from a store document. The document ID wins over any `id` in the body.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` if the body is not an object or does
    /// not match the entity shape.
    fn from_document(doc: &Document) -> Result<Self, CoreError> {
        let Value::Object(mut map) = doc.data.clone() else {
            return Err(CoreError::Validation(format!(
                "{} document {} is not an object",
                Self::COLLECTION,
                doc.id
            )));
        };
        map.insert(ID_FIELD.to_string(), Value::String(doc.id.clone()));
        serde_json::from_value(Value::Object(map)).map_err(|e| {
            CoreError::Validation(format!("{} document {}: {e}", Self::COLLECTION, doc.id))
        })
    }
}

/// An exact-match or set-membership predicate over one top-level field.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    #[must_use]
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    #[must_use]
    pub fn array_contains(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            op: FilterOp::ArrayContains,
            value: value.into(),
        }
    }

    /// Evaluate the predicate against a document.
    #[must_use]
    pub fn matches(&self, doc: &Document) -> bool {
        let Some(actual) = doc.field(&self.field) else {
            return self.op == FilterOp::Eq && self.value.is_null();
        };
        match self.op {
            FilterOp::Eq => actual == self.value,
            FilterOp::ArrayContains => actual
                .as_array()
                .is_some_and(|items| items.contains(&self.value)),
        }
    }
}

/// Whether a document satisfies every filter (filters combine with AND).
#[must_use]
pub fn matches_all(filters: &[Filter], doc: &Document) -> bool {
    filters.iter().all(|f| f.matches(doc))
}

/// Canonical, order-independent signature of a filter set.
///
/// Two filter sets with the same signature select the same documents, so the
/// signature together with the collection name identifies a subscription.
#[must_use]
pub fn filter_signature(filters: &[Filter]) -> String {
    let mut parts: Vec<String> = filters
        .iter()
        .map(|f| format!("{}{}{}", f.field, f.op, f.value))
        .collect();
    parts.sort();
    parts.join("&")
}

/// One operation inside an atomic batch.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct WriteOp {
    pub collection: Collection,
    pub id: String,
    pub data: Value,
    pub mode: WriteMode,
}

impl WriteOp {
    /// Insert-only operation for an entity.
    ///
    /// # Errors
    ///
    /// Returns `CoreError` if the entity cannot be encoded.
    pub fn create<E: Entity>(entity: &E) -> Result<Self, CoreError> {
        Self::from_entity(entity, WriteMode::Create)
    }

    /// Upsert operation for an entity.
    ///
    /// # Errors
    ///
    /// Returns `CoreError` if the entity cannot be encoded.
    pub fn set<E: Entity>(entity: &E) -> Result<Self, CoreError> {
        Self::from_entity(entity, WriteMode::Set)
    }

    fn from_entity<E: Entity>(entity: &E, mode: WriteMode) -> Result<Self, CoreError> {
        let doc = entity.to_document()?;
        Ok(Self {
            collection: E::COLLECTION,
            id: doc.id,
            data: doc.data,
            mode,
        })
    }

    /// View this operation as the document it will produce.
    #[must_use]
    pub fn as_document(&self) -> Document {
        Document {
            id: self.id.clone(),
            data: self.data.clone(),
        }
    }
}

/// Decode every document, splitting out the ones that do not match the entity shape.
#[must_use]
pub fn decode_all<E: Entity>(docs: &[Document]) -> (Vec<E>, Vec<CoreError>) {
    let mut ok = Vec::with_capacity(docs.len());
    let mut errors = Vec::new();
    for doc in docs {
        match E::from_document(doc) {
            Ok(entity) => ok.push(entity),
            Err(e) => errors.push(e),
        }
    }
    (ok, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{AssignmentInstance, Course};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn course_doc() -> Document {
        Document {
            id: "crs-1".into(),
            data: json!({"name": "Biology", "student_ids": ["stu-1", "stu-2"], "assignment_ids": []}),
        }
    }

    #[test]
    fn eq_filter_matches_field_and_id() {
        let doc = course_doc();
        assert!(Filter::eq("name", "Biology").matches(&doc));
        assert!(Filter::eq("id", "crs-1").matches(&doc));
        assert!(!Filter::eq("name", "Chemistry").matches(&doc));
    }

    #[test]
    fn array_contains_matches_membership() {
        let doc = course_doc();
        assert!(Filter::array_contains("student_ids", "stu-2").matches(&doc));
        assert!(!Filter::array_contains("student_ids", "stu-9").matches(&doc));
        assert!(!Filter::array_contains("name", "Biology").matches(&doc));
    }

    #[test]
    fn signature_is_order_independent() {
        let a = [Filter::eq("student_id", "stu-1"), Filter::eq("assignment_id", "asg-1")];
        let b = [Filter::eq("assignment_id", "asg-1"), Filter::eq("student_id", "stu-1")];
        assert_eq!(filter_signature(&a), filter_signature(&b));
        assert_ne!(
            filter_signature(&a),
            filter_signature(&[Filter::eq("student_id", "stu-2")])
        );
    }

    #[test]
    fn document_id_overrides_body_id() {
        let doc = Document {
            id: "crs-real".into(),
            data: json!({"id": "crs-stale", "name": "Art"}),
        };
        let course = Course::from_document(&doc).unwrap();
        assert_eq!(course.id, "crs-real");
    }

    #[test]
    fn create_op_carries_collection_and_mode() {
        let instance = AssignmentInstance::unsubmitted("ins-1".into(), "asg-1", "stu-1");
        let op = WriteOp::create(&instance).unwrap();
        assert_eq!(op.collection, Collection::AssignmentInstances);
        assert_eq!(op.mode, WriteMode::Create);
        assert_eq!(op.data["is_submitted"], json!(false));
    }

    #[test]
    fn decode_all_separates_malformed_documents() {
        let docs = vec![
            course_doc(),
            Document {
                id: "crs-bad".into(),
                data: json!("not an object"),
            },
        ];
        let (courses, errors) = decode_all::<Course>(&docs);
        assert_eq!(courses.len(), 1);
        assert_eq!(errors.len(), 1);
    }
}
