use serde::{Deserialize, Deserializer};
use serde_json::{Number, Value};
use std::fmt;

/// Identifier of an upstream article.
///
/// The listing API has served ids both as JSON numbers and as strings, so
/// either form is accepted. Numbers keep their JSON form, so ids past
/// `i64::MAX` survive. It is only ever rendered back out as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordId {
    Number(Number),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Number(n) => write!(f, "{}", n),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        RecordId::Number(n.into())
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId::Text(s.to_string())
    }
}

/// A single article as returned by the upstream listing API.
///
/// `id`, `title` and `content` are required by the feed, but they are decoded
/// as `Option` so a page with one incomplete record still decodes; the feed
/// builder reports the gap as a [`MalformedRecordError`](super::MalformedRecordError).
///
/// Field decoding never fails a page. Any JSON scalar is accepted and kept as
/// its text form (`123`, `true`, `4.5`). `null`, arrays and objects count as
/// absent. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ArticleRecord {
    #[serde(deserialize_with = "scalar_id")]
    pub id: Option<RecordId>,
    #[serde(deserialize_with = "scalar_text")]
    pub title: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub content: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub author: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub category: Option<String>,
    #[serde(deserialize_with = "scalar_text")]
    pub tag: Option<String>,
}

fn scalar_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<RecordId>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => Some(RecordId::Number(n)),
        Value::String(s) => Some(RecordId::Text(s)),
        Value::Bool(b) => Some(RecordId::Text(b.to_string())),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    })
}

fn scalar_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    })
}

impl ArticleRecord {
    /// Creates a record with the three required fields set.
    pub fn new(
        id: impl Into<RecordId>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Some(id.into()),
            title: Some(title.into()),
            content: Some(content.into()),
            ..Self::default()
        }
    }
}

/// Envelope of one page: `{ "data": { "records": [...] } }`.
///
/// Pagination metadata in the envelope is ignored; the caller tracks the
/// page number itself.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PageResponse {
    data: Option<PageData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PageData {
    records: Option<Vec<ArticleRecord>>,
}

impl PageResponse {
    /// Returns `data.records`, or an empty list if any key on that path is
    /// absent or `null`.
    pub fn into_records(self) -> Vec<ArticleRecord> {
        self.data.and_then(|d| d.records).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn records(json: &str) -> Vec<ArticleRecord> {
        serde_json::from_str::<PageResponse>(json)
            .unwrap()
            .into_records()
    }

    #[test]
    fn test_full_envelope() {
        let got = records(
            r#"{"code":200,"data":{"total":2,"records":[
                {"id":1,"title":"A","content":"ca","author":"x","category":"c","tag":"t"},
                {"id":"b2","title":"B","content":"cb"}
            ]}}"#,
        );
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].id, Some(RecordId::from(1)));
        assert_eq!(got[0].author.as_deref(), Some("x"));
        assert_eq!(got[1].id, Some(RecordId::Text("b2".into())));
        assert_eq!(got[1].author, None);
    }

    #[test]
    fn test_missing_data_key_is_empty() {
        assert!(records(r#"{"code":200}"#).is_empty());
    }

    #[test]
    fn test_missing_records_key_is_empty() {
        assert!(records(r#"{"data":{"total":0}}"#).is_empty());
    }

    #[test]
    fn test_null_path_is_empty() {
        assert!(records(r#"{"data":null}"#).is_empty());
        assert!(records(r#"{"data":{"records":null}}"#).is_empty());
    }

    #[test]
    fn test_null_optional_fields_are_absent() {
        let got = records(r#"{"data":{"records":[{"id":3,"title":"T","content":"C","tag":null}]}}"#);
        assert_eq!(got[0].tag, None);
    }

    #[test]
    fn test_record_missing_required_field_still_decodes() {
        let got = records(r#"{"data":{"records":[{"id":4,"content":"C"}]}}"#);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].title, None);
    }

    #[test]
    fn test_id_beyond_i64_kept_verbatim() {
        let got = records(
            r#"{"data":{"records":[{"id":18446744073709551615,"title":"T","content":"C"}]}}"#,
        );
        assert_eq!(got[0].id, Some(RecordId::Number(u64::MAX.into())));
        assert_eq!(got[0].id.as_ref().unwrap().to_string(), "18446744073709551615");
    }

    #[test]
    fn test_scalar_text_fields_rendered_as_text() {
        let got = records(
            r#"{"data":{"records":[
                {"id":true,"title":123,"content":false,"author":4.5,"category":-7,"tag":"t"}
            ]}}"#,
        );
        assert_eq!(
            got[0],
            ArticleRecord {
                id: Some(RecordId::from("true")),
                title: Some("123".into()),
                content: Some("false".into()),
                author: Some("4.5".into()),
                category: Some("-7".into()),
                tag: Some("t".into()),
            }
        );
    }

    #[test]
    fn test_structured_values_count_as_absent() {
        let got = records(
            r#"{"data":{"records":[
                {"id":{"v":1},"title":["a"],"content":"C","tag":{"name":"x"}},
                {"id":2,"title":"B","content":"C"}
            ]}}"#,
        );
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].id, None);
        assert_eq!(got[0].title, None);
        assert_eq!(got[0].tag, None);
        assert_eq!(got[1].title.as_deref(), Some("B"));
    }

    #[test]
    fn test_record_id_display() {
        assert_eq!(RecordId::from(42).to_string(), "42");
        assert_eq!(RecordId::from("abc").to_string(), "abc");
    }
}
