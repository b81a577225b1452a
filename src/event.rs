use std::fmt;

use serde::Deserialize;

/// The parts of an S3 event notification the pipeline cares about.
///
/// Everything else in the payload (event names, request ids, etags...)
/// is ignored.
#[derive(Debug, Deserialize)]
pub struct S3Event {
    #[serde(rename = "Records", default)]
    pub records: Vec<S3EventRecord>,
}

#[derive(Debug, Deserialize)]
pub struct S3EventRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Deserialize)]
pub struct S3Entity {
    pub bucket: S3Bucket,
    pub object: S3Object,
}

#[derive(Debug, Deserialize)]
pub struct S3Bucket {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct S3Object {
    pub key: String,
}

impl S3Event {
    pub fn from_slice(data: &[u8]) -> anyhow::Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    /// Flattens the records into the objects that should be looked at.
    pub fn objects(&self) -> Vec<ObjectRef> {
        self.records
            .iter()
            .map(|record| ObjectRef::new(&record.s3.bucket.name, &record.s3.object.key))
            .collect()
    }
}

/// Identifies a single stored object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
}

impl ObjectRef {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PUT_EVENT: &str = r#"{
      "Records": [
        {
          "eventVersion": "2.1",
          "eventSource": "aws:s3",
          "awsRegion": "us-east-1",
          "eventTime": "2026-01-01T00:00:00.000Z",
          "eventName": "ObjectCreated:Put",
          "s3": {
            "s3SchemaVersion": "1.0",
            "configurationId": "thumbnails",
            "bucket": {
              "name": "uploads",
              "arn": "arn:aws:s3:::uploads"
            },
            "object": {
              "key": "photos/a.jpg",
              "size": 1024,
              "eTag": "0123456789abcdef0123456789abcdef"
            }
          }
        },
        {
          "s3": {
            "bucket": { "name": "uploads" },
            "object": { "key": "photos/a.jpg/thumb" }
          }
        }
      ]
    }"#;

    #[test]
    fn parses_notification_records() {
        let event = S3Event::from_slice(PUT_EVENT.as_bytes()).unwrap();
        assert_eq!(event.records.len(), 2);

        let objects = event.objects();
        assert_eq!(
            objects,
            vec![
                ObjectRef::new("uploads", "photos/a.jpg"),
                ObjectRef::new("uploads", "photos/a.jpg/thumb"),
            ],
        );
    }

    #[test]
    fn missing_records_is_an_empty_batch() {
        let event = S3Event::from_slice(b"{}").unwrap();
        assert!(event.objects().is_empty());
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        assert!(S3Event::from_slice(b"not json").is_err());
        assert!(S3Event::from_slice(br#"{"Records": [{"s3": {}}]}"#).is_err());
    }
}
