//! IPAM annotations
//!
//! Manifests opt into automatic allocation by annotation. The mutating
//! webhook records the allocated range under [`RANGE_ID`] so the range can
//! be released when the object is deleted.

use std::collections::BTreeMap;
use thiserror::Error;

/// Routing domain to allocate in; the default domain when absent
pub const ROUTING_DOMAIN_ID: &str = "ipam.cloud.google.com/routing-domain-id";
/// Range allocated for this object
pub const RANGE_ID: &str = "ipam.cloud.google.com/range-id";
/// Prefix length to allocate
pub const SIZE: &str = "ipam.cloud.google.com/size";
/// Parent range, by id or CIDR
pub const PARENT: &str = "ipam.cloud.google.com/parent";
/// Project owning the resource (set by Config Connector)
pub const PROJECT_ID: &str = "cnrm.cloud.google.com/project-id";

/// JSON Pointer to the range-id annotation (`/` escaped as `~1`)
pub const RANGE_ID_PATCH_PATH: &str = "/metadata/annotations/ipam.cloud.google.com~1range-id";

/// Annotation parsing errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnnotationError {
    #[error("Annotation {key} must be an integer, got {value:?}")]
    NotAnInteger { key: &'static str, value: String },

    #[error("Annotation {SIZE} must be a prefix length between 1 and 32, got {0}")]
    SizeOutOfRange(i64),
}

/// Typed view of the IPAM annotations on one object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpamAnnotations {
    pub routing_domain_id: Option<i64>,
    pub range_id: Option<i64>,
    pub size: Option<u8>,
    pub parent: Option<String>,
    pub project_id: Option<String>,
}

impl IpamAnnotations {
    /// Parse annotations, ignoring keys this service does not own
    ///
    /// Blank values count as absent.
    pub fn from_annotations(
        annotations: &BTreeMap<String, String>,
    ) -> Result<Self, AnnotationError> {
        let text = |key: &str| {
            annotations
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let size = match integer(annotations, SIZE)? {
            Some(size) => match u8::try_from(size) {
                Ok(prefix_len) if (1..=32).contains(&prefix_len) => Some(prefix_len),
                _ => return Err(AnnotationError::SizeOutOfRange(size)),
            },
            None => None,
        };

        Ok(Self {
            routing_domain_id: integer(annotations, ROUTING_DOMAIN_ID)?,
            range_id: integer(annotations, RANGE_ID)?,
            size,
            parent: text(PARENT),
            project_id: text(PROJECT_ID),
        })
    }

    /// Parse the annotations of an object that may have none
    pub fn from_optional(
        annotations: Option<&BTreeMap<String, String>>,
    ) -> Result<Self, AnnotationError> {
        match annotations {
            Some(annotations) => Self::from_annotations(annotations),
            None => Ok(Self::default()),
        }
    }
}

fn integer(
    annotations: &BTreeMap<String, String>,
    key: &'static str,
) -> Result<Option<i64>, AnnotationError> {
    match annotations.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| AnnotationError::NotAnInteger {
                key,
                value: value.to_string(),
            }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotations(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_allocation_request() {
        let parsed = IpamAnnotations::from_annotations(&annotations(&[
            (SIZE, "26"),
            (PARENT, "10.0.0.0/8"),
            (ROUTING_DOMAIN_ID, "2"),
            (PROJECT_ID, "host-project"),
            ("kubectl.kubernetes.io/last-applied-configuration", "{}"),
        ]))
        .unwrap();

        assert_eq!(parsed.size, Some(26));
        assert_eq!(parsed.parent.as_deref(), Some("10.0.0.0/8"));
        assert_eq!(parsed.routing_domain_id, Some(2));
        assert_eq!(parsed.project_id.as_deref(), Some("host-project"));
        assert_eq!(parsed.range_id, None);
    }

    #[test]
    fn test_blank_values_are_absent() {
        let parsed =
            IpamAnnotations::from_annotations(&annotations(&[(SIZE, " "), (PARENT, "")])).unwrap();
        assert_eq!(parsed, IpamAnnotations::default());
        assert_eq!(
            IpamAnnotations::from_optional(None).unwrap(),
            IpamAnnotations::default()
        );
    }

    #[test]
    fn test_rejects_non_integer_ids() {
        let err = IpamAnnotations::from_annotations(&annotations(&[(RANGE_ID, "abc")])).unwrap_err();
        assert_eq!(
            err,
            AnnotationError::NotAnInteger {
                key: RANGE_ID,
                value: "abc".to_string()
            }
        );
    }

    #[test]
    fn test_rejects_size_out_of_range() {
        assert_eq!(
            IpamAnnotations::from_annotations(&annotations(&[(SIZE, "33")])).unwrap_err(),
            AnnotationError::SizeOutOfRange(33)
        );
        assert_eq!(
            IpamAnnotations::from_annotations(&annotations(&[(SIZE, "0")])).unwrap_err(),
            AnnotationError::SizeOutOfRange(0)
        );
        assert_eq!(
            IpamAnnotations::from_annotations(&annotations(&[(SIZE, "280")])).unwrap_err(),
            AnnotationError::SizeOutOfRange(280)
        );
        assert_eq!(
            IpamAnnotations::from_annotations(&annotations(&[(SIZE, "-24")])).unwrap_err(),
            AnnotationError::SizeOutOfRange(-24)
        );
    }

    #[test]
    fn test_patch_path_escapes_slash() {
        assert_eq!(
            RANGE_ID_PATCH_PATH,
            format!("/metadata/annotations/{}", RANGE_ID.replace('/', "~1"))
        );
    }
}
