use crate::error::{Error, ErrorKind, Result};

/// Identifier triple naming one video.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResolutionRequest {
    batch_id: String,
    subject_id: String,
    child_id: String,
}

impl ResolutionRequest {
    /// Fails with [`ErrorKind::Validation`] naming every missing or blank identifier.
    pub fn new(batch_id: &str, subject_id: &str, child_id: &str) -> Result<Self> {
        let missing = [
            ("batchId", batch_id),
            ("subjectId", subject_id),
            ("childId", child_id),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect::<Vec<_>>();

        if !missing.is_empty() {
            return Err(Error::new(ErrorKind::Validation { missing }));
        }

        Ok(Self {
            batch_id: batch_id.to_owned(),
            subject_id: subject_id.to_owned(),
            child_id: child_id.to_owned(),
        })
    }

    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn child_id(&self) -> &str {
        &self.child_id
    }

    pub fn cache_key(&self) -> String {
        format!("{}:{}:{}", self.batch_id, self.subject_id, self.child_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid() {
        let request = ResolutionRequest::new("b", "s", "c").unwrap();
        assert_eq!(request.cache_key(), "b:s:c");
    }

    #[test]
    fn test_missing_all_listed() {
        let err = ResolutionRequest::new("b", " ", "").unwrap_err();
        match err.kind {
            ErrorKind::Validation { missing } => assert_eq!(missing, ["subjectId", "childId"]),
            x => panic!("unexpected {:?}", x),
        }
    }
}
