use thiserror::Error;

/// A file picked by the user, ready to be submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, mime: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime,
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no file selected")]
    NoFileSelected,
    #[error("{name} is not an accepted file type (accepted: {accepted})")]
    UnsupportedType { name: String, accepted: String },
}

/// MIME type and extension allow-list for uploads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptPolicy {
    pub mime_types: Vec<String>,
    pub extensions: Vec<String>,
}

impl Default for AcceptPolicy {
    fn default() -> Self {
        Self {
            mime_types: vec!["application/pdf".to_string()],
            extensions: vec!["pdf".to_string()],
        }
    }
}

impl AcceptPolicy {
    pub fn validate(&self, file: Option<&UploadFile>) -> Result<(), ValidationError> {
        let file = file.ok_or(ValidationError::NoFileSelected)?;
        if self.accepts(file) {
            Ok(())
        } else {
            Err(ValidationError::UnsupportedType {
                name: file.name.clone(),
                accepted: self.describe(),
            })
        }
    }

    /// A file passes when either its MIME type or its extension is listed.
    pub fn accepts(&self, file: &UploadFile) -> bool {
        let mime_ok = file.mime.as_deref().is_some_and(|mime| {
            let essence = mime.split(';').next().unwrap_or(mime).trim();
            self.mime_types
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(essence))
        });
        mime_ok || self.extension_allowed(&file.name)
    }

    fn extension_allowed(&self, name: &str) -> bool {
        let Some((stem, extension)) = name.rsplit_once('.') else {
            return false;
        };
        !stem.is_empty()
            && self
                .extensions
                .iter()
                .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(extension))
    }

    fn describe(&self) -> String {
        self.mime_types
            .iter()
            .cloned()
            .chain(self.extensions.iter().map(|ext| format!(".{}", ext.trim_start_matches('.'))))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
