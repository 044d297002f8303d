use std::fmt;

/// One declared reference slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceItem {
    /// A path or URL that should already resolve to a stored image.
    ExistingRef { url_or_path: String },
    NewUpload(UploadedFile),
}

/// A `reference_images` part as received, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub raw_bytes: Vec<u8>,
    pub original_filename: String,
}

impl UploadedFile {
    pub fn new(raw_bytes: Vec<u8>, original_filename: impl Into<String>) -> Self {
        Self {
            raw_bytes,
            original_filename: original_filename.into(),
        }
    }
}

/// A reference image that decoded successfully.
#[derive(Debug, Clone)]
pub struct ReferenceImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Why a reference was skipped or only partly used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceWarning {
    /// Bytes could not be read or decoded; the item was dropped.
    Undecodable { reference: String, reason: String },
    /// Neither an absolute path nor an absolute URL; the item was dropped.
    NotAbsolute { reference: String },
    /// Not backed by local storage; recorded in metadata but not attached.
    NotLocal { reference: String },
    /// A placeholder slot with every upload already claimed.
    NoUploadLeft { slot: usize },
}

impl ReferenceWarning {
    /// Whether the item was removed from the canonical URL list.
    pub fn dropped(&self) -> bool {
        !matches!(self, ReferenceWarning::NotLocal { .. })
    }
}

impl fmt::Display for ReferenceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceWarning::Undecodable { reference, reason } => {
                write!(f, "skipping reference {}: {}", reference, reason)
            }
            ReferenceWarning::NotAbsolute { reference } => {
                write!(f, "skipping reference {}: not an absolute path or URL", reference)
            }
            ReferenceWarning::NoUploadLeft { slot } => {
                write!(f, "skipping reference slot {}: no uploaded file left", slot)
            }
            ReferenceWarning::NotLocal { reference } => write!(
                f,
                "reference {} is not in local storage; recorded but not attached",
                reference
            ),
        }
    }
}
