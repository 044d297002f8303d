use crate::{
    error::Result,
    models::{ReferenceImage, ReferenceItem, ReferenceWarning, UploadedFile},
    storage::{ImageStore, LocatedReference},
};

/// Decoded references plus their canonical URLs, index-aligned only where
/// every reference was local. Foreign references appear in `urls` alone.
#[derive(Debug, Default)]
pub struct ResolvedReferences {
    pub images: Vec<ReferenceImage>,
    pub urls: Vec<String>,
    pub warnings: Vec<ReferenceWarning>,
}

impl ResolvedReferences {
    pub fn skipped(&self) -> usize {
        self.warnings.iter().filter(|w| w.dropped()).count()
    }
}

/// Reference items in declared order, plus the placeholders that could not
/// be filled.
#[derive(Debug, Default)]
pub struct AssembledReferences {
    pub items: Vec<ReferenceItem>,
    pub warnings: Vec<ReferenceWarning>,
}

/// Pairs the declared slots with the uploads. `None` and blank entries take
/// the next unconsumed upload; an empty declaration means "every upload, in
/// order". Placeholders with nothing left to take become
/// [`ReferenceWarning::NoUploadLeft`].
pub fn assemble_reference_items(
    declared: Vec<Option<String>>,
    uploads: Vec<UploadedFile>,
) -> AssembledReferences {
    if declared.is_empty() {
        return AssembledReferences {
            items: uploads.into_iter().map(ReferenceItem::NewUpload).collect(),
            warnings: Vec::new(),
        };
    }

    let mut uploads = uploads.into_iter();
    let mut assembled = AssembledReferences {
        items: Vec::with_capacity(declared.len()),
        warnings: Vec::new(),
    };
    for (slot, entry) in declared.into_iter().enumerate() {
        match entry.filter(|entry| !entry.trim().is_empty()) {
            Some(url_or_path) => assembled
                .items
                .push(ReferenceItem::ExistingRef { url_or_path }),
            None => match uploads.next() {
                Some(upload) => assembled.items.push(ReferenceItem::NewUpload(upload)),
                None => {
                    let warning = ReferenceWarning::NoUploadLeft { slot };
                    log::warn!("{}", warning);
                    assembled.warnings.push(warning);
                }
            },
        }
    }

    let unclaimed = uploads.count();
    if unclaimed > 0 {
        log::warn!("Ignoring {} upload(s) with no declared slot", unclaimed);
    }
    assembled
}

pub fn decode_reference(bytes: Vec<u8>) -> std::result::Result<ReferenceImage, String> {
    let format = image::guess_format(&bytes).map_err(|e| e.to_string())?;
    let decoded =
        image::load_from_memory_with_format(&bytes, format).map_err(|e| e.to_string())?;

    Ok(ReferenceImage {
        mime_type: format.to_mime_type().to_string(),
        width: decoded.width(),
        height: decoded.height(),
        bytes,
    })
}

#[derive(Clone)]
pub struct ReferenceResolver {
    store: ImageStore,
}

impl ReferenceResolver {
    pub fn new(store: ImageStore) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, items: Vec<ReferenceItem>) -> Result<ResolvedReferences> {
        let mut resolved = ResolvedReferences::default();

        for item in items {
            match item {
                ReferenceItem::ExistingRef { url_or_path } => {
                    self.resolve_existing(url_or_path, &mut resolved).await
                }
                ReferenceItem::NewUpload(upload) => {
                    self.resolve_upload(upload, &mut resolved).await?
                }
            }
        }

        for warning in &resolved.warnings {
            log::warn!("{}", warning);
        }
        Ok(resolved)
    }

    async fn resolve_existing(&self, reference: String, resolved: &mut ResolvedReferences) {
        match self.store.locate(&reference) {
            None => resolved
                .warnings
                .push(ReferenceWarning::NotAbsolute { reference }),
            Some(LocatedReference::Foreign(url)) => {
                resolved.urls.push(url.clone());
                resolved
                    .warnings
                    .push(ReferenceWarning::NotLocal { reference: url });
            }
            Some(LocatedReference::Stored { path, url }) => {
                let decoded = match tokio::fs::read(&path).await {
                    Ok(bytes) => decode_reference(bytes),
                    Err(e) => Err(e.to_string()),
                };
                match decoded {
                    Ok(image) => {
                        resolved.images.push(image);
                        resolved.urls.push(url);
                    }
                    Err(reason) => resolved
                        .warnings
                        .push(ReferenceWarning::Undecodable { reference, reason }),
                }
            }
        }
    }

    /// Decodes before persisting so a corrupt upload leaves nothing behind.
    async fn resolve_upload(
        &self,
        upload: UploadedFile,
        resolved: &mut ResolvedReferences,
    ) -> Result<()> {
        let UploadedFile {
            raw_bytes,
            original_filename,
        } = upload;

        match decode_reference(raw_bytes) {
            Ok(image) => {
                let url = self
                    .store
                    .save_upload(&image.bytes, &original_filename)
                    .await?;
                resolved.images.push(image);
                resolved.urls.push(url);
            }
            Err(reason) => resolved.warnings.push(ReferenceWarning::Undecodable {
                reference: original_filename,
                reason,
            }),
        }
        Ok(())
    }
}
