pub mod resolver;

use crate::{
    config::Config,
    error::{Result, StudioError},
    gemini::{GeminiImageClient, ImageGenerator},
    logger,
    models::{
        GenerationCall, GenerationOutcome, GenerationRequest, ReferenceItem, ReferenceWarning,
        ResolvedContent, DEFAULT_RESOLUTION,
    },
    storage::{
        embed_metadata, ArtifactNamer, DirectoryScan, ImageStore, LockedDirectoryScan, Recycler,
        SequenceAllocator, SystemTrash, TrashDirectory,
    },
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Local;
use std::sync::Arc;

pub use resolver::{
    assemble_reference_items, AssembledReferences, ReferenceResolver, ResolvedReferences,
};

/// Raw request fields before validation.
#[derive(Debug, Default, Clone)]
pub struct GenerateForm {
    pub prompt: Option<String>,
    pub aspect_ratio: Option<String>,
    pub resolution: Option<String>,
    pub api_key: Option<String>,
    pub reference_items: Vec<ReferenceItem>,
    /// Placeholders that could not be paired with an upload.
    pub reference_warnings: Vec<ReferenceWarning>,
}

impl GenerateForm {
    /// Stores the outcome of pairing declared slots with uploads.
    pub fn set_references(&mut self, assembled: AssembledReferences) {
        self.reference_items = assembled.items;
        self.reference_warnings = assembled.warnings;
    }

    /// Missing prompt is checked before the missing key.
    pub fn into_request(self, default_api_key: Option<&str>) -> Result<GenerationRequest> {
        let prompt = self
            .prompt
            .filter(|prompt| !prompt.trim().is_empty())
            .ok_or(StudioError::MissingPrompt)?;

        let api_key = self
            .api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .or_else(|| default_api_key.map(str::to_string))
            .ok_or(StudioError::MissingApiKey)?;

        let resolution = self
            .resolution
            .map(|resolution| resolution.trim().to_string())
            .filter(|resolution| !resolution.is_empty())
            .unwrap_or_else(|| DEFAULT_RESOLUTION.to_string());

        let aspect_ratio = self
            .aspect_ratio
            .map(|ratio| ratio.trim().to_string())
            .filter(|ratio| !ratio.is_empty());

        Ok(GenerationRequest {
            prompt,
            aspect_ratio,
            resolution,
            api_key,
            reference_items: self.reference_items,
            reference_warnings: self.reference_warnings,
        })
    }
}

#[derive(Clone)]
pub struct Studio {
    model: String,
    default_api_key: Option<String>,
    store: ImageStore,
    resolver: ReferenceResolver,
    generator: Arc<dyn ImageGenerator>,
    namer: ArtifactNamer,
    recycler: Arc<dyn Recycler>,
}

impl Studio {
    pub fn new(config: &Config) -> Result<Self> {
        let store = ImageStore::new(&config.storage)?;

        let allocator: Arc<dyn SequenceAllocator> = if config.storage.locked_naming {
            Arc::new(LockedDirectoryScan::new(store.generated_dir()))
        } else {
            Arc::new(DirectoryScan::new(store.generated_dir()))
        };
        let recycler: Arc<dyn Recycler> = match &config.storage.trash_dir {
            Some(dir) => Arc::new(TrashDirectory::new(dir)),
            None => Arc::new(SystemTrash),
        };

        Ok(Self {
            model: config.gemini.model.clone(),
            default_api_key: config.gemini.api_key.clone(),
            resolver: ReferenceResolver::new(store.clone()),
            generator: Arc::new(GeminiImageClient::new(&config.gemini)?),
            namer: ArtifactNamer::new(allocator),
            recycler,
            store,
        })
    }

    pub fn with_generator(mut self, generator: Arc<dyn ImageGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_allocator(mut self, allocator: Arc<dyn SequenceAllocator>) -> Self {
        self.namer = ArtifactNamer::new(allocator);
        self
    }

    pub fn with_recycler(mut self, recycler: Arc<dyn Recycler>) -> Self {
        self.recycler = recycler;
        self
    }

    pub fn default_api_key(&self) -> Option<&str> {
        self.default_api_key.as_deref()
    }

    pub fn store(&self) -> &ImageStore {
        &self.store
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn generate(&self, mut request: GenerationRequest) -> Result<GenerationOutcome> {
        let reference_items = std::mem::take(&mut request.reference_items);
        let mut resolved = self.resolver.resolve(reference_items).await?;
        let mut warnings = std::mem::take(&mut request.reference_warnings);
        warnings.append(&mut resolved.warnings);
        resolved.warnings = warnings;

        let call = GenerationCall {
            model: self.model.clone(),
            content: ResolvedContent {
                prompt: request.prompt.clone(),
                images: std::mem::take(&mut resolved.images),
            },
            image_config: request.image_config(),
            api_key: request.api_key.clone(),
        };

        let generated = {
            let _timer = logger::timer("image generation");
            self.generator.generate(&call).await?
        };

        let metadata = request.metadata(std::mem::take(&mut resolved.urls));
        let png = embed_metadata(&generated.bytes, &metadata)?;
        let file_name = self
            .namer
            .next_filename(&self.model, Local::now().date_naive())
            .await?;
        let artifact = self.store.write_artifact(&file_name, &png).await?;

        log::info!(
            "Saved {} ({} bytes, {} reference(s), {} skipped)",
            artifact.filename,
            png.len(),
            metadata.reference_images.len(),
            resolved.skipped()
        );

        Ok(GenerationOutcome {
            image: self.store.generated_url(&artifact.filename),
            image_data: BASE64.encode(&png),
            metadata,
            artifact,
            warnings: resolved.warnings,
        })
    }

    pub async fn gallery(&self) -> Result<Vec<String>> {
        self.store.gallery_urls().await
    }

    pub async fn delete_image(&self, filename: &str) -> Result<()> {
        self.store.delete_artifact(filename, &self.recycler).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GeminiConfig, StorageConfig};
    use crate::models::{GeneratedImage, UploadedFile};
    use crate::storage::{read_metadata, InMemorySequence};
    use async_trait::async_trait;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn png(width: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(RgbImage::from_pixel(width, 2, Rgb([9, 9, 9])))
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[derive(Default)]
    struct RecordingGenerator {
        calls: Mutex<Vec<GenerationCall>>,
        fail_with: Option<String>,
    }

    #[async_trait]
    impl ImageGenerator for RecordingGenerator {
        async fn generate(&self, call: &GenerationCall) -> Result<GeneratedImage> {
            self.calls.lock().unwrap().push(call.clone());
            match &self.fail_with {
                Some(message) => Err(StudioError::UpstreamError(message.clone())),
                None => Ok(GeneratedImage {
                    bytes: png(4),
                    mime_type: Some("image/png".to_string()),
                }),
            }
        }
    }

    fn studio(generator: Arc<RecordingGenerator>) -> (TempDir, Studio) {
        let root = TempDir::new().unwrap();
        let config = Config::new()
            .with_gemini(GeminiConfig::new().with_model("test-model"))
            .with_storage(StorageConfig::rooted_at(root.path()).with_trash_dir(root.path().join("trash")));
        let studio = Studio::new(&config)
            .unwrap()
            .with_generator(generator)
            .with_allocator(Arc::new(InMemorySequence::new()));
        (root, studio)
    }

    fn form(prompt: &str) -> GenerateForm {
        GenerateForm {
            prompt: Some(prompt.to_string()),
            api_key: Some("key".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn validation_order_and_defaults() {
        let err = GenerateForm::default().into_request(None).unwrap_err();
        assert!(matches!(err, StudioError::MissingPrompt));

        let mut no_key = form("a cat");
        no_key.api_key = Some("  ".to_string());
        assert!(matches!(
            no_key.clone().into_request(None).unwrap_err(),
            StudioError::MissingApiKey
        ));
        let request = no_key.into_request(Some("env-key")).unwrap();
        assert_eq!(request.api_key, "env-key");
        assert_eq!(request.resolution, "2K");
        assert_eq!(request.aspect_ratio, None);
    }

    #[tokio::test]
    async fn prompt_only_request_forwards_no_images() {
        let generator = Arc::new(RecordingGenerator::default());
        let (_root, studio) = studio(generator.clone());

        let outcome = studio
            .generate(form("a cat").into_request(None).unwrap())
            .await
            .unwrap();

        let calls = generator.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].content.images.is_empty());
        assert_eq!(calls[0].content.prompt, "a cat");
        assert_eq!(calls[0].image_config.aspect_ratio, None);
        assert_eq!(calls[0].model, "test-model");

        let today = Local::now().date_naive().format("%Y%m%d").to_string();
        assert_eq!(
            outcome.image,
            format!("/static/generated/test-model_{}_1.png", today)
        );
        let stored = std::fs::read(&outcome.artifact.filepath).unwrap();
        assert_eq!(BASE64.decode(&outcome.image_data).unwrap(), stored);
        assert_eq!(read_metadata(&stored).unwrap(), Some(outcome.metadata.clone()));
        assert_eq!(outcome.metadata.aspect_ratio, "Auto");
        assert!(outcome.metadata.reference_images.is_empty());
    }

    #[tokio::test]
    async fn references_reach_generator_and_metadata_in_order() {
        let generator = Arc::new(RecordingGenerator::default());
        let (_root, studio) = studio(generator.clone());

        let mut first = form("remix");
        first.aspect_ratio = Some("16:9".to_string());
        let first = studio.generate(first.into_request(None).unwrap()).await.unwrap();

        let mut second = form("again");
        second.set_references(assemble_reference_items(
            vec![None, Some(first.image.clone()), Some("https://example.com/x.png".to_string())],
            vec![UploadedFile::new(png(3), "upload.png")],
        ));
        let second = studio.generate(second.into_request(None).unwrap()).await.unwrap();

        let calls = generator.calls.lock().unwrap();
        let widths: Vec<_> = calls[1].content.images.iter().map(|i| i.width).collect();
        assert_eq!(widths, vec![3, 4]);
        assert_eq!(calls[0].image_config.aspect_ratio.as_deref(), Some("16:9"));

        let refs = &second.metadata.reference_images;
        assert_eq!(refs.len(), 3);
        assert!(refs[0].starts_with("/static/uploads/"));
        assert_eq!(refs[1], first.image);
        assert_eq!(refs[2], "https://example.com/x.png");
        assert!(second.image.ends_with("_2.png"));
        assert_eq!(second.warnings.len(), 1);
    }

    #[tokio::test]
    async fn unfilled_placeholders_are_reported_in_outcome() {
        let generator = Arc::new(RecordingGenerator::default());
        let (_root, studio) = studio(generator.clone());

        let mut request = form("three slots");
        request.set_references(assemble_reference_items(
            vec![None, None, None],
            vec![UploadedFile::new(png(2), "only.png")],
        ));
        let outcome = studio.generate(request.into_request(None).unwrap()).await.unwrap();

        assert_eq!(outcome.metadata.reference_images.len(), 1);
        assert_eq!(
            outcome.warnings,
            vec![
                ReferenceWarning::NoUploadLeft { slot: 1 },
                ReferenceWarning::NoUploadLeft { slot: 2 },
            ]
        );
        assert_eq!(outcome.warnings.iter().filter(|w| w.dropped()).count(), 2);
        assert_eq!(generator.calls.lock().unwrap()[0].content.images.len(), 1);
    }

    #[tokio::test]
    async fn upstream_failure_writes_nothing() {
        let generator = Arc::new(RecordingGenerator {
            fail_with: Some("Quota exceeded".to_string()),
            ..Default::default()
        });
        let (_root, studio) = studio(generator);

        let err = studio
            .generate(form("a cat").into_request(None).unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Quota exceeded");
        assert!(studio.gallery().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_moves_image_out_of_gallery() {
        let generator = Arc::new(RecordingGenerator::default());
        let (root, studio) = studio(generator);

        let outcome = studio
            .generate(form("a cat").into_request(None).unwrap())
            .await
            .unwrap();
        assert_eq!(studio.gallery().await.unwrap(), vec![outcome.image.clone()]);

        studio.delete_image(&outcome.artifact.filename).await.unwrap();
        assert!(studio.gallery().await.unwrap().is_empty());
        assert_eq!(std::fs::read_dir(root.path().join("trash")).unwrap().count(), 1);

        let err = studio.delete_image(&outcome.artifact.filename).await.unwrap_err();
        assert!(matches!(err, StudioError::NotFound));
    }
}
