use std::{fmt, sync::Arc};

use image::{ImageFormat, RgbaImage};
use shared::domain::NormalizedRect;

use crate::{
    blob::{BlobLease, BlobRegistry},
    error::ImageError,
};

/// A decoded image selected into a lane, or returned by a stage.
pub struct SourceImage {
    name: String,
    bytes: Arc<[u8]>,
    format: ImageFormat,
    pixels: Arc<RgbaImage>,
    lease: BlobLease,
}

impl SourceImage {
    pub fn decode(
        name: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
        registry: &BlobRegistry,
    ) -> Result<Self, ImageError> {
        let name = name.into();
        let bytes: Arc<[u8]> = bytes.into();
        let format = image::guess_format(&bytes).map_err(|source| ImageError::Unrecognized {
            name: name.clone(),
            source,
        })?;
        let pixels = image::load_from_memory_with_format(&bytes, format)
            .map_err(|source| ImageError::Decode {
                name: name.clone(),
                source,
            })?
            .to_rgba8();
        let lease = registry.acquire(name.clone(), bytes.len());
        Ok(Self {
            name,
            bytes,
            format,
            pixels: Arc::new(pixels),
            lease,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &Arc<[u8]> {
        &self.bytes
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn url(&self) -> &str {
        self.lease.url()
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("bin")
    }
}

impl fmt::Debug for SourceImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceImage")
            .field("name", &self.name)
            .field("url", &self.lease.url())
            .field("format", &self.format)
            .field("width", &self.width())
            .field("height", &self.height())
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Everything the workbench knows about one lane.
#[derive(Debug, Default)]
pub struct LaneState {
    source: Option<SourceImage>,
    selection: Option<NormalizedRect>,
    processed: Option<SourceImage>,
    detections: Vec<NormalizedRect>,
}

impl LaneState {
    pub fn source(&self) -> Option<&SourceImage> {
        self.source.as_ref()
    }

    pub fn processed(&self) -> Option<&SourceImage> {
        self.processed.as_ref()
    }

    /// The image later stages work on: the latest processed image, else the source.
    pub fn current_image(&self) -> Option<&SourceImage> {
        self.processed.as_ref().or(self.source.as_ref())
    }

    pub fn selection(&self) -> Option<NormalizedRect> {
        self.selection
    }

    pub fn detections(&self) -> &[NormalizedRect] {
        &self.detections
    }

    /// Replaces the source. Processed output, selection and overlays belonged to
    /// the previous source and are dropped with it.
    pub fn set_source(&mut self, image: SourceImage) {
        self.source = Some(image);
        self.processed = None;
        self.selection = None;
        self.detections.clear();
    }

    pub fn set_selection(&mut self, rect: Option<NormalizedRect>) {
        self.selection = rect;
    }

    pub fn set_processed(&mut self, image: SourceImage) {
        self.processed = Some(image);
        self.detections.clear();
    }

    pub fn set_detections(&mut self, rects: Vec<NormalizedRect>) {
        self.detections = rects;
    }

    pub fn clear_overlays(&mut self) {
        self.selection = None;
        self.detections.clear();
    }
}


#[cfg(test)]
mod tests {
    use super::{test_support::png_bytes, *};

    #[test]
    fn decode_reports_natural_size_and_format() {
        let registry = BlobRegistry::new();
        let image = SourceImage::decode("sig.png", png_bytes(30, 12, [0, 0, 0, 255]), &registry)
            .expect("decode");
        assert_eq!((image.width(), image.height()), (30, 12));
        assert_eq!(image.mime_type(), "image/png");
        assert_eq!(image.extension(), "png");
        assert!(image.url().starts_with("blob:"));
    }

    #[test]
    fn decode_rejects_non_images() {
        let registry = BlobRegistry::new();
        let err = SourceImage::decode("notes.txt", b"plain text".to_vec(), &registry)
            .expect_err("must fail");
        assert!(err.to_string().contains("notes.txt"));
        assert_eq!(registry.live(), 0);
    }

    #[test]
    fn reselecting_source_resets_processed_and_overlays() {
        let registry = BlobRegistry::new();
        let mut lane = LaneState::default();
        lane.set_source(
            SourceImage::decode("a.png", png_bytes(10, 10, [255; 4]), &registry).expect("a"),
        );
        lane.set_processed(
            SourceImage::decode("aligned.png", png_bytes(10, 10, [0; 4]), &registry)
                .expect("aligned"),
        );
        lane.set_selection(Some(NormalizedRect::new(0.1, 0.1, 0.2, 0.2)));
        lane.set_detections(vec![NormalizedRect::FULL]);
        assert_eq!(lane.current_image().map(SourceImage::name), Some("aligned.png"));
        assert_eq!(registry.live(), 2);

        lane.set_source(
            SourceImage::decode("b.png", png_bytes(10, 10, [9; 4]), &registry).expect("b"),
        );

        assert!(lane.processed().is_none());
        assert!(lane.selection().is_none());
        assert!(lane.detections().is_empty());
        assert_eq!(lane.current_image().map(SourceImage::name), Some("b.png"));
        assert_eq!(registry.live(), 1);
    }
}
