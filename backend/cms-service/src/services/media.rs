/// Media service - uploads, WebP optimization, derivative variants, renames
///
/// Image decoding and encoding run under `spawn_blocking` so the async
/// runtime never stalls on pixel work.
use bytes::Bytes;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageOutputFormat};
use serde_json::json;
use sqlx::PgPool;
use std::io::Cursor;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::MediaConfig;
use crate::db::media_repo;
use crate::error::{AppError, Result};
use crate::metrics::MEDIA_JOBS;
use crate::models::{MediaAsset, MediaVariant};
use crate::services::posts::slugify;
use crate::storage::StorageBackend;

/// Attempts before giving up on finding a free object key
const KEY_PROBE_LIMIT: u32 = 100;

/// One parsed entry of a derivative spec string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivativeSpec {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub crop: bool,
}

/// Parse a derivative spec string such as
/// `thumb:200x200_crop,hero:1600x900_crop,preview:640x0`.
///
/// A width or height of 0 means "scale preserving aspect ratio"; `_crop`
/// requires both dimensions. Any unparsable entry fails the whole spec.
pub fn parse_derivative_spec(spec: &str) -> Result<Vec<DerivativeSpec>> {
    let mut parsed = Vec::new();

    for entry in spec.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }

        let (name, dims) = entry.split_once(':').ok_or_else(|| {
            AppError::ValidationError(format!("derivative '{}' is missing ':'", entry))
        })?;

        let name = name.trim();
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(AppError::ValidationError(format!(
                "derivative name '{}' is invalid",
                name
            )));
        }

        let (dims, crop) = match dims.strip_suffix("_crop") {
            Some(rest) => (rest, true),
            None => (dims, false),
        };

        let (w, h) = dims.split_once('x').ok_or_else(|| {
            AppError::ValidationError(format!("derivative '{}' has malformed dimensions", entry))
        })?;

        let width: u32 = w.parse().map_err(|_| {
            AppError::ValidationError(format!("derivative '{}' has a bad width", entry))
        })?;
        let height: u32 = h.parse().map_err(|_| {
            AppError::ValidationError(format!("derivative '{}' has a bad height", entry))
        })?;

        if width == 0 && height == 0 {
            return Err(AppError::ValidationError(format!(
                "derivative '{}' needs at least one non-zero dimension",
                entry
            )));
        }
        if crop && (width == 0 || height == 0) {
            return Err(AppError::ValidationError(format!(
                "derivative '{}' cannot crop without both dimensions",
                entry
            )));
        }

        parsed.push(DerivativeSpec {
            name: name.to_string(),
            width,
            height,
            crop,
        });
    }

    if parsed.is_empty() {
        return Err(AppError::ValidationError(
            "derivative spec contains no entries".to_string(),
        ));
    }

    Ok(parsed)
}

/// Largest crop rectangle with the target aspect ratio, centered on the focal
/// point and clamped to the image bounds.
pub fn crop_rect(
    orig_w: u32,
    orig_h: u32,
    target_w: u32,
    target_h: u32,
    focal_x: f32,
    focal_y: f32,
) -> (u32, u32, u32, u32) {
    let target_aspect = target_w as f64 / target_h as f64;
    let orig_aspect = orig_w as f64 / orig_h as f64;

    let (crop_w, crop_h) = if orig_aspect > target_aspect {
        // Source is wider than the target: full height, trimmed width
        let h = orig_h as f64;
        (h * target_aspect, h)
    } else {
        let w = orig_w as f64;
        (w, w / target_aspect)
    };

    let focal_x = focal_x.clamp(0.0, 1.0) as f64;
    let focal_y = focal_y.clamp(0.0, 1.0) as f64;

    let x = (focal_x * orig_w as f64 - crop_w / 2.0)
        .clamp(0.0, (orig_w as f64 - crop_w).max(0.0));
    let y = (focal_y * orig_h as f64 - crop_h / 2.0)
        .clamp(0.0, (orig_h as f64 - crop_h).max(0.0));

    (
        x.round() as u32,
        y.round() as u32,
        (crop_w.round() as u32).max(1),
        (crop_h.round() as u32).max(1),
    )
}

/// Dimensions for an aspect-preserving resize where one side may be free (0)
fn scaled_dimensions(orig_w: u32, orig_h: u32, target_w: u32, target_h: u32) -> (u32, u32) {
    if target_w == 0 {
        let ratio = target_h as f64 / orig_h as f64;
        (((orig_w as f64) * ratio).round().max(1.0) as u32, target_h)
    } else if target_h == 0 {
        let ratio = target_w as f64 / orig_w as f64;
        (target_w, ((orig_h as f64) * ratio).round().max(1.0) as u32)
    } else {
        // Fit within the box, preserving aspect
        let ratio = (target_w as f64 / orig_w as f64).min(target_h as f64 / orig_h as f64);
        (
            ((orig_w as f64) * ratio).round().max(1.0) as u32,
            ((orig_h as f64) * ratio).round().max(1.0) as u32,
        )
    }
}

/// Render one derivative from a decoded image
fn render_variant(
    img: &DynamicImage,
    spec: &DerivativeSpec,
    focal_x: f32,
    focal_y: f32,
) -> DynamicImage {
    let (orig_w, orig_h) = img.dimensions();

    if spec.crop {
        let (x, y, w, h) = crop_rect(orig_w, orig_h, spec.width, spec.height, focal_x, focal_y);
        img.crop_imm(x, y, w, h)
            .resize_exact(spec.width, spec.height, FilterType::Triangle)
    } else {
        let (w, h) = scaled_dimensions(orig_w, orig_h, spec.width, spec.height);
        img.resize_exact(w, h, FilterType::Triangle)
    }
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Bytes> {
    let mut buf = Vec::new();
    let mut cursor = Cursor::new(&mut buf);
    img.write_to(&mut cursor, ImageOutputFormat::Jpeg(quality))
        .map_err(|e| AppError::Internal(format!("Failed to encode JPEG: {e}")))?;
    Ok(Bytes::from(buf))
}

fn encode_webp(img: &DynamicImage) -> Result<Bytes> {
    let mut buf = Vec::new();
    let mut cursor = Cursor::new(&mut buf);
    img.write_to(&mut cursor, ImageOutputFormat::WebP)
        .map_err(|e| AppError::Internal(format!("Failed to encode WebP: {e}")))?;
    Ok(Bytes::from(buf))
}

/// Split a file name into sanitized stem and lowercase extension
fn split_file_name(file_name: &str) -> (String, Option<String>) {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) => {
            (slugify(stem), Some(ext.to_ascii_lowercase()))
        }
        _ => (slugify(file_name), None),
    }
}

fn join_file_name(stem: &str, ext: Option<&str>) -> String {
    match ext {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem.to_string(),
    }
}

pub struct MediaService {
    pool: PgPool,
    storage: Arc<dyn StorageBackend>,
    config: MediaConfig,
}

impl MediaService {
    pub fn new(pool: PgPool, storage: Arc<dyn StorageBackend>, config: MediaConfig) -> Self {
        Self {
            pool,
            storage,
            config,
        }
    }

    /// Find a free object key in `dir` by probing `stem`, `stem-1`, `stem-2`, …
    async fn unique_key(
        &self,
        dir: &str,
        stem: &str,
        ext: Option<&str>,
    ) -> Result<(String, String)> {
        for attempt in 0..KEY_PROBE_LIMIT {
            let candidate_stem = if attempt == 0 {
                stem.to_string()
            } else {
                format!("{}-{}", stem, attempt)
            };
            let file_name = join_file_name(&candidate_stem, ext);
            let key = format!("{}/{}", dir, file_name);

            if !self.storage.exists(&key).await? && !media_repo::path_exists(&self.pool, &key).await?
            {
                return Ok((file_name, key));
            }
        }

        Err(AppError::Internal(format!(
            "no free object key found for '{}' in '{}'",
            stem, dir
        )))
    }

    /// Store an upload and record its metadata row.
    pub async fn upload(
        &self,
        uploaded_by: Uuid,
        file_name: &str,
        mime_type: &str,
        data: Bytes,
    ) -> Result<MediaAsset> {
        if data.is_empty() {
            return Err(AppError::BadRequest("upload is empty".to_string()));
        }
        if data.len() > self.config.max_upload_bytes {
            return Err(AppError::BadRequest(format!(
                "upload exceeds the {} byte limit",
                self.config.max_upload_bytes
            )));
        }

        let (stem, ext) = split_file_name(file_name);
        let (file_name, key) = self.unique_key("uploads", &stem, ext.as_deref()).await?;

        // Probe pixel dimensions for images; non-images simply skip this
        let dimensions = if mime_type.starts_with("image/") {
            let bytes = data.clone();
            tokio::task::spawn_blocking(move || {
                image::load_from_memory(&bytes).ok().map(|i| i.dimensions())
            })
            .await
            .map_err(|e| AppError::Internal(format!("dimension probe panicked: {e}")))?
        } else {
            None
        };

        self.storage.put(&key, data.clone(), mime_type).await?;

        let asset = media_repo::create(
            &self.pool,
            media_repo::NewMediaAsset {
                file_name: &file_name,
                path: &key,
                url: &self.storage.public_url(&key),
                mime_type,
                size: data.len() as i64,
                width: dimensions.map(|(w, _)| w as i32),
                height: dimensions.map(|(_, h)| h as i32),
                uploaded_by,
            },
        )
        .await?;

        debug!(asset_id = %asset.id, key = %asset.path, "media uploaded");
        Ok(asset)
    }

    async fn load_asset(&self, asset_id: Uuid) -> Result<MediaAsset> {
        media_repo::find_by_id(&self.pool, asset_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("media asset {} not found", asset_id)))
    }

    /// Re-encode the original as WebP and record the optimized derivative.
    pub async fn optimize(&self, asset_id: Uuid) -> Result<MediaAsset> {
        let asset = self.load_asset(asset_id).await?;

        if !asset.mime_type.starts_with("image/") {
            return Err(AppError::BadRequest(
                "only images can be optimized".to_string(),
            ));
        }

        let original = self.storage.get(&asset.path).await?;
        let encoded = tokio::task::spawn_blocking(move || -> Result<Bytes> {
            let img = image::load_from_memory(&original)?;
            encode_webp(&img)
        })
        .await
        .map_err(|e| AppError::Internal(format!("optimize task panicked: {e}")))?;

        let encoded = match encoded {
            Ok(bytes) => bytes,
            Err(e) => {
                MEDIA_JOBS.with_label_values(&["optimize", "error"]).inc();
                return Err(e);
            }
        };

        let key = format!("derived/{}/optimized.webp", asset.id);
        self.storage.put(&key, encoded.clone(), "image/webp").await?;

        let updated = media_repo::set_optimized(
            &self.pool,
            asset.id,
            &self.storage.public_url(&key),
            encoded.len() as i64,
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("media asset {} not found", asset_id)))?;

        MEDIA_JOBS.with_label_values(&["optimize", "success"]).inc();
        debug!(asset_id = %asset.id, size = encoded.len(), "media optimized");
        Ok(updated)
    }

    /// Generate resized derivatives from a spec string and record them under
    /// metadata.variants. Same-named variants are replaced.
    pub async fn generate_variants(&self, asset_id: Uuid, spec: &str) -> Result<MediaAsset> {
        let asset = self.load_asset(asset_id).await?;

        if !asset.mime_type.starts_with("image/") {
            return Err(AppError::BadRequest(
                "variants can only be generated for images".to_string(),
            ));
        }

        let specs = parse_derivative_spec(spec)?;
        let original = self.storage.get(&asset.path).await?;

        let focal_x = asset.focal_x.unwrap_or(0.5);
        let focal_y = asset.focal_y.unwrap_or(0.5);
        let quality = self.config.jpeg_quality;

        let rendered = {
            let specs = specs.clone();
            tokio::task::spawn_blocking(move || -> Result<Vec<(DerivativeSpec, Bytes, u32, u32)>> {
                let img = image::load_from_memory(&original)?;
                let mut out = Vec::with_capacity(specs.len());
                for spec in specs {
                    let variant = render_variant(&img, &spec, focal_x, focal_y);
                    let (w, h) = variant.dimensions();
                    let bytes = encode_jpeg(&variant, quality)?;
                    out.push((spec, bytes, w, h));
                }
                Ok(out)
            })
            .await
            .map_err(|e| AppError::Internal(format!("variant task panicked: {e}")))?
        };

        let rendered = match rendered {
            Ok(v) => v,
            Err(e) => {
                MEDIA_JOBS.with_label_values(&["variants", "error"]).inc();
                return Err(e);
            }
        };

        let mut variants = asset.variants();
        for (spec, bytes, w, h) in rendered {
            let key = format!("derived/{}/{}.jpg", asset.id, spec.name);
            self.storage.put(&key, bytes.clone(), "image/jpeg").await?;

            variants.retain(|v| v.name != spec.name);
            variants.push(MediaVariant {
                name: spec.name,
                url: self.storage.public_url(&key),
                width: w,
                height: h,
                size: bytes.len() as u64,
            });
        }
        variants.sort_by(|a, b| a.name.cmp(&b.name));

        let mut metadata = asset.metadata.clone();
        if !metadata.is_object() {
            metadata = json!({});
        }
        metadata["variants"] = serde_json::to_value(&variants)?;

        let updated = media_repo::set_metadata(&self.pool, asset.id, &metadata)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("media asset {} not found", asset_id)))?;

        MEDIA_JOBS.with_label_values(&["variants", "success"]).inc();
        debug!(asset_id = %asset.id, count = variants.len(), "variants generated");
        Ok(updated)
    }

    /// Rename an asset, probing `name-1`, `name-2`, … until a free key is
    /// found. The object moves in storage; derivative keys stay put because
    /// they are addressed by asset id.
    pub async fn rename(&self, asset_id: Uuid, new_name: &str) -> Result<MediaAsset> {
        let asset = self.load_asset(asset_id).await?;

        let (requested_stem, _) = split_file_name(new_name);
        let (_, current_ext) = split_file_name(&asset.file_name);

        let dir = asset
            .path
            .rsplit_once('/')
            .map(|(dir, _)| dir)
            .unwrap_or("uploads");

        let (file_name, key) = self
            .unique_key(dir, &requested_stem, current_ext.as_deref())
            .await?;

        if key == asset.path {
            return Ok(asset);
        }

        let data = self.storage.get(&asset.path).await?;
        self.storage.put(&key, data, &asset.mime_type).await?;
        self.storage.delete(&asset.path).await?;

        let updated = media_repo::rename(
            &self.pool,
            asset.id,
            &file_name,
            &key,
            &self.storage.public_url(&key),
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("media asset {} not found", asset_id)))?;

        debug!(asset_id = %asset.id, from = %asset.path, to = %key, "media renamed");
        Ok(updated)
    }

    /// Delete an asset row and its stored objects. Storage failures are
    /// logged and do not block the delete.
    pub async fn delete(&self, asset_id: Uuid) -> Result<()> {
        let asset = self.load_asset(asset_id).await?;

        let mut keys = vec![asset.path.clone()];
        keys.push(format!("derived/{}/optimized.webp", asset.id));
        for variant in asset.variants() {
            keys.push(format!("derived/{}/{}.jpg", asset.id, variant.name));
        }

        for key in keys {
            if let Err(err) = self.storage.delete(&key).await {
                warn!(asset_id = %asset.id, %key, "failed to delete stored object: {}", err);
            }
        }

        if !media_repo::delete(&self.pool, asset_id).await? {
            return Err(AppError::NotFound(format!(
                "media asset {} not found",
                asset_id
            )));
        }

        Ok(())
    }

    pub async fn get(&self, asset_id: Uuid) -> Result<Option<MediaAsset>> {
        Ok(media_repo::find_by_id(&self.pool, asset_id).await?)
    }

    pub async fn list(
        &self,
        mime_prefix: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MediaAsset>> {
        Ok(media_repo::list(&self.pool, mime_prefix, limit, offset).await?)
    }

    pub async fn update_details(
        &self,
        asset_id: Uuid,
        alt_text: Option<Option<&str>>,
        focal_x: Option<f32>,
        focal_y: Option<f32>,
    ) -> Result<MediaAsset> {
        for focal in [focal_x, focal_y].into_iter().flatten() {
            if !(0.0..=1.0).contains(&focal) {
                return Err(AppError::ValidationError(
                    "focal point coordinates must be within 0..=1".to_string(),
                ));
            }
        }

        media_repo::update_details(&self.pool, asset_id, alt_text, focal_x, focal_y)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("media asset {} not found", asset_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_derivative_spec_full() {
        let specs =
            parse_derivative_spec("thumb:200x200_crop,hero:1600x900_crop,preview:640x0").unwrap();
        assert_eq!(specs.len(), 3);
        assert_eq!(
            specs[0],
            DerivativeSpec {
                name: "thumb".into(),
                width: 200,
                height: 200,
                crop: true
            }
        );
        assert!(!specs[2].crop);
        assert_eq!(specs[2].height, 0);
    }

    #[test]
    fn test_parse_derivative_spec_rejects_bad_entries() {
        assert!(parse_derivative_spec("thumb").is_err());
        assert!(parse_derivative_spec("thumb:axb").is_err());
        assert!(parse_derivative_spec("thumb:0x0").is_err());
        assert!(parse_derivative_spec("thumb:200x0_crop").is_err());
        assert!(parse_derivative_spec("th umb:200x200").is_err());
        assert!(parse_derivative_spec("").is_err());
        // One bad entry fails the whole spec
        assert!(parse_derivative_spec("ok:100x100,bad:pxq").is_err());
    }

    #[test]
    fn test_crop_rect_centered_square_from_landscape() {
        let (x, y, w, h) = crop_rect(1600, 900, 200, 200, 0.5, 0.5);
        assert_eq!((w, h), (900, 900));
        assert_eq!(x, 350);
        assert_eq!(y, 0);
    }

    #[test]
    fn test_crop_rect_focal_clamped_to_edge() {
        // Focal point at the far right: the window hits the right edge
        let (x, _, w, h) = crop_rect(1600, 900, 200, 200, 1.0, 0.5);
        assert_eq!((w, h), (900, 900));
        assert_eq!(x, 700);

        // Focal point at the far left
        let (x, _, _, _) = crop_rect(1600, 900, 200, 200, 0.0, 0.5);
        assert_eq!(x, 0);
    }

    #[test]
    fn test_crop_rect_wide_target_from_portrait() {
        let (_, y, w, h) = crop_rect(900, 1600, 800, 450, 0.5, 0.0);
        assert_eq!(w, 900);
        assert_eq!(h, 506);
        assert_eq!(y, 0);
    }

    #[test]
    fn test_crop_rect_out_of_range_focal_is_clamped() {
        let (x, y, _, _) = crop_rect(1000, 1000, 100, 100, 7.5, -3.0);
        assert_eq!(x, 0);
        assert_eq!(y, 0);
    }

    #[test]
    fn test_scaled_dimensions_free_side() {
        assert_eq!(scaled_dimensions(1600, 900, 640, 0), (640, 360));
        assert_eq!(scaled_dimensions(1600, 900, 0, 450), (800, 450));
        // Fit within a box
        assert_eq!(scaled_dimensions(1600, 900, 800, 800), (800, 450));
    }

    #[test]
    fn test_split_file_name_sanitizes() {
        assert_eq!(
            split_file_name("Summer Photo (1).JPG"),
            ("summer-photo-1".to_string(), Some("jpg".to_string()))
        );
        assert_eq!(split_file_name("notes"), ("notes".to_string(), None));
        assert_eq!(
            split_file_name("weird..name.png"),
            ("weird-name".to_string(), Some("png".to_string()))
        );
    }

    #[test]
    fn test_render_variant_crop_exact_size() {
        let img = DynamicImage::new_rgb8(1600, 900);
        let spec = DerivativeSpec {
            name: "thumb".into(),
            width: 200,
            height: 200,
            crop: true,
        };
        let out = render_variant(&img, &spec, 0.5, 0.5);
        assert_eq!(out.dimensions(), (200, 200));
    }

    #[test]
    fn test_render_variant_scale_preserves_aspect() {
        let img = DynamicImage::new_rgb8(1600, 900);
        let spec = DerivativeSpec {
            name: "preview".into(),
            width: 640,
            height: 0,
            crop: false,
        };
        let out = render_variant(&img, &spec, 0.5, 0.5);
        assert_eq!(out.dimensions(), (640, 360));
    }
}
