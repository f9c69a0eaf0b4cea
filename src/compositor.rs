//! Image compositor
//!
//! Places a cut-out subject on a background: the background is blurred, the
//! subject is scaled to a fraction of the background width, color-adjusted,
//! given an optional soft drop shadow and anchored bottom-center as if standing
//! on the ground. Output is always lossless PNG.
//!
//! The pixel pipeline ([`compose_images`], [`compose_bytes`]) is a pure function
//! of its inputs. [`Compositor`] adds the concurrent fetch of both sources and
//! runs the CPU-bound work on the blocking pool.

use crate::{
    config::ComposeParameters,
    error::{ComposeError, ImageSide, Result},
    services::{AssetFetcher, ImageCodec},
    utils::NumericValidator,
};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use instant::Instant;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Background size assumed when the decoded buffer reports no dimensions
pub const FALLBACK_BACKGROUND_SIZE: (u32, u32) = (1024, 1024);

/// Shadow opacity relative to the subject silhouette
pub const SHADOW_OPACITY: f32 = 0.32;

/// Upper bound on the padded shadow layer, in pixels
pub const MAX_SHADOW_PIXELS: u64 = 64 * 1024 * 1024;

/// Where the resized subject lands on the background
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub left: i64,
    pub top: i64,
    pub width: u32,
    pub height: u32,
}

impl Placement {
    /// Bottom-center placement
    ///
    /// `subject` is the resized subject size; when it cannot be read the
    /// target width and background height stand in for it.
    pub fn bottom_center(
        background: (u32, u32),
        subject: Option<(u32, u32)>,
        target_width: u32,
        bottom_margin: u32,
    ) -> Result<Self> {
        let (bg_width, bg_height) = background;
        let (width, height) = subject.unwrap_or((target_width, bg_height));

        let left = NumericValidator::round_to_i64(
            (f64::from(bg_width) - f64::from(width)) / 2.0,
        )?;
        let top = NumericValidator::round_to_i64(
            f64::from(bg_height) - f64::from(height) - f64::from(bottom_margin),
        )?;

        Ok(Self {
            left,
            top,
            width,
            height,
        })
    }

    /// Horizontal center in pixels
    #[must_use]
    pub fn center_x(&self) -> f64 {
        self.left as f64 + f64::from(self.width) / 2.0
    }

    /// Row just below the subject
    #[must_use]
    pub fn bottom(&self) -> i64 {
        self.top + i64::from(self.height)
    }
}

/// Decoded composite plus the geometry that produced it
#[derive(Debug, Clone)]
pub struct Composite {
    pub image: RgbaImage,
    pub placement: Placement,
    /// Subject width before resizing
    pub native_width: u32,
}

/// Width the subject may occupy: `floor(background_width * scale)`, at least 1
pub fn target_width(background_width: u32, scale: f32) -> Result<u32> {
    let raw = (f64::from(background_width) * f64::from(scale)).floor();
    Ok(NumericValidator::validate_f64_to_u32(raw)?.max(1))
}

/// Size of an "inside" fit to `max_width` that never enlarges
pub fn fit_inside(native: (u32, u32), max_width: u32) -> Result<(u32, u32)> {
    let (native_width, native_height) = native;
    if native_width == 0 || native_height == 0 {
        return Err(ComposeError::decode("subject image has zero size"));
    }

    let width = max_width.min(native_width).max(1);
    if width == native_width {
        return Ok(native);
    }

    let height = NumericValidator::validate_f64_to_u32(
        (f64::from(native_height) * f64::from(width) / f64::from(native_width)).round(),
    )?
    .max(1);

    Ok((width, height))
}

/// Gaussian blur that short-circuits for a zero radius
///
/// `imageops::blur` substitutes its own sigma for non-positive values, which
/// would smear an already-transparent background, so radius 0 must not reach it.
/// Blurs in premultiplied space so transparent pixels contribute no color.
#[must_use]
pub fn blur_background(mut background: RgbaImage, radius: f32) -> RgbaImage {
    if radius <= 0.0 {
        return background;
    }
    premultiply(&mut background);
    let mut blurred = imageops::blur(&background, radius);
    unpremultiply(&mut blurred);
    blurred
}

fn premultiply(image: &mut RgbaImage) {
    for pixel in image.pixels_mut() {
        let alpha = u16::from(pixel[3]);
        for channel in 0..3 {
            pixel[channel] = ((u16::from(pixel[channel]) * alpha + 127) / 255) as u8;
        }
    }
}

fn unpremultiply(image: &mut RgbaImage) {
    for pixel in image.pixels_mut() {
        let alpha = u16::from(pixel[3]);
        if alpha == 0 {
            pixel[0] = 0;
            pixel[1] = 0;
            pixel[2] = 0;
            continue;
        }
        for channel in 0..3 {
            let value = (u16::from(pixel[channel]) * 255 + alpha / 2) / alpha;
            pixel[channel] = value.min(255) as u8;
        }
    }
}

/// Resize with Lanczos3 in premultiplied space so transparent edge pixels do
/// not bleed their (meaningless) color into the cut-out outline
#[must_use]
pub fn resize_subject(subject: &RgbaImage, size: (u32, u32)) -> RgbaImage {
    if subject.dimensions() == size {
        return subject.clone();
    }

    let mut premultiplied = subject.clone();
    premultiply(&mut premultiplied);
    let mut resized = imageops::resize(&premultiplied, size.0, size.1, FilterType::Lanczos3);
    unpremultiply(&mut resized);
    resized
}

/// Multiply saturation and brightness in place; 1.0 leaves a channel untouched
pub fn adjust_color(image: &mut RgbaImage, saturation: f32, brightness: f32) {
    let identity = |value: f32| (value - 1.0).abs() < f32::EPSILON;
    if identity(saturation) && identity(brightness) {
        return;
    }

    for pixel in image.pixels_mut() {
        let [r, g, b, _] = pixel.0;
        let (r, g, b) = (f32::from(r), f32::from(g), f32::from(b));
        let luma = 0.2126 * r + 0.7152 * g + 0.0722 * b;

        let adjust = |channel: f32| {
            let saturated = luma + (channel - luma) * saturation;
            NumericValidator::clamp_to_range((saturated * brightness).round(), 0.0, 255.0) as u8
        };

        pixel[0] = adjust(r);
        pixel[1] = adjust(g);
        pixel[2] = adjust(b);
    }
}

/// Soft black shadow derived from the subject's alpha silhouette
///
/// The returned layer is padded so the blur is not clipped; the second value is
/// the padding in pixels, to be subtracted from the layer position.
pub fn build_shadow(subject: &RgbaImage, blur: f32) -> Result<(RgbaImage, u32)> {
    let padding = if blur > 0.0 {
        NumericValidator::validate_f64_to_u32((f64::from(blur) * 3.0).ceil())?
    } else {
        0
    };

    let (width, height) = subject.dimensions();
    let padded_width = width
        .checked_add(NumericValidator::safe_multiply_u32(padding, 2)?)
        .ok_or_else(|| ComposeError::decode_stage_error("shadow", "padded width overflow", None))?;
    let padded_height = height
        .checked_add(NumericValidator::safe_multiply_u32(padding, 2)?)
        .ok_or_else(|| {
            ComposeError::decode_stage_error("shadow", "padded height overflow", None)
        })?;

    let padded_pixels = u64::from(padded_width) * u64::from(padded_height);
    if padded_pixels > MAX_SHADOW_PIXELS {
        return Err(ComposeError::decode_stage_error(
            "shadow",
            &format!(
                "padded layer {}x{} exceeds {} pixels",
                padded_width, padded_height, MAX_SHADOW_PIXELS
            ),
            None,
        ));
    }

    let mut silhouette = RgbaImage::from_pixel(padded_width, padded_height, Rgba([0, 0, 0, 0]));
    for (x, y, pixel) in subject.enumerate_pixels() {
        let alpha = (f32::from(pixel[3]) * SHADOW_OPACITY).round() as u8;
        silhouette.put_pixel(x + padding, y + padding, Rgba([0, 0, 0, alpha]));
    }

    if blur > 0.0 {
        silhouette = imageops::blur(&silhouette, blur);
        // The blur averages color channels too; the shadow must stay pure black.
        for pixel in silhouette.pixels_mut() {
            pixel[0] = 0;
            pixel[1] = 0;
            pixel[2] = 0;
        }
    }

    Ok((silhouette, padding))
}

fn has_transparency(image: &RgbaImage) -> bool {
    image.pixels().any(|pixel| pixel[3] < u8::MAX)
}

/// Compose decoded images
///
/// # Errors
/// - Parameters out of range
/// - Geometry that cannot be represented (reported as a decode error)
pub fn compose_images(
    background: RgbaImage,
    subject: &RgbaImage,
    params: &ComposeParameters,
) -> Result<Composite> {
    params.validate()?;

    let mut canvas = blur_background(background, params.bg_blur);

    let (bg_width, bg_height) = match canvas.dimensions() {
        (0, _) | (_, 0) => {
            warn!("Background reports no dimensions, assuming 1024x1024");
            FALLBACK_BACKGROUND_SIZE
        },
        dims => dims,
    };

    if !has_transparency(subject) {
        warn!("Subject has no transparent pixels; was its background removed?");
    }

    let target = target_width(bg_width, params.scale)?;
    let native_width = subject.width();
    let size = fit_inside(subject.dimensions(), target)?;
    let resized = resize_subject(subject, size);

    let placement = Placement::bottom_center(
        (bg_width, bg_height),
        Some(resized.dimensions()),
        target,
        params.bottom_margin,
    )?;

    debug!(
        background = %format!("{}x{}", bg_width, bg_height),
        subject = %format!("{}x{}", placement.width, placement.height),
        left = placement.left,
        top = placement.top,
        "Computed subject placement"
    );

    // Shadow comes from the silhouette before color adjustment
    let shadow = if params.add_shadow {
        Some(build_shadow(&resized, params.shadow_blur)?)
    } else {
        None
    };

    let mut colored = resized;
    adjust_color(&mut colored, params.saturation, params.brightness);

    if let Some((layer, padding)) = shadow {
        let x = placement.left + i64::from(params.shadow_offset_x) - i64::from(padding);
        let y = placement.top + i64::from(params.shadow_offset_y) - i64::from(padding);
        imageops::overlay(&mut canvas, &layer, x, y);
    }
    imageops::overlay(&mut canvas, &colored, placement.left, placement.top);

    Ok(Composite {
        image: canvas,
        placement,
        native_width,
    })
}

/// Decode both sources, compose them and encode the result as PNG
///
/// # Errors
/// - `ComposeError::Decode` for unsupported bytes on either side
/// - Any error from [`compose_images`]
pub fn compose_bytes(
    background: &[u8],
    subject: &[u8],
    params: &ComposeParameters,
) -> Result<Vec<u8>> {
    let background = ImageCodec::decode_rgba(background, ImageSide::Background)?;
    let subject = ImageCodec::decode_rgba(subject, ImageSide::Subject)?;
    let composite = compose_images(background, &subject, params)?;
    ImageCodec::encode_png(&composite.image)
}

/// Fetching compositor
pub struct Compositor {
    fetcher: Arc<dyn AssetFetcher>,
}

impl Compositor {
    #[must_use]
    pub fn new(fetcher: Arc<dyn AssetFetcher>) -> Self {
        Self { fetcher }
    }

    /// Fetch both sources concurrently and compose them
    ///
    /// # Errors
    /// - `ComposeError::Fetch` naming the side that could not be fetched
    ///   (background reported first when both fail)
    /// - `ComposeError::Decode` for unsupported bytes
    /// - `ComposeError::Validation` for out-of-range parameters
    #[instrument(skip(self, params))]
    pub async fn compose(
        &self,
        subject_url: &str,
        background_url: &str,
        params: &ComposeParameters,
    ) -> Result<Vec<u8>> {
        params.validate()?;
        let started = Instant::now();

        let (background, subject) = futures::join!(
            self.fetcher.fetch(background_url),
            self.fetcher.fetch(subject_url)
        );
        let background =
            background.map_err(|failure| ComposeError::fetch(ImageSide::Background, failure.message))?;
        let subject =
            subject.map_err(|failure| ComposeError::fetch(ImageSide::Subject, failure.message))?;

        debug!(
            background_bytes = background.len(),
            subject_bytes = subject.len(),
            "Fetched composition sources"
        );

        let params = params.clone();
        let encoded = tokio::task::spawn_blocking(move || {
            compose_bytes(&background, &subject, &params)
        })
        .await??;

        info!(
            bytes = encoded.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Composite encoded"
        );
        Ok(encoded)
    }
}
