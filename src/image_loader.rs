//! Decoding and encoding through the imaging crates.
//!
//! Raster formats go through `image`; SVG is rasterized with `resvg` at the
//! density requested in [`ReadSettings`].

use crate::config::{SVG_BASE_DPI, VECTOR_FORMAT_DENSITY, VECTOR_FORMAT_EXTENSIONS};
use crate::error::{AppError, Result};
use crate::file_utils::PathExt;
use crate::formats::{self, Codec};
use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::codecs::png::PngDecoder;
use image::codecs::webp::WebPDecoder;
use image::{AnimationDecoder, DynamicImage, ImageFormat, ImageReader, RgbaImage};
use resvg::usvg;
use slint::{Image, Rgba8Pixel, SharedPixelBuffer};
use std::fmt::Display;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// One decoded page or animation frame.
pub type Frame = Arc<RgbaImage>;

/// All frames decoded from one file.
#[derive(Debug, Clone, Default)]
pub struct ImageSet {
    format: String,
    frames: Vec<Frame>,
}

impl ImageSet {
    pub fn new(format: impl Into<String>, frames: Vec<Frame>) -> Self {
        Self {
            format: format.into(),
            frames,
        }
    }

    /// Upper-case format label, e.g. `PNG`.
    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Options passed to the decoder.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReadSettings {
    /// Rasterization density in DPI for vector input.
    pub density: Option<f32>,
}

impl ReadSettings {
    /// Picks the settings for a file: vector formats get a higher density.
    pub fn for_path(path: &Path) -> Self {
        let is_vector = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .is_some_and(|ext| VECTOR_FORMAT_EXTENSIONS.contains(&ext.as_str()));

        Self {
            density: is_vector.then_some(VECTOR_FORMAT_DENSITY),
        }
    }
}

/// Turns a file into an [`ImageSet`].
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, path: &Path, settings: &ReadSettings) -> Result<ImageSet>;
}

/// Decoder backed by `image` and `resvg`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LibraryDecoder;

impl ImageDecoder for LibraryDecoder {
    fn decode(&self, path: &Path, settings: &ReadSettings) -> Result<ImageSet> {
        decode_file(path, settings)
    }
}

fn load_error(err: impl Display) -> AppError {
    AppError::ImageLoad(err.to_string())
}

fn save_error(err: impl Display) -> AppError {
    AppError::ImageSave(err.to_string())
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

fn open_buffered(path: &Path) -> Result<BufReader<File>> {
    File::open(path).map(BufReader::new).map_err(load_error)
}

/// Decodes every frame of a file.
pub fn decode_file(path: &Path, settings: &ReadSettings) -> Result<ImageSet> {
    let start = Instant::now();
    let extension = extension_of(path);
    let info = formats::lookup(&extension)
        .filter(|info| info.readable)
        .ok_or_else(|| AppError::UnsupportedFormat(extension.clone()))?;

    let images = match info.codec {
        Codec::Svg => decode_svg(path, settings.density.unwrap_or(SVG_BASE_DPI))?,
        Codec::Raster(_) => decode_raster(path)?,
    };

    log::debug!(
        "Decoded {} ({} frame(s), {}) in {:?}",
        path.format_for_log(),
        images.len(),
        images.format(),
        start.elapsed()
    );
    Ok(images)
}

fn decode_frames<'a>(decoder: impl AnimationDecoder<'a>) -> Result<Vec<Frame>> {
    let frames = decoder.into_frames().collect_frames()?;
    Ok(frames
        .into_iter()
        .map(|frame| Arc::new(frame.into_buffer()))
        .collect())
}

fn decode_raster(path: &Path) -> Result<ImageSet> {
    let reader = ImageReader::open(path)
        .map_err(load_error)?
        .with_guessed_format()
        .map_err(load_error)?;
    let format = reader
        .format()
        .ok_or_else(|| AppError::ImageLoad("Unrecognized image data".to_string()))?;

    let frames = match format {
        ImageFormat::Gif => decode_frames(GifDecoder::new(open_buffered(path)?)?)?,
        ImageFormat::WebP => {
            let decoder = WebPDecoder::new(open_buffered(path)?)?;
            if decoder.has_animation() {
                decode_frames(decoder)?
            } else {
                vec![Arc::new(reader.decode()?.to_rgba8())]
            }
        }
        ImageFormat::Png => {
            let decoder = PngDecoder::new(open_buffered(path)?)?;
            if decoder.is_apng()? {
                decode_frames(decoder.apng()?)?
            } else {
                vec![Arc::new(reader.decode()?.to_rgba8())]
            }
        }
        _ => vec![Arc::new(reader.decode()?.to_rgba8())],
    };

    if frames.is_empty() {
        return Err(AppError::ImageLoad("File contains no frames".to_string()));
    }

    Ok(ImageSet::new(format!("{:?}", format).to_uppercase(), frames))
}

fn decode_svg(path: &Path, density: f32) -> Result<ImageSet> {
    let svg_data = fs::read(path).map_err(load_error)?;
    let options = usvg::Options {
        dpi: density,
        ..usvg::Options::default()
    };
    let tree = usvg::Tree::from_data(&svg_data, &options).map_err(load_error)?;

    let scale = density / SVG_BASE_DPI;
    let size = tree.size();
    let width = (size.width() * scale).ceil() as u32;
    let height = (size.height() * scale).ceil() as u32;
    if width == 0 || height == 0 {
        return Err(AppError::ImageLoad("SVG has empty dimensions".to_string()));
    }

    let mut pixmap = tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| AppError::ImageLoad("Failed to allocate SVG pixmap".to_string()))?;
    resvg::render(
        &tree,
        tiny_skia::Transform::from_scale(scale, scale),
        &mut pixmap.as_mut(),
    );

    // tiny-skia stores premultiplied alpha
    let data: Vec<u8> = pixmap
        .pixels()
        .iter()
        .flat_map(|pixel| {
            let color = pixel.demultiply();
            [color.red(), color.green(), color.blue(), color.alpha()]
        })
        .collect();
    let image = RgbaImage::from_raw(width, height, data)
        .ok_or_else(|| AppError::ImageLoad("SVG buffer size mismatch".to_string()))?;

    Ok(ImageSet::new("SVG", vec![Arc::new(image)]))
}

/// Writes an image set to `path`, picking the codec from the extension.
///
/// Multi-frame sets saved as GIF keep all frames; every other target gets
/// the frame at `frame_index`.
pub fn encode(images: &ImageSet, frame_index: usize, path: &Path) -> Result<()> {
    let extension = extension_of(path);
    let format = match formats::lookup(&extension) {
        Some(info) if info.writable => match info.codec {
            Codec::Raster(format) => format,
            Codec::Svg => return Err(AppError::UnsupportedFormat(extension)),
        },
        _ => return Err(AppError::UnsupportedFormat(extension)),
    };

    if format == ImageFormat::Gif && images.len() > 1 {
        let file = File::create(path).map_err(save_error)?;
        let mut encoder = GifEncoder::new(BufWriter::new(file));
        encoder.set_repeat(Repeat::Infinite).map_err(save_error)?;
        encoder
            .encode_frames(
                images
                    .frames()
                    .iter()
                    .map(|frame| image::Frame::new(frame.as_ref().clone())),
            )
            .map_err(save_error)?;
        return Ok(());
    }

    let frame = images
        .frame(frame_index)
        .ok_or_else(|| AppError::ImageSave("No image loaded".to_string()))?;
    let image = DynamicImage::ImageRgba8(frame.as_ref().clone());
    // JPEG has no alpha channel
    let image = if format == ImageFormat::Jpeg {
        DynamicImage::ImageRgb8(image.to_rgb8())
    } else {
        image
    };

    image.save_with_format(path, format).map_err(save_error)
}

/// Copies a frame into a Slint image.
pub fn create_slint_image(frame: &RgbaImage) -> Image {
    let buffer = SharedPixelBuffer::<Rgba8Pixel>::clone_from_slice(
        frame.as_raw(),
        frame.width(),
        frame.height(),
    );
    Image::from_rgba8(buffer)
}
