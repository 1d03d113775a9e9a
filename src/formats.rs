//! Supported image formats and file dialog filters.
//!
//! The table is built once from the codecs compiled into the `image` crate,
//! plus SVG which is rasterized through `resvg`.

use crate::config::VECTOR_FORMAT_EXTENSIONS;
use image::ImageFormat;
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::fmt;

/// Backend used to decode or encode a format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Raster(ImageFormat),
    Svg,
}

/// One entry of the format table.
#[derive(Debug, Clone)]
pub struct FormatInfo {
    pub codec: Codec,
    pub description: &'static str,
    pub extensions: &'static [&'static str],
    pub readable: bool,
    pub writable: bool,
}

static FORMATS: Lazy<Vec<FormatInfo>> = Lazy::new(|| {
    let mut formats: Vec<FormatInfo> = ImageFormat::all()
        .filter(|format| format.reading_enabled() || format.writing_enabled())
        .map(|format| FormatInfo {
            codec: Codec::Raster(format),
            description: describe(format),
            extensions: format.extensions_str(),
            readable: format.reading_enabled(),
            writable: format.writing_enabled(),
        })
        .collect();

    formats.push(FormatInfo {
        codec: Codec::Svg,
        description: "Scalable Vector Graphics",
        extensions: &VECTOR_FORMAT_EXTENSIONS,
        readable: true,
        writable: false,
    });

    log::debug!("Format table initialized with {} formats", formats.len());
    formats
});

fn describe(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "Portable Network Graphics",
        ImageFormat::Jpeg => "Joint Photographic Experts Group",
        ImageFormat::Gif => "Graphics Interchange Format",
        ImageFormat::WebP => "WebP",
        ImageFormat::Bmp => "Windows Bitmap",
        ImageFormat::Tiff => "Tagged Image File Format",
        ImageFormat::Ico => "Windows Icon",
        ImageFormat::Pnm => "Portable Anymap",
        ImageFormat::Tga => "Truevision TGA",
        ImageFormat::Dds => "DirectDraw Surface",
        ImageFormat::Hdr => "Radiance HDR",
        ImageFormat::OpenExr => "OpenEXR",
        ImageFormat::Farbfeld => "Farbfeld",
        ImageFormat::Avif => "AV1 Image File Format",
        ImageFormat::Qoi => "Quite OK Image",
        _ => "Other image format",
    }
}

/// Finds the format entry for a file extension (case-insensitive, without the dot).
pub fn lookup(extension: &str) -> Option<&'static FormatInfo> {
    if extension.is_empty() {
        return None;
    }
    let extension = extension.to_ascii_lowercase();
    FORMATS
        .iter()
        .find(|info| info.extensions.contains(&extension.as_str()))
}

/// Whether files with this extension can be opened.
pub fn is_format_readable(extension: &str) -> bool {
    lookup(extension).is_some_and(|info| info.readable)
}

/// Whether images can be saved with this extension.
pub fn is_format_writable(extension: &str) -> bool {
    lookup(extension).is_some_and(|info| info.writable)
}

/// A named group of extensions for a file dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFilter {
    pub name: String,
    pub extensions: Vec<String>,
}

impl fmt::Display for FileFilter {
    /// Renders as `Description|*.ext1;*.ext2`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|*.{}", self.name, self.extensions.join(";*."))
    }
}

/// Filters for the open dialog.
pub fn open_filters() -> Vec<FileFilter> {
    create_filters(FORMATS.iter().filter(|info| info.readable))
}

/// Filters for the save dialog.
pub fn save_filters() -> Vec<FileFilter> {
    create_filters(FORMATS.iter().filter(|info| info.writable))
}

/// Joins filters into one `|`-separated string.
pub fn filter_string(filters: &[FileFilter]) -> String {
    filters
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("|")
}

/// Builds the "all supported formats" group followed by one group per
/// description, both ordered alphabetically.
fn create_filters<'a>(formats: impl Iterator<Item = &'a FormatInfo>) -> Vec<FileFilter> {
    let mut all_extensions = Vec::new();
    let mut groups: BTreeMap<&str, Vec<String>> = BTreeMap::new();

    for info in formats {
        let group = groups.entry(info.description).or_default();
        for extension in info.extensions {
            group.push(extension.to_string());
            all_extensions.push(extension.to_string());
        }
    }

    all_extensions.sort();
    all_extensions.dedup();

    let mut filters = vec![FileFilter {
        name: "All supported formats".to_string(),
        extensions: all_extensions,
    }];
    filters.extend(groups.into_iter().map(|(name, extensions)| FileFilter {
        name: name.to_string(),
        extensions,
    }));
    filters
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raster_formats_are_readable_and_writable() {
        assert!(is_format_readable("png"));
        assert!(is_format_writable("png"));
        assert!(is_format_readable("JPG"));
        assert!(is_format_writable("jpeg"));
        assert!(is_format_readable("gif"));
    }

    #[test]
    fn svg_is_read_only() {
        assert!(is_format_readable("svg"));
        assert!(is_format_readable("SVGZ"));
        assert!(!is_format_writable("svg"));
    }

    #[test]
    fn unknown_or_empty_extensions_are_rejected() {
        assert!(!is_format_readable("txt"));
        assert!(!is_format_readable(""));
        assert!(!is_format_writable("pdf"));
    }

    #[test]
    fn open_filters_start_with_all_supported_formats() {
        let filters = open_filters();
        let all = &filters[0];

        assert_eq!(all.name, "All supported formats");
        assert!(all.extensions.contains(&"png".to_string()));
        assert!(all.extensions.contains(&"svg".to_string()));

        let mut sorted = all.extensions.clone();
        sorted.sort();
        assert_eq!(all.extensions, sorted);
    }

    #[test]
    fn save_filters_leave_out_read_only_formats() {
        let filters = save_filters();
        assert!(filters.iter().all(|f| !f.extensions.contains(&"svg".to_string())));
        assert!(filters[0].extensions.contains(&"bmp".to_string()));
    }

    #[test]
    fn filter_groups_render_description_and_patterns() {
        let filters = open_filters();
        let png = filters
            .iter()
            .find(|f| f.name == "Portable Network Graphics")
            .unwrap();
        assert_eq!(png.to_string(), "Portable Network Graphics|*.png");

        let svg = filters
            .iter()
            .find(|f| f.name == "Scalable Vector Graphics")
            .unwrap();
        assert_eq!(svg.to_string(), "Scalable Vector Graphics|*.svg;*.svgz");

        let text = filter_string(&filters);
        assert!(text.starts_with("All supported formats|*."));
        assert!(text.contains("|Portable Network Graphics|*.png"));
    }

    #[test]
    fn groups_are_sorted_by_description() {
        let filters = open_filters();
        let names: Vec<_> = filters[1..].iter().map(|f| f.name.clone()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }
}
