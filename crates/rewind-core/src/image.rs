//! Image reference parsing.

/// Splits an image reference into repository and version tag.
///
/// The tag separator is the last `:` after the last `/`, so registry
/// host ports are not mistaken for tags.
#[must_use]
pub fn parse(image: &str) -> (&str, Option<&str>) {
    let name_start = image.rfind('/').map_or(0, |i| i + 1);
    match image[name_start..].rfind(':') {
        Some(i) => {
            let split = name_start + i;
            (&image[..split], Some(&image[split + 1..]))
        }
        None => (image, None),
    }
}

/// Returns `true` if the image reference carries a version tag.
#[must_use]
pub fn has_tag(image: &str) -> bool {
    parse(image).1.is_some()
}
