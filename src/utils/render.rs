use crate::core::{Frame, RlError, Result};

/// Encode a [`Frame`] to a PNG byte vector.
/// - When the `image` feature is enabled, this will encode using the `image` crate.
/// - Without the feature, returns RlError::NotSupported.
pub fn encode_png(frame: &Frame) -> Result<Vec<u8>> {
    encode_pixels_png(frame)
}

#[cfg(feature = "image")]
fn encode_pixels_png(frame: &Frame) -> Result<Vec<u8>> {
    use image::codecs::png::PngEncoder;
    use image::{ColorType, ImageEncoder};
    use std::io::Cursor;

    let color = match frame.channels {
        1 => ColorType::L8,
        3 => ColorType::Rgb8,
        4 => ColorType::Rgba8,
        c => {
            return Err(RlError::InvalidObservation(format!(
                "cannot encode a {c}-channel frame as PNG"
            )));
        }
    };
    let expected = frame.num_pixels() * frame.channels as usize;
    if frame.data.len() != expected {
        return Err(RlError::InvalidObservation(format!(
            "Pixel data length {} does not match {}x{}x{}",
            frame.data.len(),
            frame.height,
            frame.width,
            frame.channels
        )));
    }

    let mut buf = Vec::new();
    {
        let mut cursor = Cursor::new(&mut buf);
        let encoder = PngEncoder::new(&mut cursor);
        encoder
            .write_image(&frame.data, frame.width, frame.height, color.into())
            .map_err(|e| RlError::Other(format!("PNG encode error: {}", e)))?;
    }
    Ok(buf)
}

#[cfg(not(feature = "image"))]
fn encode_pixels_png(_frame: &Frame) -> Result<Vec<u8>> {
    Err(RlError::NotSupported(
        "PNG encoding requires the `image` feature".into(),
    ))
}

/// Save a [`Frame`] as a PNG file at the given path.
/// Requires the `image` feature; otherwise returns NotSupported.
pub fn save_png<P: AsRef<std::path::Path>>(path: P, frame: &Frame) -> Result<()> {
    let bytes = encode_png(frame)?;
    std::fs::write(path, bytes).map_err(|e| RlError::Other(format!("Failed to write PNG: {}", e)))
}
