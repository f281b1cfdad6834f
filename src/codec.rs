//! Decoding uploads into rasters and encoding the result as PNG.

use tracing::debug;

use crate::error::DecodeError;
use crate::raster::Raster;

/// Decodes any format the `image` crate recognizes into an RGBA raster.
///
/// Sources without alpha get an opaque alpha channel.
pub fn decode(bytes: &[u8]) -> Result<Raster, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    let img = image::load_from_memory(bytes)?;
    debug!(width = img.width(), height = img.height(), color = ?img.color(), "Decoded image");
    let raster = img.to_rgba8();
    if raster.width() == 0 || raster.height() == 0 {
        return Err(DecodeError::ZeroSized);
    }
    Ok(raster)
}

/// Encodes a raster as an 8-bit RGBA PNG, byte for byte.
pub fn encode(raster: &Raster) -> Result<Vec<u8>, png::EncodingError> {
    let mut buffer = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut buffer, raster.width(), raster.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_compression(png::Compression::Best);

        let mut writer = encoder.write_header()?;
        writer.write_image_data(raster.as_raw())?;
        writer.finish()?;
    }
    debug!(bytes = buffer.len(), "PNG encoding complete");
    Ok(buffer)
}
