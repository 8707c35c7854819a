//! Distortion map loading
//!
//! Distortion maps are data, not color: they decode into linear RGBA8 and
//! the surface shader reads the red channel as a UV offset.

use std::path::Path;

use image::{DynamicImage, GenericImageView};

use crate::backend::*;
use crate::error::{ReflectorError, ReflectorResult};

/// Format distortion maps are uploaded in
pub const DISTORTION_MAP_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;

/// Decoded RGBA8 pixels
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub name: String,
}

impl TextureData {
    pub fn from_file<P: AsRef<Path>>(path: P) -> ReflectorResult<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("distortion")
            .to_string();

        let bytes = std::fs::read(path).map_err(|source| ReflectorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&bytes, &name)
    }

    /// Decode an encoded image (PNG, JPEG, ...)
    pub fn from_bytes(bytes: &[u8], name: &str) -> ReflectorResult<Self> {
        let img = image::load_from_memory(bytes)?;
        Ok(Self::from_image(img, name))
    }

    fn from_image(img: DynamicImage, name: &str) -> Self {
        let (width, height) = img.dimensions();
        log::debug!("Decoded distortion map '{}' ({}x{})", name, width, height);
        Self {
            width,
            height,
            data: img.to_rgba8().into_raw(),
            name: name.to_string(),
        }
    }

    /// 1x1 map. `[0, 0, 0, 255]` leaves UVs untouched.
    pub fn solid_color(color: [u8; 4], name: &str) -> Self {
        Self {
            width: 1,
            height: 1,
            data: color.to_vec(),
            name: name.to_string(),
        }
    }

    /// Alternating 8x8 texel cells
    pub fn checkerboard(size: u32, color1: [u8; 4], color2: [u8; 4]) -> Self {
        let mut data = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                let color = if ((x / 8) + (y / 8)) % 2 == 0 {
                    color1
                } else {
                    color2
                };
                data.extend_from_slice(&color);
            }
        }

        Self {
            width: size,
            height: size,
            data,
            name: "checkerboard".to_string(),
        }
    }
}

/// Uploaded distortion map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuTexture {
    pub handle: TextureHandle,
    pub view: TextureViewHandle,
    pub width: u32,
    pub height: u32,
}

impl GpuTexture {
    pub fn create<B: GraphicsBackend>(backend: &mut B, data: &TextureData) -> BackendResult<Self> {
        let handle = backend.create_texture(&TextureDescriptor {
            label: Some(data.name.clone()),
            width: data.width,
            height: data.height,
            format: DISTORTION_MAP_FORMAT,
            usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
        })?;

        let view = match backend.create_texture_view(handle) {
            Ok(view) => view,
            Err(err) => {
                backend.destroy_texture(handle);
                return Err(err);
            }
        };
        backend.write_texture(handle, &data.data, data.width, data.height);

        Ok(Self {
            handle,
            view,
            width: data.width,
            height: data.height,
        })
    }

    pub fn destroy<B: GraphicsBackend>(self, backend: &mut B) {
        backend.destroy_texture_view(self.view);
        backend.destroy_texture(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkerboard_cells() {
        let black = [0, 0, 0, 255];
        let white = [255, 255, 255, 255];
        let tex = TextureData::checkerboard(16, black, white);
        assert_eq!(tex.data.len(), 16 * 16 * 4);
        assert_eq!(&tex.data[0..4], &black);
        // First texel of the second cell in row 0
        assert_eq!(&tex.data[8 * 4..8 * 4 + 4], &white);
    }

    #[test]
    fn test_from_bytes_decodes_png() {
        let mut png = Vec::new();
        let img = image::RgbaImage::from_pixel(2, 3, image::Rgba([10, 20, 30, 255]));
        DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let tex = TextureData::from_bytes(&png, "noise").unwrap();
        assert_eq!((tex.width, tex.height), (2, 3));
        assert_eq!(&tex.data[0..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn test_garbage_bytes_are_image_error() {
        assert!(matches!(
            TextureData::from_bytes(b"not an image", "bad"),
            Err(ReflectorError::Image(_))
        ));
    }

    #[test]
    fn test_upload_creates_linear_texture() {
        let mut backend = DummyBackend::new();
        let tex = GpuTexture::create(&mut backend, &TextureData::solid_color([0, 0, 0, 255], "flat"))
            .unwrap();
        assert_eq!(
            backend.texture_descriptor(tex.handle).unwrap().format,
            DISTORTION_MAP_FORMAT
        );
        tex.destroy(&mut backend);
        assert_eq!(backend.live_texture_count(), 0);
    }
}
