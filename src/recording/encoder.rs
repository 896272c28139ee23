//! H.264 encoder wrapper using openh264

use crate::errors::FocusError;
use openh264::encoder::{Encoder, FrameType};
use openh264::formats::YUVBuffer;

/// H.264 encoder for fixed-size RGB frames
pub struct H264Encoder {
    encoder: Encoder,
    width: u32,
    height: u32,
    frame_count: u64,
}

impl H264Encoder {
    /// Create an encoder for `width`x`height` frames.
    ///
    /// Both dimensions must be even for 4:2:0 chroma subsampling.
    pub fn new(width: u32, height: u32) -> Result<Self, FocusError> {
        if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
            return Err(FocusError::Recording(format!(
                "H.264 needs non-zero even dimensions, got {}x{}",
                width, height
            )));
        }

        let encoder = Encoder::new()
            .map_err(|e| FocusError::Recording(format!("Failed to create encoder: {}", e)))?;

        Ok(Self {
            encoder,
            width,
            height,
            frame_count: 0,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Encode an RGB frame into Annex B NAL units
    pub fn encode_rgb(&mut self, rgb_data: &[u8]) -> Result<EncodedFrame, FocusError> {
        let expected_size = (self.width * self.height * 3) as usize;
        if rgb_data.len() != expected_size {
            return Err(FocusError::Recording(format!(
                "Invalid frame size: expected {} bytes, got {}",
                expected_size,
                rgb_data.len()
            )));
        }

        let yuv = rgb_to_yuv420(rgb_data, self.width, self.height);
        let yuv_buffer = YUVBuffer::from_vec(yuv, self.width as usize, self.height as usize);

        let bitstream = self
            .encoder
            .encode(&yuv_buffer)
            .map_err(|e| FocusError::Recording(format!("Encoding failed: {}", e)))?;

        self.frame_count += 1;

        let is_keyframe = matches!(bitstream.frame_type(), FrameType::IDR | FrameType::I);

        Ok(EncodedFrame {
            data: bitstream.to_vec(),
            is_keyframe,
        })
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

/// Result of encoding a single frame
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    /// Encoded H.264 data in Annex B format (with start codes)
    pub data: Vec<u8>,
    pub is_keyframe: bool,
}

/// Drop the last column and/or row of an RGB buffer so both dimensions are even
pub(crate) fn crop_to_even(rgb: &[u8], width: u32, height: u32) -> (Vec<u8>, u32, u32) {
    let even_w = width & !1;
    let even_h = height & !1;
    if even_w == width && even_h == height {
        return (rgb.to_vec(), width, height);
    }

    let src_stride = width as usize * 3;
    let dst_stride = even_w as usize * 3;
    let mut out = Vec::with_capacity(dst_stride * even_h as usize);
    for row in rgb.chunks_exact(src_stride).take(even_h as usize) {
        out.extend_from_slice(&row[..dst_stride]);
    }
    (out, even_w, even_h)
}

/// BT.601 RGB24 to planar YUV 4:2:0
fn rgb_to_yuv420(rgb: &[u8], width: u32, height: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;

    let y_size = w * h;
    let uv_size = (w / 2) * (h / 2);
    let mut yuv = vec![0u8; y_size + uv_size * 2];

    let (y_plane, uv_planes) = yuv.split_at_mut(y_size);
    let (u_plane, v_plane) = uv_planes.split_at_mut(uv_size);

    for y in 0..h {
        for x in 0..w {
            let rgb_idx = (y * w + x) * 3;
            let r = rgb[rgb_idx] as i32;
            let g = rgb[rgb_idx + 1] as i32;
            let b = rgb[rgb_idx + 2] as i32;

            let y_val = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
            y_plane[y * w + x] = y_val.clamp(0, 255) as u8;

            // one chroma sample per 2x2 block
            if y % 2 == 0 && x % 2 == 0 {
                let uv_idx = (y / 2) * (w / 2) + (x / 2);
                let u_val = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
                let v_val = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;
                u_plane[uv_idx] = u_val.clamp(0, 255) as u8;
                v_plane[uv_idx] = v_val.clamp(0, 255) as u8;
            }
        }
    }

    yuv
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_to_yuv420_size() {
        let rgb = vec![128u8; 64 * 48 * 3];
        let yuv = rgb_to_yuv420(&rgb, 64, 48);
        assert_eq!(yuv.len(), 64 * 48 * 3 / 2);
    }

    #[test]
    fn test_crop_to_even() {
        // 3x3 image, rows tagged by value
        let rgb: Vec<u8> = (0..3u8).flat_map(|row| [row; 9]).collect();
        let (cropped, w, h) = crop_to_even(&rgb, 3, 3);
        assert_eq!((w, h), (2, 2));
        assert_eq!(cropped, vec![0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1]);
    }

    #[test]
    fn test_odd_dimensions_rejected() {
        assert!(matches!(
            H264Encoder::new(33, 32),
            Err(FocusError::Recording(_))
        ));
    }

    #[test]
    fn test_encode_frame() {
        let mut encoder = H264Encoder::new(320, 240).expect("Encoder creation failed");
        let rgb = vec![128u8; 320 * 240 * 3];

        let encoded = encoder.encode_rgb(&rgb).expect("Encoding should succeed");
        assert!(!encoded.data.is_empty());
        assert!(
            encoded.data.starts_with(&[0x00, 0x00, 0x00, 0x01])
                || encoded.data.starts_with(&[0x00, 0x00, 0x01]),
            "Should start with Annex B start code"
        );
        assert!(encoded.is_keyframe, "First frame should be a keyframe");
        assert_eq!(encoder.frame_count(), 1);
    }
}
