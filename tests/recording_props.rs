//! Property-based tests for the MP4 session recorder
//!
//! Run with: cargo test --test recording_props --features recording

use proptest::prelude::*;
use tempfile::tempdir;

#[cfg(feature = "recording")]
mod recording_tests {
    use super::*;
    use crabfocus::platform::FrameRecorder;
    use crabfocus::recording::{H264Encoder, Mp4Recorder, RecordingConfig};
    use crabfocus::CameraFrame;
    use image::{Rgb, RgbImage};

    fn solid_frame(width: u32, height: u32, rgb: [u8; 3]) -> CameraFrame {
        CameraFrame::from_rgb_image(
            RgbImage::from_pixel(width, height, Rgb(rgb)),
            "props".to_string(),
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        /// The first encoded frame is always a keyframe
        #[test]
        fn first_frame_is_keyframe(r in 0u8..255, g in 0u8..255, b in 0u8..255) {
            let mut encoder = H264Encoder::new(160, 120).expect("encoder");
            let frame = solid_frame(160, 120, [r, g, b]);
            let encoded = encoder.encode_rgb(&frame.data).expect("encode");
            prop_assert!(encoded.is_keyframe);
        }

        /// Any frame size is accepted; odd sizes are cropped, not rejected
        #[test]
        fn recorder_accepts_any_size(width in 16u32..200, height in 16u32..150) {
            let dir = tempdir().expect("tempdir");
            let mut recorder = Mp4Recorder::new(dir.path().join("any.mp4"), RecordingConfig::default())
                .expect("recorder");
            let frame = solid_frame(width, height, [90, 120, 200]);
            prop_assert!(recorder.record(&frame).is_ok());
            prop_assert!(recorder.finish().is_ok());
        }

        /// Every frame is either muxed or counted as dropped
        #[test]
        fn frames_are_accounted_for(frame_count in 1usize..20) {
            let dir = tempdir().expect("tempdir");
            let output = dir.path().join("count.mp4");
            let mut recorder = Mp4Recorder::new(&output, RecordingConfig::new(30.0))
                .expect("recorder");

            for i in 0..frame_count {
                let gray = ((i * 17) % 256) as u8;
                recorder.record(&solid_frame(160, 120, [gray; 3])).expect("record");
            }
            recorder.finish().expect("finish");

            let stats = recorder.stats().expect("stats");
            prop_assert_eq!((stats.video_frames + stats.dropped_frames) as usize, frame_count);
            prop_assert!(stats.bytes_written > 0);
            prop_assert!(stats.bytes_written < (160 * 120 * 3 * frame_count) as u64);
        }
    }
}
