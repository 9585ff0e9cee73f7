//! V4L2 camera capture via the `v4l` crate.

use crate::frame::{self, Frame};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("streaming not supported")]
    StreamingNotSupported,
    #[error("frame source unavailable after {attempts} attempts")]
    SourceUnavailable { attempts: u32 },
}

/// Negotiated pixel format for the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed (2 bytes/pixel, extract Y channel).
    Yuyv,
    /// 8-bit grayscale (1 byte/pixel).
    Grey,
}

/// Anything the capture loop can pull frames from. The production
/// implementation is [`Camera`]; tests script their own source.
pub trait FrameSource {
    fn capture(&mut self) -> Result<Frame, CameraError>;
}

/// Bounded retry around a frame source: up to `attempts` tries with a
/// fixed `delay` between them before the source is treated as
/// unavailable. Exhaustion is fatal to the caller's loop.
pub fn capture_with_retry<S: FrameSource>(
    source: &mut S,
    attempts: u32,
    delay: Duration,
) -> Result<Frame, CameraError> {
    for attempt in 1..=attempts {
        match source.capture() {
            Ok(frame) => return Ok(frame),
            Err(err) => {
                tracing::warn!(attempt, attempts, error = %err, "frame capture failed");
                if attempt < attempts {
                    std::thread::sleep(delay);
                }
            }
        }
    }
    Err(CameraError::SourceUnavailable { attempts })
}

/// V4L2 camera device handle.
pub struct Camera {
    device: Device,
    pub width: u32,
    pub height: u32,
    pub device_path: String,
    pixel_format: PixelFormat,
}

impl Camera {
    /// Open a V4L2 camera device by path (e.g., "/dev/video0").
    pub fn open(device_path: &str) -> Result<Self, CameraError> {
        if !Path::new(device_path).exists() {
            return Err(CameraError::DeviceNotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path).map_err(|e| {
            if e.to_string().contains("busy") || e.to_string().contains("EBUSY") {
                CameraError::DeviceBusy
            } else {
                CameraError::DeviceNotFound(format!("{device_path}: {e}"))
            }
        })?;

        let caps = device.query_caps().map_err(|e| {
            CameraError::CaptureFailed(format!("failed to query capabilities: {e}"))
        })?;

        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            return Err(CameraError::StreamingNotSupported);
        }

        // Ask for YUYV; accept GREY if the driver negotiates it instead.
        let mut fmt = device.format().map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to get format: {e}"))
        })?;
        fmt.fourcc = FourCC::new(b"YUYV");

        let negotiated = device.set_format(&fmt).map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to set format: {e}"))
        })?;

        let pixel_format = if negotiated.fourcc == FourCC::new(b"GREY") {
            PixelFormat::Grey
        } else if negotiated.fourcc == FourCC::new(b"YUYV") {
            PixelFormat::Yuyv
        } else {
            return Err(CameraError::FormatNegotiationFailed(format!(
                "unsupported pixel format: {:?} (need YUYV or GREY)",
                negotiated.fourcc
            )));
        };

        tracing::info!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            width = negotiated.width,
            height = negotiated.height,
            fourcc = ?negotiated.fourcc,
            "camera opened"
        );

        Ok(Self {
            device,
            width: negotiated.width,
            height: negotiated.height,
            device_path: device_path.to_string(),
            pixel_format,
        })
    }

    /// Capture a single frame, converting to grayscale if needed.
    pub fn capture_frame(&mut self) -> Result<Frame, CameraError> {
        let mut stream =
            MmapStream::with_buffers(&self.device, BufType::VideoCapture, 4).map_err(|e| {
                CameraError::CaptureFailed(format!("failed to create mmap stream: {e}"))
            })?;

        let (buf, meta) = stream
            .next()
            .map_err(|e| CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}")))?;

        let gray = self.buf_to_grayscale(buf)?;

        Ok(Frame {
            data: gray,
            width: self.width,
            height: self.height,
            timestamp: std::time::Instant::now(),
            sequence: meta.sequence,
        })
    }

    fn buf_to_grayscale(&self, buf: &[u8]) -> Result<Vec<u8>, CameraError> {
        let pixels = (self.width * self.height) as usize;
        match self.pixel_format {
            PixelFormat::Grey => {
                if buf.len() < pixels {
                    return Err(CameraError::CaptureFailed(format!(
                        "GREY buffer too short: expected {pixels}, got {}",
                        buf.len()
                    )));
                }
                Ok(buf[..pixels].to_vec())
            }
            PixelFormat::Yuyv => frame::yuyv_to_grayscale(buf, self.width, self.height)
                .map_err(|e| CameraError::CaptureFailed(format!("YUYV conversion failed: {e}"))),
        }
    }
}

impl FrameSource for Camera {
    fn capture(&mut self) -> Result<Frame, CameraError> {
        self.capture_frame()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scripted source: fails `failures` times, then succeeds.
    struct FlakySource {
        failures: u32,
        calls: u32,
    }

    impl FrameSource for FlakySource {
        fn capture(&mut self) -> Result<Frame, CameraError> {
            self.calls += 1;
            if self.calls <= self.failures {
                Err(CameraError::CaptureFailed("scripted".into()))
            } else {
                Ok(Frame {
                    data: vec![0; 4],
                    width: 2,
                    height: 2,
                    timestamp: std::time::Instant::now(),
                    sequence: self.calls,
                })
            }
        }
    }

    #[test]
    fn test_retry_recovers_within_budget() {
        let mut source = FlakySource { failures: 2, calls: 0 };
        let frame = capture_with_retry(&mut source, 3, Duration::ZERO).unwrap();
        assert_eq!(frame.sequence, 3);
        assert_eq!(source.calls, 3);
    }

    #[test]
    fn test_retry_exhaustion_is_fatal() {
        let mut source = FlakySource { failures: 10, calls: 0 };
        let err = capture_with_retry(&mut source, 3, Duration::ZERO).unwrap_err();
        assert!(matches!(err, CameraError::SourceUnavailable { attempts: 3 }));
        assert_eq!(source.calls, 3);
    }

    #[test]
    fn test_retry_first_try_success_makes_one_call() {
        let mut source = FlakySource { failures: 0, calls: 0 };
        capture_with_retry(&mut source, 5, Duration::ZERO).unwrap();
        assert_eq!(source.calls, 1);
    }
}
