// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Colour profile state of a job, and the built-in sRGB to CIE transform.
//
// The transform is built at most once, on the first page that needs it,
// and released when the job ends.

use std::path::PathBuf;

use rasterwerk_core::{ColorSpace, JobOptions, PageHeader, RasterError, RenderingIntent, Result};
use rasterwerk_raster::cspace::{encode_cie, D65_WHITE};
use rasterwerk_raster::{ColorTransform, IccEncoding};
use tracing::{debug, info};

use crate::collab::{ColorManager, ErrorSink, IccEngine, PpdResolver};

/// Destination of a colour transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileTarget {
    /// A device profile on disk.
    File(PathBuf),
    /// The CIE L*a*b* encoding of the raster format.
    Lab,
    /// The CIE XYZ encoding of the raster format.
    Xyz,
}

/// Everything an [`IccEngine`] needs to build a transform.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformRequest {
    /// Input profile; `None` means sRGB.
    pub source: Option<PathBuf>,
    pub target: ProfileTarget,
    pub encoding: IccEncoding,
    /// Device channels produced per pixel.
    pub channels: u32,
    pub intent: RenderingIntent,
}

/// Profiles, intent and the lazily built transform of one job.
pub struct ColorProfileState {
    destination: Option<ProfileTarget>,
    source: Option<PathBuf>,
    intent: RenderingIntent,
    cm_disabled: bool,
    encoding: Option<IccEncoding>,
    channels: u32,
    transform: Option<Box<dyn ColorTransform>>,
}

impl ColorProfileState {
    /// Decide whether the job is colour managed and against what.
    ///
    /// CIE Lab and XYZ output always go through a transform. Other spaces
    /// do when colour management is on and the colour manager knows a
    /// profile other than the input profile.
    pub fn setup(
        header: &PageHeader,
        options: &JobOptions,
        ppd: Option<&dyn PpdResolver>,
        manager: Option<&dyn ColorManager>,
    ) -> Result<Self> {
        let calibrating = ppd.is_some_and(|p| p.color_calibration());
        let cm_disabled = calibrating || manager.is_some_and(|m| m.is_cm_disabled());
        let wide = header.bits_per_color == 16;
        let cs = header.color_space;

        let (destination, encoding) = match cs {
            ColorSpace::CieLab => (
                Some(ProfileTarget::Lab),
                Some(if wide { IccEncoding::Lab16 } else { IccEncoding::Lab8 }),
            ),
            ColorSpace::CieXyz => (
                Some(ProfileTarget::Xyz),
                Some(if wide { IccEncoding::Xyz16 } else { IccEncoding::Xyz8 }),
            ),
            ColorSpace::KcmyLight => (None, None),
            _ if cm_disabled => (None, None),
            _ => {
                let media = options.media_type.as_deref().unwrap_or_default();
                let path = manager.and_then(|m| m.icc_profile_path(cs, media, header.hw_resolution));
                match path {
                    Some(path) if Some(&path) != options.source_profile.as_ref() => (
                        Some(ProfileTarget::File(path)),
                        Some(if wide { IccEncoding::Device16 } else { IccEncoding::Device8 }),
                    ),
                    _ => (None, None),
                }
            }
        };
        if encoding == Some(IccEncoding::Device16) && header.bits_per_color != 16 {
            return Err(RasterError::UnsupportedDepth {
                color_space: cs,
                bits_per_color: header.bits_per_color,
            });
        }
        debug!(
            calibrating,
            cm_disabled,
            destination = ?destination,
            "colour management set up"
        );
        Ok(Self {
            destination,
            source: options.source_profile.clone(),
            intent: options.rendering_intent,
            cm_disabled,
            encoding,
            channels: header.num_colors,
            transform: None,
        })
    }

    /// Encoding the pixel conversion has to produce, when colour managed.
    pub fn encoding(&self) -> Option<IccEncoding> {
        self.encoding
    }

    pub fn destination(&self) -> Option<&ProfileTarget> {
        self.destination.as_ref()
    }

    pub fn cm_disabled(&self) -> bool {
        self.cm_disabled
    }

    pub fn intent(&self) -> RenderingIntent {
        self.intent
    }

    /// Build the transform unless the job needs none or it exists already.
    pub fn ensure_transform(&mut self, engine: &dyn IccEngine, sink: &dyn ErrorSink) -> Result<()> {
        let (Some(target), Some(encoding)) = (&self.destination, self.encoding) else {
            return Ok(());
        };
        if self.transform.is_some() {
            return Ok(());
        }
        let request = TransformRequest {
            source: self.source.clone(),
            target: target.clone(),
            encoding,
            channels: self.channels,
            intent: self.intent,
        };
        let transform = engine.create_transform(&request, sink)?;
        info!(target = ?request.target, ?encoding, intent = ?request.intent, "colour transform built");
        self.transform = Some(transform);
        Ok(())
    }

    pub fn transform(&self) -> Option<&dyn ColorTransform> {
        self.transform.as_deref()
    }

    /// Drop the transform at the end of the job.
    pub fn release(&mut self) {
        if self.transform.take().is_some() {
            debug!("colour transform released");
        }
    }
}

/// Engine for the transforms that need no profile file: sRGB to the CIE
/// Lab and XYZ encodings.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinCieEngine;

impl IccEngine for BuiltinCieEngine {
    fn create_transform(
        &self,
        request: &TransformRequest,
        sink: &dyn ErrorSink,
    ) -> Result<Box<dyn ColorTransform>> {
        match (&request.source, &request.target) {
            (None, ProfileTarget::Lab | ProfileTarget::Xyz) => Ok(Box::new(SrgbToCie)),
            (source, target) => {
                let message = format!(
                    "no built-in transform from {} to {:?}; an ICC engine is required",
                    source
                        .as_ref()
                        .map_or_else(|| "sRGB".to_string(), |p| p.display().to_string()),
                    target
                );
                sink.report(&message);
                Err(RasterError::ColorManagement(message))
            }
        }
    }
}

struct SrgbToCie;

impl ColorTransform for SrgbToCie {
    fn apply(&self, src: &[u8], dst: &mut [u8]) {
        encode_cie(srgb_to_lab(src), IccEncoding::Lab8, dst);
    }

    fn apply_lab(&self, src: &[u8]) -> [f64; 3] {
        srgb_to_lab(src)
    }
}

fn linear(v: u8) -> f64 {
    let c = v as f64 / 255.0;
    if c <= 0.040_45 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// sRGB to L*a*b* relative to the D65 white.
pub fn srgb_to_lab(rgb: &[u8]) -> [f64; 3] {
    let (r, g, b) = (linear(rgb[0]), linear(rgb[1]), linear(rgb[2]));
    let xyz = [
        0.412_456_4 * r + 0.357_576_1 * g + 0.180_437_5 * b,
        0.212_672_9 * r + 0.715_152_2 * g + 0.072_175_0 * b,
        0.019_333_9 * r + 0.119_192_0 * g + 0.950_304_1 * b,
    ];
    const EPSILON: f64 = 216.0 / 24389.0;
    let f = |t: f64| {
        if t > EPSILON {
            t.cbrt()
        } else {
            t * 841.0 / 108.0 + 4.0 / 29.0
        }
    };
    let fx = f(xyz[0] / D65_WHITE[0]);
    let fy = f(xyz[1] / D65_WHITE[1]);
    let fz = f(xyz[2] / D65_WHITE[2]);
    [116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::{IccProfileEntry, PrinterDescription};
    use std::cell::RefCell;

    #[derive(Default)]
    struct Collect(RefCell<Vec<String>>);

    impl ErrorSink for Collect {
        fn report(&self, message: &str) {
            self.0.borrow_mut().push(message.to_string());
        }
    }

    fn header(cs: ColorSpace, bits: u32) -> PageHeader {
        let mut h = PageHeader {
            color_space: cs,
            bits_per_color: bits,
            ..PageHeader::default()
        };
        h.update_derived();
        h
    }

    fn profiled_printer() -> PrinterDescription {
        PrinterDescription {
            icc_profiles: vec![IccProfileEntry {
                color_space: Some(ColorSpace::Cmyk),
                media_type: None,
                resolution: None,
                path: PathBuf::from("/profiles/cmyk.icc"),
            }],
            ..PrinterDescription::default()
        }
    }

    #[test]
    fn lab_output_is_always_managed() {
        let printer = PrinterDescription {
            cm_disabled: true,
            ..PrinterDescription::default()
        };
        let state = ColorProfileState::setup(
            &header(ColorSpace::CieLab, 16),
            &JobOptions::default(),
            Some(&printer),
            Some(&printer),
        )
        .unwrap();
        assert_eq!(state.destination(), Some(&ProfileTarget::Lab));
        assert_eq!(state.encoding(), Some(IccEncoding::Lab16));
    }

    #[test]
    fn device_profile_from_colour_manager() {
        let printer = profiled_printer();
        let state = ColorProfileState::setup(
            &header(ColorSpace::Cmyk, 8),
            &JobOptions::default(),
            Some(&printer),
            Some(&printer),
        )
        .unwrap();
        assert_eq!(
            state.destination(),
            Some(&ProfileTarget::File(PathBuf::from("/profiles/cmyk.icc")))
        );
        assert_eq!(state.encoding(), Some(IccEncoding::Device8));
    }

    #[test]
    fn calibration_mode_disables_profiles() {
        let printer = PrinterDescription {
            color_calibration: true,
            ..profiled_printer()
        };
        let state = ColorProfileState::setup(
            &header(ColorSpace::Cmyk, 8),
            &JobOptions::default(),
            Some(&printer),
            Some(&printer),
        )
        .unwrap();
        assert!(state.cm_disabled());
        assert_eq!(state.encoding(), None);
    }

    #[test]
    fn same_profile_on_both_ends_needs_no_transform() {
        let printer = profiled_printer();
        let options = JobOptions {
            source_profile: Some(PathBuf::from("/profiles/cmyk.icc")),
            ..JobOptions::default()
        };
        let state = ColorProfileState::setup(
            &header(ColorSpace::Cmyk, 8),
            &options,
            Some(&printer),
            Some(&printer),
        )
        .unwrap();
        assert_eq!(state.destination(), None);
    }

    #[test]
    fn transform_is_built_once() {
        let mut state = ColorProfileState::setup(
            &header(ColorSpace::CieLab, 8),
            &JobOptions::default(),
            None,
            None,
        )
        .unwrap();
        let sink = Collect::default();
        assert!(state.transform().is_none());
        state.ensure_transform(&BuiltinCieEngine, &sink).unwrap();
        let first = state.transform().map(|t| t as *const dyn ColorTransform as *const u8);
        state.ensure_transform(&BuiltinCieEngine, &sink).unwrap();
        let second = state.transform().map(|t| t as *const dyn ColorTransform as *const u8);
        assert!(first.is_some());
        assert_eq!(first, second);
        state.release();
        assert!(state.transform().is_none());
    }

    #[test]
    fn builtin_engine_reports_unsupported_profiles() {
        let printer = profiled_printer();
        let mut state = ColorProfileState::setup(
            &header(ColorSpace::Cmyk, 8),
            &JobOptions::default(),
            Some(&printer),
            Some(&printer),
        )
        .unwrap();
        let sink = Collect::default();
        let err = state.ensure_transform(&BuiltinCieEngine, &sink).unwrap_err();
        assert!(matches!(err, RasterError::ColorManagement(_)));
        assert_eq!(sink.0.borrow().len(), 1);
        assert!(sink.0.borrow()[0].contains("cmyk.icc"));
    }

    #[test]
    fn srgb_white_and_black() {
        let white = srgb_to_lab(&[255, 255, 255]);
        assert!((white[0] - 100.0).abs() < 1e-3);
        assert!(white[1].abs() < 1e-3 && white[2].abs() < 1e-3);
        let black = srgb_to_lab(&[0, 0, 0]);
        assert!(black[0].abs() < 1e-9);

        let mut out = [0u8; 3];
        SrgbToCie.apply(&[255, 255, 255], &mut out);
        assert_eq!(out, [255, 128, 128]);
    }
}
