// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-pixel colour space conversion — the fixed RGB/gray routines, the
// profile-driven path and the fixed-point CIE Lab / XYZ encodings.

use rasterwerk_core::{ColorSpace, RasterError, Result};

use crate::bits::threshold;

/// D65 reference white used when encoding CIE XYZ.
pub const D65_WHITE: [f64; 3] = [0.950_47, 1.0, 1.088_83];

/// XYZ scale for 8-bit output (255 / 1.1).
pub const XYZ_SCALE_8: f64 = 231.8181;
/// XYZ scale for 16-bit output (65535 / 1.1).
pub const XYZ_SCALE_16: f64 = 59577.2727;
/// L* scale for 8-bit output.
pub const LAB_L_SCALE_8: f64 = 2.55;
/// L* scale for 16-bit output.
pub const LAB_L_SCALE_16: f64 = 655.35;

/// A built colour transform. Created once per job by an ICC engine and
/// shared by every page.
pub trait ColorTransform {
    /// Transform one source pixel into device samples (8 or 16 bit,
    /// big-endian, as requested when the transform was built).
    fn apply(&self, src: &[u8], dst: &mut [u8]);

    /// Transform one source pixel into CIE L*a*b* relative to [`D65_WHITE`].
    fn apply_lab(&self, src: &[u8]) -> [f64; 3];
}

/// Output encoding of a profile-driven conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IccEncoding {
    /// Device samples, 8 bits per channel.
    Device8,
    /// Device samples, 16 bits per channel.
    Device16,
    Lab8,
    Lab16,
    Xyz8,
    Xyz16,
}

impl IccEncoding {
    /// Whether the transform has to produce Lab doubles.
    pub fn wants_lab(self) -> bool {
        !matches!(self, Self::Device8 | Self::Device16)
    }
}

/// Per-pixel conversion from the pivot format (8-bit RGB or 8-bit gray) to
/// device samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelConversion {
    RgbCopy,
    RgbToCmy,
    RgbToYmc,
    RgbToCmyk,
    /// CMYK with K rotated to the front.
    RgbToKcmy,
    /// CMYK reordered Y, M, C, K (also gold/silver four-ink spaces).
    RgbToYmck,
    /// RGB plus an opaque alpha channel.
    RgbToRgba,
    /// Inverted CMYK.
    RgbToRgbw,
    /// Dithered six-ink halftone producing one final byte per pixel.
    RgbToKcmyLight,
    GrayCopy,
    /// Gray to ink amount.
    GrayInvert,
    /// Profile-driven; needs a built transform.
    Icc {
        channels: u32,
        encoding: IccEncoding,
    },
}

impl PixelConversion {
    /// Fixed routine for a destination colour space. Profile-driven spaces
    /// have no fixed routine and are a configuration error here.
    pub fn for_color_space(color_space: ColorSpace) -> Result<Self> {
        Ok(match color_space {
            ColorSpace::Rgb | ColorSpace::Srgb | ColorSpace::AdobeRgb => Self::RgbCopy,
            ColorSpace::Cmy => Self::RgbToCmy,
            ColorSpace::Ymc => Self::RgbToYmc,
            ColorSpace::Cmyk => Self::RgbToCmyk,
            ColorSpace::Kcmy => Self::RgbToKcmy,
            ColorSpace::Ymck | ColorSpace::Gmck | ColorSpace::Gmcs => Self::RgbToYmck,
            ColorSpace::Rgba => Self::RgbToRgba,
            ColorSpace::Rgbw => Self::RgbToRgbw,
            ColorSpace::KcmyLight => Self::RgbToKcmyLight,
            ColorSpace::W | ColorSpace::Sw | ColorSpace::White => Self::GrayCopy,
            ColorSpace::K | ColorSpace::Gold | ColorSpace::Silver => Self::GrayInvert,
            other => return Err(RasterError::UnsupportedColorSpace(other)),
        })
    }

    /// Bytes per pivot pixel this conversion reads.
    pub fn source_channels(self) -> usize {
        match self {
            Self::GrayCopy | Self::GrayInvert => 1,
            _ => 3,
        }
    }

    /// Whether the output is already in its final packed form.
    pub fn produces_final(self) -> bool {
        match self {
            Self::RgbToKcmyLight => true,
            Self::Icc { encoding, .. } => encoding != IccEncoding::Device8,
            _ => false,
        }
    }

    pub fn needs_transform(self) -> bool {
        matches!(self, Self::Icc { .. })
    }

    /// Bind the conversion to the job's transform.
    pub fn bind<'a>(self, transform: Option<&'a dyn ColorTransform>) -> Result<PixelConverter<'a>> {
        if self.needs_transform() && transform.is_none() {
            return Err(RasterError::ColorManagement(
                "colour transform requested before it was built".into(),
            ));
        }
        Ok(PixelConverter {
            conversion: self,
            transform,
        })
    }
}

/// A [`PixelConversion`] ready to run.
pub struct PixelConverter<'a> {
    conversion: PixelConversion,
    transform: Option<&'a dyn ColorTransform>,
}

impl PixelConverter<'_> {
    pub fn conversion(&self) -> PixelConversion {
        self.conversion
    }

    /// Convert the pivot pixel `src` at `(x, y)` into `dst`. Returns the
    /// number of bytes written.
    pub fn convert(&self, src: &[u8], dst: &mut [u8], x: u32, y: u32) -> usize {
        match self.conversion {
            PixelConversion::RgbCopy => {
                dst[..3].copy_from_slice(&src[..3]);
                3
            }
            PixelConversion::RgbToCmy => {
                rgb_to_cmy(src, dst);
                3
            }
            PixelConversion::RgbToYmc => {
                rgb_to_cmy(src, dst);
                dst.swap(0, 2);
                3
            }
            PixelConversion::RgbToCmyk => {
                rgb_to_cmyk(src, dst);
                4
            }
            PixelConversion::RgbToKcmy => {
                rgb_to_cmyk(src, dst);
                dst[..4].rotate_right(1);
                4
            }
            PixelConversion::RgbToYmck => {
                rgb_to_cmyk(src, dst);
                dst.swap(0, 2);
                4
            }
            PixelConversion::RgbToRgba => {
                dst[..3].copy_from_slice(&src[..3]);
                dst[3] = 0xff;
                4
            }
            PixelConversion::RgbToRgbw => {
                rgb_to_cmyk(src, dst);
                for v in &mut dst[..4] {
                    *v = 255 - *v;
                }
                4
            }
            PixelConversion::RgbToKcmyLight => {
                dst[0] = kcmy_light_halftone(src, x, y);
                1
            }
            PixelConversion::GrayCopy => {
                dst[0] = src[0];
                1
            }
            PixelConversion::GrayInvert => {
                dst[0] = 255 - src[0];
                1
            }
            PixelConversion::Icc { channels, encoding } => {
                let Some(transform) = self.transform else {
                    return 0;
                };
                match encoding {
                    IccEncoding::Device8 => {
                        transform.apply(src, dst);
                        channels as usize
                    }
                    IccEncoding::Device16 => {
                        transform.apply(src, dst);
                        2 * channels as usize
                    }
                    lab_or_xyz => {
                        let lab = transform.apply_lab(src);
                        encode_cie(lab, lab_or_xyz, dst)
                    }
                }
            }
        }
    }
}

fn rgb_to_cmy(src: &[u8], dst: &mut [u8]) {
    dst[0] = 255 - src[0];
    dst[1] = 255 - src[1];
    dst[2] = 255 - src[2];
}

/// RGB to CMYK with full under-colour removal.
pub fn rgb_to_cmyk(src: &[u8], dst: &mut [u8]) {
    let c = 255 - src[0];
    let m = 255 - src[1];
    let y = 255 - src[2];
    let k = c.min(m).min(y);
    dst[0] = c - k;
    dst[1] = m - k;
    dst[2] = y - k;
    dst[3] = k;
}

/// Luminance of an RGB pixel (31/61/8 weighting).
#[inline]
pub fn rgb_to_gray(src: &[u8]) -> u8 {
    ((src[0] as u32 * 31 + src[1] as u32 * 61 + src[2] as u32 * 8) / 100) as u8
}

/// CMYK samples back to RGB.
#[inline]
pub fn cmyk_to_rgb(src: &[u8], dst: &mut [u8]) {
    let k = src[3] as u32;
    for i in 0..3 {
        dst[i] = 255 - (src[i] as u32 + k).min(255) as u8;
    }
}

const INK_K: u8 = 0x20;
const INK_C: u8 = 0x10;
const INK_M: u8 = 0x08;
const INK_Y: u8 = 0x04;
const INK_LIGHT_C: u8 = 0x02;
const INK_LIGHT_M: u8 = 0x01;

/// One-bit K, C, M, Y, light-c, light-m halftone of an RGB pixel. Blue and
/// green are printed with a light ink to soften the secondaries.
fn kcmy_light_halftone(src: &[u8], x: u32, y: u32) -> u8 {
    let mut cmyk = [0u8; 4];
    rgb_to_cmyk(src, &mut cmyk);
    let d = threshold(x, y);
    let mut bits = 0u8;
    if cmyk[3] as u32 > d {
        bits |= INK_K;
    }
    if cmyk[0] as u32 > d {
        bits |= INK_C;
    }
    if cmyk[1] as u32 > d {
        bits |= INK_M;
    }
    if cmyk[2] as u32 > d {
        bits |= INK_Y;
    }
    match bits {
        b if b == INK_C | INK_M => INK_C | INK_LIGHT_M,
        b if b == INK_C | INK_Y => INK_LIGHT_C | INK_Y,
        b => b,
    }
}

/// CIE L*a*b* to XYZ relative to `white`.
pub fn lab_to_xyz(lab: [f64; 3], white: [f64; 3]) -> [f64; 3] {
    const DELTA: f64 = 6.0 / 29.0;
    let finv = |t: f64| {
        if t > DELTA {
            t * t * t
        } else {
            3.0 * DELTA * DELTA * (t - 4.0 / 29.0)
        }
    };
    let fy = (lab[0] + 16.0) / 116.0;
    let fx = fy + lab[1] / 500.0;
    let fz = fy - lab[2] / 200.0;
    [white[0] * finv(fx), white[1] * finv(fy), white[2] * finv(fz)]
}

fn clamp_u8(v: f64) -> u8 {
    v.clamp(0.0, 255.0) as u8
}

fn clamp_u16(v: f64) -> u16 {
    v.clamp(0.0, 65535.0) as u16
}

/// Fixed-point encoding of a Lab value as CIE Lab or CIE XYZ samples.
/// Returns bytes written.
pub fn encode_cie(lab: [f64; 3], encoding: IccEncoding, dst: &mut [u8]) -> usize {
    match encoding {
        IccEncoding::Lab8 => {
            dst[0] = clamp_u8(LAB_L_SCALE_8 * lab[0] + 0.5);
            dst[1] = clamp_u8(lab[1] + 128.5);
            dst[2] = clamp_u8(lab[2] + 128.5);
            3
        }
        IccEncoding::Lab16 => {
            let l = clamp_u16(LAB_L_SCALE_16 * lab[0] + 0.5);
            let a = clamp_u16((lab[1] + 128.0) * 256.0 + 0.5);
            let b = clamp_u16((lab[2] + 128.0) * 256.0 + 0.5);
            dst[0..2].copy_from_slice(&l.to_be_bytes());
            dst[2..4].copy_from_slice(&a.to_be_bytes());
            dst[4..6].copy_from_slice(&b.to_be_bytes());
            6
        }
        IccEncoding::Xyz8 => {
            let xyz = lab_to_xyz(lab, D65_WHITE);
            for i in 0..3 {
                dst[i] = clamp_u8(XYZ_SCALE_8 * xyz[i] + 0.5);
            }
            3
        }
        IccEncoding::Xyz16 => {
            let xyz = lab_to_xyz(lab, D65_WHITE);
            for i in 0..3 {
                let v = clamp_u16(XYZ_SCALE_16 * xyz[i] + 0.5);
                dst[2 * i..2 * i + 2].copy_from_slice(&v.to_be_bytes());
            }
            6
        }
        IccEncoding::Device8 | IccEncoding::Device16 => 0,
    }
}
