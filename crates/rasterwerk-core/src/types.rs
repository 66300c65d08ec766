// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Rasterwerk filters. Every enum carrying a `raw()`
// value maps onto the numeric encoding of the CUPS raster page header; those
// numbers are read by printer drivers at fixed offsets and must not change.

use serde::{Deserialize, Serialize};

use crate::error::{RasterError, Result};

/// Raster colour space (`cups_cspace_t`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorSpace {
    /// Luminance, 0 = black.
    W,
    Rgb,
    Rgba,
    /// Black ink, 0 = white.
    K,
    Cmy,
    Ymc,
    Cmyk,
    Ymck,
    Kcmy,
    /// K, C, M, Y plus light cyan and light magenta (1-bit only).
    #[serde(rename = "kcmycm")]
    KcmyLight,
    Gmck,
    Gmcs,
    White,
    Gold,
    Silver,
    #[serde(rename = "ciexyz")]
    CieXyz,
    #[serde(rename = "cielab")]
    CieLab,
    Rgbw,
    /// sGray.
    Sw,
    Srgb,
    AdobeRgb,
    Icc1,
    Icc2,
    Icc3,
    Icc4,
    Icc5,
    Icc6,
    Icc7,
    Icc8,
    Icc9,
    IccA,
    IccB,
    IccC,
    IccD,
    IccE,
    IccF,
    Device1,
    Device2,
    Device3,
    Device4,
    Device5,
    Device6,
    Device7,
    Device8,
    Device9,
    DeviceA,
    DeviceB,
    DeviceC,
    DeviceD,
    DeviceE,
    DeviceF,
}

const ICC_SPACES: [ColorSpace; 15] = [
    ColorSpace::Icc1,
    ColorSpace::Icc2,
    ColorSpace::Icc3,
    ColorSpace::Icc4,
    ColorSpace::Icc5,
    ColorSpace::Icc6,
    ColorSpace::Icc7,
    ColorSpace::Icc8,
    ColorSpace::Icc9,
    ColorSpace::IccA,
    ColorSpace::IccB,
    ColorSpace::IccC,
    ColorSpace::IccD,
    ColorSpace::IccE,
    ColorSpace::IccF,
];

const DEVICE_SPACES: [ColorSpace; 15] = [
    ColorSpace::Device1,
    ColorSpace::Device2,
    ColorSpace::Device3,
    ColorSpace::Device4,
    ColorSpace::Device5,
    ColorSpace::Device6,
    ColorSpace::Device7,
    ColorSpace::Device8,
    ColorSpace::Device9,
    ColorSpace::DeviceA,
    ColorSpace::DeviceB,
    ColorSpace::DeviceC,
    ColorSpace::DeviceD,
    ColorSpace::DeviceE,
    ColorSpace::DeviceF,
];

impl ColorSpace {
    /// Decode the header value. Unknown values are a configuration error.
    pub fn from_raw(value: u32) -> Result<Self> {
        Ok(match value {
            0 => Self::W,
            1 => Self::Rgb,
            2 => Self::Rgba,
            3 => Self::K,
            4 => Self::Cmy,
            5 => Self::Ymc,
            6 => Self::Cmyk,
            7 => Self::Ymck,
            8 => Self::Kcmy,
            9 => Self::KcmyLight,
            10 => Self::Gmck,
            11 => Self::Gmcs,
            12 => Self::White,
            13 => Self::Gold,
            14 => Self::Silver,
            15 => Self::CieXyz,
            16 => Self::CieLab,
            17 => Self::Rgbw,
            18 => Self::Sw,
            19 => Self::Srgb,
            20 => Self::AdobeRgb,
            32..=46 => ICC_SPACES[(value - 32) as usize],
            48..=62 => DEVICE_SPACES[(value - 48) as usize],
            other => return Err(RasterError::UnknownColorSpace(other)),
        })
    }

    /// Header value.
    pub fn raw(self) -> u32 {
        match self {
            Self::W => 0,
            Self::Rgb => 1,
            Self::Rgba => 2,
            Self::K => 3,
            Self::Cmy => 4,
            Self::Ymc => 5,
            Self::Cmyk => 6,
            Self::Ymck => 7,
            Self::Kcmy => 8,
            Self::KcmyLight => 9,
            Self::Gmck => 10,
            Self::Gmcs => 11,
            Self::White => 12,
            Self::Gold => 13,
            Self::Silver => 14,
            Self::CieXyz => 15,
            Self::CieLab => 16,
            Self::Rgbw => 17,
            Self::Sw => 18,
            Self::Srgb => 19,
            Self::AdobeRgb => 20,
            other => {
                if let Some(i) = ICC_SPACES.iter().position(|&c| c == other) {
                    32 + i as u32
                } else {
                    let i = DEVICE_SPACES
                        .iter()
                        .position(|&c| c == other)
                        .unwrap_or_default();
                    48 + i as u32
                }
            }
        }
    }

    /// Number of colour channels in a pixel of this space at the given depth.
    pub fn num_colors(self, bits_per_color: u32) -> u32 {
        match self {
            Self::W | Self::K | Self::White | Self::Gold | Self::Silver | Self::Sw => 1,
            Self::Rgb
            | Self::Cmy
            | Self::Ymc
            | Self::CieXyz
            | Self::CieLab
            | Self::Srgb
            | Self::AdobeRgb => 3,
            Self::Rgba
            | Self::Cmyk
            | Self::Ymck
            | Self::Kcmy
            | Self::Gmck
            | Self::Gmcs
            | Self::Rgbw => 4,
            Self::KcmyLight => {
                if bits_per_color == 1 {
                    6
                } else {
                    4
                }
            }
            other => {
                let raw = other.raw();
                if raw >= 48 { raw - 47 } else { raw - 31 }
            }
        }
    }

    /// Single-channel spaces where 0 means white (ink amount).
    pub fn is_ink_gray(self) -> bool {
        matches!(self, Self::K | Self::Gold | Self::Silver)
    }

    /// Single-channel spaces where 0 means black (light amount).
    pub fn is_light_gray(self) -> bool {
        matches!(self, Self::W | Self::Sw | Self::White)
    }

    /// Any single-channel space.
    pub fn is_gray(self) -> bool {
        self.is_ink_gray() || self.is_light_gray()
    }

    /// Device-independent spaces that always need a colour transform.
    pub fn is_cie(self) -> bool {
        matches!(self, Self::CieLab | Self::CieXyz)
    }

    /// `ICC1`..`ICCF`: channel values defined by an attached profile.
    pub fn is_icc(self) -> bool {
        ICC_SPACES.contains(&self)
    }

    /// `DEVICE1`..`DEVICEF`.
    pub fn is_device_n(self) -> bool {
        DEVICE_SPACES.contains(&self)
    }

    /// Short keyword used in log lines and profile qualifiers.
    pub fn keyword(self) -> String {
        serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_else(|| format!("{self:?}"))
    }
}

/// Pixel layout of multi-channel data (`cups_order_t`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorOrder {
    /// Channels interleaved per pixel.
    #[default]
    Chunked,
    /// All samples of one channel contiguous within a line.
    Banded,
    /// One channel per pass over the whole page.
    Planar,
}

impl ColorOrder {
    pub fn from_raw(value: u32) -> Result<Self> {
        match value {
            0 => Ok(Self::Chunked),
            1 => Ok(Self::Banded),
            2 => Ok(Self::Planar),
            other => Err(RasterError::Stream(format!("unknown colour order {other}"))),
        }
    }

    pub fn raw(self) -> u32 {
        match self {
            Self::Chunked => 0,
            Self::Banded => 1,
            Self::Planar => 2,
        }
    }
}

/// Output container family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RasterFormat {
    /// CUPS Raster (v3, uncompressed).
    #[default]
    Cups,
    /// PWG Raster (PWG 5102.4).
    Pwg,
    /// Apple Raster (URF).
    Apple,
}

impl RasterFormat {
    /// MIME type of the stream.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Cups => "application/vnd.cups-raster",
            Self::Pwg => "image/pwg-raster",
            Self::Apple => "image/urf",
        }
    }
}

/// ICC rendering intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenderingIntent {
    #[default]
    Perceptual,
    RelativeColorimetric,
    Saturation,
    AbsoluteColorimetric,
}

impl RenderingIntent {
    /// Parse the `cupsRenderingIntent` header string. Unknown or empty
    /// strings fall back to perceptual.
    pub fn from_header(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "relative" | "relativecolorimetric" | "relative-colorimetric" => {
                Self::RelativeColorimetric
            }
            "saturation" => Self::Saturation,
            "absolute" | "absolutecolorimetric" | "absolute-colorimetric" => {
                Self::AbsoluteColorimetric
            }
            _ => Self::Perceptual,
        }
    }

    /// Header string.
    pub fn header_value(&self) -> &'static str {
        match self {
            Self::Perceptual => "Perceptual",
            Self::RelativeColorimetric => "Relative",
            Self::Saturation => "Saturation",
            Self::AbsoluteColorimetric => "Absolute",
        }
    }
}

/// Requested colour mode of the job (`print-color-mode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorMode {
    /// Use whatever the output colour space says.
    #[default]
    Auto,
    Color,
    Monochrome,
    /// 1-bit output with a fixed midpoint instead of dithering.
    BiLevel,
}

/// Page orientation of a header (`cups_orient_t`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
    ReversePortrait,
    ReverseLandscape,
}

impl Orientation {
    pub fn from_raw(value: u32) -> Self {
        match value {
            1 => Self::Landscape,
            2 => Self::ReversePortrait,
            3 => Self::ReverseLandscape,
            _ => Self::Portrait,
        }
    }

    pub fn raw(self) -> u32 {
        match self {
            Self::Portrait => 0,
            Self::Landscape => 1,
            Self::ReversePortrait => 2,
            Self::ReverseLandscape => 3,
        }
    }

    /// Clockwise rotation in degrees.
    pub fn degrees(self) -> u32 {
        match self {
            Self::Portrait => 0,
            Self::Landscape => 90,
            Self::ReversePortrait => 180,
            Self::ReverseLandscape => 270,
        }
    }
}
