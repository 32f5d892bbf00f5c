//! Color description and HDR metadata carried in the sequence header.
//!
//! Every field is independently optional. An unset field is never replaced by
//! a synthesized value; the bitstream core decides how to signal "unspecified".

use crate::error::{FrameForgeError, Result};

/// Color range of the samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorRange {
    /// Studio swing (16..235 for 8-bit luma).
    Limited,
    /// Full swing.
    Full,
}

impl TryFrom<u8> for ColorRange {
    type Error = FrameForgeError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Limited),
            1 => Ok(Self::Full),
            _ => Err(FrameForgeError::InvalidConfig(format!(
                "color_range must be 0 (limited) or 1 (full), got {value}"
            ))),
        }
    }
}

macro_rules! code_point_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $label:literal {
            $($variant:ident = $value:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[repr(u8)]
        pub enum $name {
            $($variant = $value,)+
        }

        impl $name {
            /// Raw code point as written in the bitstream.
            pub fn code(self) -> u8 {
                self as u8
            }
        }

        impl TryFrom<u8> for $name {
            type Error = FrameForgeError;

            fn try_from(value: u8) -> Result<Self> {
                match value {
                    $($value => Ok(Self::$variant),)+
                    _ => Err(FrameForgeError::InvalidConfig(format!(
                        "{} code point {} is not a valid enumerant",
                        $label, value
                    ))),
                }
            }
        }
    };
}

code_point_enum! {
    /// AV1 `color_primaries` code points.
    ColorPrimaries, "color_primaries" {
        Bt709 = 1,
        Unspecified = 2,
        Bt470M = 4,
        Bt470BG = 5,
        Bt601 = 6,
        Smpte240 = 7,
        GenericFilm = 8,
        Bt2020 = 9,
        Xyz = 10,
        Smpte431 = 11,
        Smpte432 = 12,
        Ebu3213 = 22,
    }
}

code_point_enum! {
    /// AV1 `transfer_characteristics` code points.
    TransferCharacteristics, "transfer_characteristics" {
        Bt709 = 1,
        Unspecified = 2,
        Bt470M = 4,
        Bt470BG = 5,
        Bt601 = 6,
        Smpte240 = 7,
        Linear = 8,
        Log100 = 9,
        Log100Sqrt10 = 10,
        Iec61966 = 11,
        Bt1361 = 12,
        Srgb = 13,
        Bt2020Ten = 14,
        Bt2020Twelve = 15,
        Smpte2084 = 16,
        Smpte428 = 17,
        Hlg = 18,
    }
}

code_point_enum! {
    /// AV1 `matrix_coefficients` code points.
    MatrixCoefficients, "matrix_coefficients" {
        Identity = 0,
        Bt709 = 1,
        Unspecified = 2,
        Fcc = 4,
        Bt470BG = 5,
        Bt601 = 6,
        Smpte240 = 7,
        YCgCo = 8,
        Bt2020Ncl = 9,
        Bt2020Cl = 10,
        Smpte2085 = 11,
        ChromatNcl = 12,
        ChromatCl = 13,
        ICtCp = 14,
    }
}

/// Resolved color description. Each member stays `None` unless the caller set it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColorDescription {
    pub range: Option<ColorRange>,
    pub primaries: Option<ColorPrimaries>,
    pub transfer: Option<TransferCharacteristics>,
    pub matrix: Option<MatrixCoefficients>,
}

impl ColorDescription {
    /// Primaries, transfer and matrix code points, when all three are set.
    ///
    /// Only a complete triple is signalled in the sequence header.
    pub fn signalled_codes(&self) -> Option<(u8, u8, u8)> {
        match (self.primaries, self.transfer, self.matrix) {
            (Some(p), Some(t), Some(m)) => Some((p.code(), t.code(), m.code())),
            _ => None,
        }
    }
}

/// Content light level information (CTA-861.3), in cd/m².
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentLightLevel {
    pub max_content_light_level: u16,
    pub max_frame_average_light_level: u16,
}

/// Mastering display color volume (SMPTE ST 2086).
///
/// Chromaticity coordinates are in 0.00002 units, luminance in 0.0001 cd/m².
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasteringDisplay {
    pub primaries: [[u16; 2]; 3],
    pub white_point: [u16; 2],
    pub max_luminance: u32,
    pub min_luminance: u32,
}

/// Largest chromaticity value (1.0 in 0.00002 units).
const MAX_CHROMATICITY: u16 = 50_000;

impl MasteringDisplay {
    pub(crate) fn validate(&self) -> Result<()> {
        let coords = self
            .primaries
            .iter()
            .flatten()
            .chain(self.white_point.iter());
        if let Some(c) = coords.copied().find(|&c| c > MAX_CHROMATICITY) {
            return Err(FrameForgeError::InvalidConfig(format!(
                "mastering display chromaticity {c} exceeds {MAX_CHROMATICITY}"
            )));
        }
        if self.max_luminance <= self.min_luminance {
            return Err(FrameForgeError::InvalidConfig(format!(
                "mastering display max_luminance ({}) must exceed min_luminance ({})",
                self.max_luminance, self.min_luminance
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_range_codes() {
        assert_eq!(ColorRange::try_from(0).unwrap(), ColorRange::Limited);
        assert_eq!(ColorRange::try_from(1).unwrap(), ColorRange::Full);
        assert!(ColorRange::try_from(2).is_err());
    }

    #[test]
    fn test_reserved_code_points_rejected() {
        assert!(ColorPrimaries::try_from(0).is_err());
        assert!(ColorPrimaries::try_from(3).is_err());
        assert!(ColorPrimaries::try_from(13).is_err());
        assert!(TransferCharacteristics::try_from(3).is_err());
        assert!(TransferCharacteristics::try_from(19).is_err());
        assert!(MatrixCoefficients::try_from(3).is_err());
        assert!(MatrixCoefficients::try_from(15).is_err());
    }

    #[test]
    fn test_code_round_trip() {
        let p = ColorPrimaries::try_from(22).unwrap();
        assert_eq!(p, ColorPrimaries::Ebu3213);
        assert_eq!(p.code(), 22);
        assert_eq!(MatrixCoefficients::Identity.code(), 0);
    }

    #[test]
    fn test_signalled_codes_need_all_three() {
        assert_eq!(ColorDescription::default().signalled_codes(), None);

        let mut color = ColorDescription {
            range: Some(ColorRange::Full),
            primaries: Some(ColorPrimaries::Bt2020),
            transfer: Some(TransferCharacteristics::Smpte2084),
            matrix: None,
        };
        assert_eq!(color.signalled_codes(), None);
        color.matrix = Some(MatrixCoefficients::Bt2020Ncl);
        assert_eq!(color.signalled_codes(), Some((9, 16, 9)));
    }

    #[test]
    fn test_mastering_display_validation() {
        let mut mdcv = MasteringDisplay {
            primaries: [[34000, 16000], [13250, 34500], [7500, 3000]],
            white_point: [15635, 16450],
            max_luminance: 10_000_000,
            min_luminance: 1,
        };
        assert!(mdcv.validate().is_ok());

        mdcv.min_luminance = mdcv.max_luminance;
        assert!(mdcv.validate().is_err());

        mdcv.min_luminance = 1;
        mdcv.white_point[0] = 50_001;
        assert!(mdcv.validate().is_err());
    }
}
