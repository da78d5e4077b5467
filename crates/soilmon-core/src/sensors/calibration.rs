//! Linear raw-to-percent calibration for the capacitive moisture probe.

/// Two reference readings defining the linear map from raw ADC counts to a
/// moisture percentage.
///
/// The expected orientation is `raw_air > raw_water`: the probe reads higher
/// when drier. Dry maps to 0 % and wet to 100 %.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    /// Raw reading in dry air.
    pub raw_air: u16,
    /// Raw reading fully submerged.
    pub raw_water: u16,
}

impl Calibration {
    pub const fn new(raw_air: u16, raw_water: u16) -> Self {
        Self { raw_air, raw_water }
    }

    /// Map a raw reading to a percentage in `[0, 100]`.
    ///
    /// `raw_water` is the upper input bound and `raw_air` the lower one, so the
    /// bounds are swapped relative to their numeric order. A degenerate
    /// calibration (`raw_air == raw_water`) maps everything to 0.
    pub fn percent(&self, raw: u16) -> u8 {
        map_constrained(raw, self.raw_water, self.raw_air, 0, 100)
    }
}

/// Map `value` from `in_min..in_max` onto `out_min..out_max`, clamped to the
/// output range. Works with inverted input ranges.
fn map_constrained(value: u16, in_max: u16, in_min: u16, out_min: u8, out_max: u8) -> u8 {
    if in_max == in_min {
        return 0;
    }

    let (value, in_min, in_max) = (i32::from(value), i32::from(in_min), i32::from(in_max));
    let (out_min, out_max) = (i32::from(out_min), i32::from(out_max));

    let mapped = (value - in_min) * (out_max - out_min) / (in_max - in_min) + out_min;
    mapped.clamp(out_min, out_max) as u8
}
