//! Controller, gun and zone configuration.

use crate::error::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of independently addressable glue guns on the controller.
pub const GUN_COUNT: usize = 4;

/// Default encoder calibration before any calibration run.
pub const DEFAULT_PULSES_PER_MM: f64 = 1.0;

/// Default distance between the sensor and the guns, in millimeters.
pub const DEFAULT_SENSOR_OFFSET_MM: i32 = 10;

/// Dispensing mode of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerType {
    /// Intermittent dots.
    #[default]
    Dots,
    /// Continuous lines.
    Lines,
}

impl ControllerType {
    /// Wire name of this controller type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ControllerType::Dots => "dots",
            ControllerType::Lines => "lines",
        }
    }
}

impl fmt::Display for ControllerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dot size used in [`ControllerType::Dots`] mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DotSize {
    /// Small dots.
    Small,
    /// Medium dots.
    #[default]
    Medium,
    /// Large dots.
    Large,
}

impl DotSize {
    /// Wire name of this dot size.
    pub fn as_str(&self) -> &'static str {
        match self {
            DotSize::Small => "small",
            DotSize::Medium => "medium",
            DotSize::Large => "large",
        }
    }
}

impl fmt::Display for DotSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A from/to interval along the web where a gun dispenses.
///
/// `from <= to` is expected but not enforced here.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GlueZone {
    /// Start position in millimeters.
    pub from: f64,
    /// End position in millimeters.
    pub to: f64,
    /// Spacing between dots in millimeters (0 = continuous).
    pub space: f64,
}

impl GlueZone {
    /// Create a new zone.
    pub fn new(from: f64, to: f64, space: f64) -> Self {
        GlueZone { from, to, space }
    }

    /// Whether this zone dispenses continuously.
    pub fn is_continuous(&self) -> bool {
        self.space == 0.0
    }
}

/// Configuration of a single gun.
///
/// The zone list is ordered: it defines the dispensing order along the web.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GunConfig {
    gun_id: u8,
    /// Whether this gun takes part in dispensing cycles.
    pub enabled: bool,
    rows: Vec<GlueZone>,
}

impl GunConfig {
    /// Create an enabled gun with no zones.
    pub fn new(gun_id: u8) -> Self {
        GunConfig {
            gun_id,
            enabled: true,
            rows: Vec::new(),
        }
    }

    /// Index of this gun (0-3).
    pub fn gun_id(&self) -> u8 {
        self.gun_id
    }

    /// Zones in dispensing order.
    pub fn zones(&self) -> &[GlueZone] {
        &self.rows
    }

    /// Mutable access to a single zone for in-place editing.
    pub fn zone_mut(&mut self, index: usize) -> Option<&mut GlueZone> {
        self.rows.get_mut(index)
    }

    /// Append a zone at the end of the list.
    pub fn push_zone(&mut self, zone: GlueZone) {
        self.rows.push(zone);
    }

    /// Insert a zone at `index`, shifting later zones back.
    pub fn insert_zone(&mut self, index: usize, zone: GlueZone) -> ModelResult<()> {
        if index > self.rows.len() {
            return Err(self.zone_out_of_range(index));
        }
        self.rows.insert(index, zone);
        Ok(())
    }

    /// Remove and return the zone at `index`.
    pub fn remove_zone(&mut self, index: usize) -> ModelResult<GlueZone> {
        if index >= self.rows.len() {
            return Err(self.zone_out_of_range(index));
        }
        Ok(self.rows.remove(index))
    }

    /// Remove all zones.
    pub fn clear_zones(&mut self) {
        self.rows.clear();
    }

    fn zone_out_of_range(&self, index: usize) -> ModelError {
        ModelError::ZoneIndexOutOfRange {
            gun: self.gun_id,
            index,
            len: self.rows.len(),
        }
    }
}

/// Full controller configuration as edited by the operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerConfig {
    /// Dots or lines mode.
    pub controller_type: ControllerType,
    /// Master enable.
    pub enabled: bool,
    /// Encoder calibration constant (> 0).
    pub encoder_pulses_per_mm: f64,
    /// Sensor-to-gun offset in millimeters.
    pub sensor_offset: i32,
    /// Dot size for dots mode.
    pub dot_size: DotSize,
    /// Pull-in current in amperes.
    pub start_current: f64,
    /// Pull-in duration in milliseconds.
    pub start_duration: f64,
    /// Hold current in amperes.
    pub hold_current: f64,
    /// Minimum web speed in mm/s below which dispensing stops (0 = disabled).
    pub minimum_speed: f64,
    guns: [GunConfig; GUN_COUNT],
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            controller_type: ControllerType::Dots,
            enabled: false,
            encoder_pulses_per_mm: DEFAULT_PULSES_PER_MM,
            sensor_offset: DEFAULT_SENSOR_OFFSET_MM,
            dot_size: DotSize::Medium,
            start_current: 1.0,
            start_duration: 500.0,
            hold_current: 0.5,
            minimum_speed: 0.0,
            guns: std::array::from_fn(|i| GunConfig::new(i as u8)),
        }
    }
}

impl ControllerConfig {
    /// All four guns, ordered by index.
    pub fn guns(&self) -> &[GunConfig] {
        &self.guns
    }

    /// Mutable iterator over the guns. Gun indices cannot be changed through it.
    pub fn guns_mut(&mut self) -> impl Iterator<Item = &mut GunConfig> {
        self.guns.iter_mut()
    }

    /// Get a gun by index.
    pub fn gun(&self, index: usize) -> ModelResult<&GunConfig> {
        self.guns.get(index).ok_or(ModelError::InvalidGunIndex {
            index,
            max: GUN_COUNT,
        })
    }

    /// Get a gun by index for editing.
    pub fn gun_mut(&mut self, index: usize) -> ModelResult<&mut GunConfig> {
        self.guns.get_mut(index).ok_or(ModelError::InvalidGunIndex {
            index,
            max: GUN_COUNT,
        })
    }

    /// Whether every gun sits at the slot matching its own index.
    ///
    /// Always true for configurations built in-process; a hand-edited profile
    /// document can break it.
    pub fn has_consistent_gun_ids(&self) -> bool {
        self.check_gun_ids().is_ok()
    }

    /// Fail with the first gun whose id does not match its slot.
    pub fn check_gun_ids(&self) -> ModelResult<()> {
        match self
            .guns
            .iter()
            .enumerate()
            .find(|(i, gun)| usize::from(gun.gun_id) != *i)
        {
            Some((slot, gun)) => Err(ModelError::GunIdMismatch {
                slot,
                gun_id: gun.gun_id,
            }),
            None => Ok(()),
        }
    }
}
