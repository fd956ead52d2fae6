//! Commands that can be sent to the controller.
//!
//! Each command is serialized as a single-line JSON object with a `type`
//! discriminator and lower-camel-case field names:
//!
//! ```text
//! {"type":"controller_setup","controllerType":"dots",...,"guns":[...]}
//! {"type":"calibrate","pageLength":1000}
//! {"type":"test","gun":2,"state":"on"}
//! {"type":"heartbeat"}
//! ```

use crate::error::{ProtocolError, ProtocolResult};
use glue_model::{ControllerConfig, ControllerType, DotSize, GlueZone, GUN_COUNT};
use serde::{Deserialize, Serialize};

/// Commands that can be sent to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Upload a full configuration snapshot.
    ControllerSetup(Box<ControllerConfig>),

    /// Start an encoder calibration run.
    Calibrate {
        /// Length of the calibration page (centimeters).
        page_length: u32,
    },

    /// Energize or release a single gun outside a dispensing cycle.
    Test {
        /// Gun index (0-3).
        gun: u8,
        /// Whether the gun should be on.
        on: bool,
    },

    /// Liveness probe.
    Heartbeat,
}

/// Gun state in a `test` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TestState {
    On,
    Off,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireCommand {
    ControllerSetup(SetupPayload),
    Calibrate {
        #[serde(rename = "pageLength")]
        page_length: u32,
    },
    Test {
        gun: u8,
        state: TestState,
    },
    Heartbeat,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetupPayload {
    controller_type: ControllerType,
    enabled: bool,
    encoder: f64,
    sensor_offset: i32,
    dot_size: DotSize,
    start_current: f64,
    start_duration: f64,
    hold_current: f64,
    minimum_speed: f64,
    guns: Vec<WireGun>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireGun {
    gun_id: u8,
    enabled: bool,
    rows: Vec<GlueZone>,
}

impl From<&ControllerConfig> for SetupPayload {
    fn from(config: &ControllerConfig) -> Self {
        SetupPayload {
            controller_type: config.controller_type,
            enabled: config.enabled,
            encoder: config.encoder_pulses_per_mm,
            sensor_offset: config.sensor_offset,
            dot_size: config.dot_size,
            start_current: config.start_current,
            start_duration: config.start_duration,
            hold_current: config.hold_current,
            minimum_speed: config.minimum_speed,
            guns: config
                .guns()
                .iter()
                .map(|gun| WireGun {
                    gun_id: gun.gun_id(),
                    enabled: gun.enabled,
                    rows: gun.zones().to_vec(),
                })
                .collect(),
        }
    }
}

impl TryFrom<SetupPayload> for ControllerConfig {
    type Error = ProtocolError;

    fn try_from(payload: SetupPayload) -> Result<Self, Self::Error> {
        let mut config = ControllerConfig::default();
        config.controller_type = payload.controller_type;
        config.enabled = payload.enabled;
        config.encoder_pulses_per_mm = payload.encoder;
        config.sensor_offset = payload.sensor_offset;
        config.dot_size = payload.dot_size;
        config.start_current = payload.start_current;
        config.start_duration = payload.start_duration;
        config.hold_current = payload.hold_current;
        config.minimum_speed = payload.minimum_speed;

        for wire_gun in payload.guns {
            let index = usize::from(wire_gun.gun_id);
            let gun = config
                .gun_mut(index)
                .map_err(|_| ProtocolError::InvalidGunIndex(index))?;
            gun.enabled = wire_gun.enabled;
            gun.clear_zones();
            for zone in wire_gun.rows {
                gun.push_zone(zone);
            }
        }

        Ok(config)
    }
}

impl Command {
    /// Build a setup command from a snapshot of `config`.
    pub fn setup(config: &ControllerConfig) -> Self {
        Command::ControllerSetup(Box::new(config.clone()))
    }

    /// The `type` tag this command is sent with.
    pub fn type_tag(&self) -> &'static str {
        use crate::constants::*;
        match self {
            Command::ControllerSetup(_) => MSG_CONTROLLER_SETUP,
            Command::Calibrate { .. } => MSG_CALIBRATE,
            Command::Test { .. } => MSG_TEST,
            Command::Heartbeat => MSG_HEARTBEAT,
        }
    }

    /// Serialize to the JSON text payload (without framing).
    pub fn to_payload(&self) -> ProtocolResult<String> {
        let wire = match self {
            Command::ControllerSetup(config) => {
                WireCommand::ControllerSetup(SetupPayload::from(config.as_ref()))
            }
            Command::Calibrate { page_length } => {
                if *page_length == 0 {
                    return Err(ProtocolError::InvalidPageLength);
                }
                WireCommand::Calibrate {
                    page_length: *page_length,
                }
            }
            Command::Test { gun, on } => {
                if usize::from(*gun) >= GUN_COUNT {
                    return Err(ProtocolError::InvalidGunIndex(usize::from(*gun)));
                }
                WireCommand::Test {
                    gun: *gun,
                    state: if *on { TestState::On } else { TestState::Off },
                }
            }
            Command::Heartbeat => WireCommand::Heartbeat,
        };
        Ok(serde_json::to_string(&wire)?)
    }

    /// Parse a JSON text payload back into a command.
    pub fn from_payload(payload: &str) -> ProtocolResult<Self> {
        let wire: WireCommand = serde_json::from_str(payload)?;
        Ok(match wire {
            WireCommand::ControllerSetup(setup) => {
                Command::ControllerSetup(Box::new(ControllerConfig::try_from(setup)?))
            }
            WireCommand::Calibrate { page_length } => Command::Calibrate { page_length },
            WireCommand::Test { gun, state } => Command::Test {
                gun,
                on: state == TestState::On,
            },
            WireCommand::Heartbeat => Command::Heartbeat,
        })
    }
}
