//! Session controller.
//!
//! Ties a [`Transport`] and a [`CommandProtocol`] to the operator-facing
//! [`SessionState`]. Every operation reports its outcome through
//! `status_message`; nothing here returns an error to the caller.
//!
//! Transport events queue up in a channel and are applied on the caller's
//! thread by [`SessionController::process_events`] or
//! [`SessionController::wait_for_event`], so state is only ever mutated by the
//! owner of the controller.

use crate::error::TransportError;
use crate::link::SerialConnector;
use crate::settings::SessionSettings;
use crate::transport::{Transport, TransportEvent};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use glue_model::{ControllerConfig, GlueZone, Profile, ProfileStore, GUN_COUNT};
use glue_protocol::{CalibrationResult, Command, CommandProtocol, Inbound};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Status shown before anything has happened.
pub const STATUS_READY: &str = "Ready";

/// Status reported when a send is attempted without a link.
pub const STATUS_NOT_CONNECTED: &str = "Not connected";

/// What the operator sees.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    /// Live configuration being edited.
    pub config: ControllerConfig,
    pub connected: bool,
    /// "Connected: <port>" or "Disconnected".
    pub connection_status: String,
    /// Outcome of the most recent operation or inbound message.
    pub status_message: String,
    pub available_ports: Vec<String>,
    pub selected_port: Option<String>,
    pub calibration_page_length: u32,
    pub calibrating: bool,
    /// Human-readable summary of the last calibration run.
    pub calibration_result: String,
    /// Last calibration reported by the controller.
    pub last_calibration: Option<CalibrationResult>,
    /// Requested test state per gun.
    pub test_guns: [bool; GUN_COUNT],
    /// Stored profiles, newest first.
    pub profiles: Vec<Profile>,
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState {
            config: ControllerConfig::default(),
            connected: false,
            connection_status: "Disconnected".to_string(),
            status_message: STATUS_READY.to_string(),
            available_ports: Vec::new(),
            selected_port: None,
            calibration_page_length: glue_protocol::DEFAULT_CALIBRATION_PAGE_LENGTH,
            calibrating: false,
            calibration_result: String::new(),
            last_calibration: None,
            test_guns: [false; GUN_COUNT],
            profiles: Vec::new(),
        }
    }
}

/// Drives one controller session.
pub struct SessionController {
    transport: Transport,
    events: Receiver<TransportEvent>,
    protocol: CommandProtocol,
    profiles: Option<ProfileStore>,
    state: SessionState,
    baud_rate: u32,
}

impl SessionController {
    /// Create a controller around an existing transport and its event receiver.
    pub fn new(
        transport: Transport,
        events: Receiver<TransportEvent>,
        profiles: Option<ProfileStore>,
    ) -> Self {
        let mut controller = SessionController {
            transport,
            events,
            protocol: CommandProtocol::default(),
            profiles,
            state: SessionState::default(),
            baud_rate: glue_protocol::DEFAULT_BAUD_RATE,
        };
        controller.reload_profiles();
        controller
    }

    /// Build a transport on `connector` and a profile store as `settings` describe.
    ///
    /// A profile directory that cannot be created leaves profile operations
    /// unavailable rather than failing the session.
    pub fn from_settings(connector: Arc<dyn SerialConnector>, settings: &SessionSettings) -> Self {
        let (transport, events) = Transport::new(connector, settings.poll_interval());

        let profiles = match settings.resolve_profiles_dir() {
            Some(dir) => match ProfileStore::new(&dir) {
                Ok(store) => Some(store),
                Err(e) => {
                    warn!("Profile directory {} unavailable: {}", dir.display(), e);
                    None
                }
            },
            None => {
                warn!("No profile directory could be determined");
                None
            }
        };

        let mut controller = SessionController::new(transport, events, profiles);
        controller.baud_rate = settings.baud_rate;
        controller.set_calibration_page_length(settings.calibration_page_length);
        controller.state.selected_port = settings.port.clone();
        controller
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.state.config
    }

    /// The live configuration, for editing.
    pub fn config_mut(&mut self) -> &mut ControllerConfig {
        &mut self.state.config
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn profile_store(&self) -> Option<&ProfileStore> {
        self.profiles.as_ref()
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    pub fn set_baud_rate(&mut self, baud_rate: u32) {
        self.baud_rate = baud_rate;
    }

    pub fn select_port(&mut self, port: impl Into<String>) {
        self.state.selected_port = Some(port.into());
    }

    /// Page length assumed for calibration results until the next `calibrate`.
    pub fn set_calibration_page_length(&mut self, page_length: u32) {
        self.state.calibration_page_length = page_length;
        self.protocol = CommandProtocol::new(page_length);
    }

    // ========================================================================
    // Connection
    // ========================================================================

    /// Re-enumerate ports and select the first one if nothing is selected.
    pub fn refresh_ports(&mut self) {
        self.state.available_ports = self.transport.list_ports();
        if self.state.selected_port.is_none() {
            self.state.selected_port = self.state.available_ports.first().cloned();
        }
        self.process_events();
    }

    /// Open the selected port.
    pub fn connect(&mut self) {
        let Some(port) = self.state.selected_port.clone().filter(|p| !p.is_empty()) else {
            self.set_status("Please select a port");
            return;
        };

        let result = self.transport.open(&port, self.baud_rate);
        self.process_events();
        if result.is_ok() {
            self.set_status(format!("Connected to {}", port));
        }
    }

    /// Select `port` and open it.
    pub fn connect_to(&mut self, port: &str) {
        self.select_port(port);
        self.connect();
    }

    pub fn disconnect(&mut self) {
        self.transport.close();
        self.process_events();
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Upload the live configuration.
    pub fn send_config(&mut self) {
        let command = Command::setup(&self.state.config);
        if self.send_command(&command) {
            self.set_status("Configuration sent to controller");
        }
    }

    /// Ask the controller to count encoder pulses over a page of `page_length`.
    pub fn start_calibration(&mut self, page_length: u32) {
        if !self.ensure_connected() {
            return;
        }

        self.state.calibration_page_length = page_length;
        self.state.calibrating = true;
        self.state.calibration_result = "Waiting for sensor trigger...".to_string();

        if self.send_command(&Command::Calibrate { page_length }) {
            self.set_status("Calibration started - pass page through sensor");
        } else {
            self.state.calibrating = false;
            self.state.calibration_result.clear();
        }
    }

    /// Write the last calibration result into the live configuration.
    pub fn apply_calibration(&mut self) {
        match self.state.last_calibration {
            Some(result) if is_usable(&result) => {
                self.state.config.encoder_pulses_per_mm = result.pulses_per_mm;
                self.set_status("Calibration applied to configuration");
            }
            Some(_) => self.set_status("Calibration result is not usable"),
            None => self.set_status("No calibration result to apply"),
        }
    }

    /// Switch one gun's test output.
    pub fn set_test_gun(&mut self, gun: usize, on: bool) {
        if gun >= GUN_COUNT {
            self.set_status(format!("Invalid gun index {}", gun));
            return;
        }
        self.state.test_guns[gun] = on;
        if self.send_command(&Command::Test { gun: gun as u8, on }) {
            self.set_status(format!("Gun {} test {}", gun, if on { "on" } else { "off" }));
        }
    }

    /// Switch every gun's test output.
    pub fn test_all(&mut self, on: bool) {
        self.state.test_guns = [on; GUN_COUNT];
        if !self.ensure_connected() {
            return;
        }
        for gun in 0..GUN_COUNT {
            if !self.send_command(&Command::Test { gun: gun as u8, on }) {
                return;
            }
        }
        self.set_status(format!("All guns test {}", if on { "on" } else { "off" }));
    }

    pub fn send_heartbeat(&mut self) {
        if self.send_command(&Command::Heartbeat) {
            self.set_status("Heartbeat sent");
        }
    }

    /// Guard, encode and send. Returns whether the frame was written.
    fn send_command(&mut self, command: &Command) -> bool {
        if !self.ensure_connected() {
            return false;
        }

        let frame = match self.protocol.encode(command) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Cannot encode {}: {}", command.type_tag(), e);
                self.set_status(format!("Cannot send {}: {}", command.type_tag(), e));
                return false;
            }
        };

        match self.transport.send(&frame) {
            Ok(()) => {
                debug!("Sent {}", command.type_tag());
                true
            }
            Err(TransportError::NotConnected) => {
                self.set_status(STATUS_NOT_CONNECTED);
                false
            }
            Err(_) => {
                // The transport has queued the error event.
                self.process_events();
                false
            }
        }
    }

    fn ensure_connected(&mut self) -> bool {
        if self.transport.is_connected() {
            true
        } else {
            self.set_status(STATUS_NOT_CONNECTED);
            false
        }
    }

    // ========================================================================
    // Zones
    // ========================================================================

    /// Append a default zone to `gun`.
    pub fn add_zone(&mut self, gun: usize) {
        match self.state.config.gun_mut(gun) {
            Ok(g) => g.push_zone(GlueZone::new(0.0, 100.0, 0.0)),
            Err(e) => self.set_status(e.to_string()),
        }
    }

    /// Remove zone `index` from `gun`.
    pub fn remove_zone(&mut self, gun: usize, index: usize) {
        let result = self
            .state
            .config
            .gun_mut(gun)
            .and_then(|g| g.remove_zone(index));
        if let Err(e) = result {
            self.set_status(e.to_string());
        }
    }

    // ========================================================================
    // Profiles
    // ========================================================================

    /// Re-read the profile list from storage.
    pub fn reload_profiles(&mut self) {
        let Some(store) = &self.profiles else {
            return;
        };
        match store.list() {
            Ok(profiles) => self.state.profiles = profiles,
            Err(e) => warn!("Failed to list profiles: {}", e),
        }
    }

    /// Store a snapshot of the live configuration under `name`.
    pub fn save_profile(&mut self, name: &str) {
        if name.trim().is_empty() {
            self.set_status("Please enter a profile name");
            return;
        }
        let Some(store) = &self.profiles else {
            self.set_status("Profile storage unavailable");
            return;
        };

        let profile = Profile::snapshot(name, &self.state.config);
        match store.save(&profile) {
            Ok(path) => {
                info!("Saved profile '{}' to {}", profile.name, path.display());
                self.reload_profiles();
                self.set_status(format!("Profile '{}' saved", profile.name));
            }
            Err(e) => self.set_status(format!("Failed to save profile: {}", e)),
        }
    }

    /// Replace the live configuration with a stored profile's.
    ///
    /// Returns whether a profile was loaded. The stored name may differ from
    /// `name` when both sanitize to the same file.
    pub fn load_profile(&mut self, name: &str) -> bool {
        let Some(store) = &self.profiles else {
            self.set_status("Profile storage unavailable");
            return false;
        };
        match store.load(name) {
            Ok(profile) => {
                self.state.config = profile.config;
                self.set_status(format!("Profile '{}' loaded", profile.name));
                true
            }
            Err(e) => {
                self.set_status(format!("Failed to load profile: {}", e));
                false
            }
        }
    }

    pub fn delete_profile(&mut self, name: &str) {
        let Some(store) = &self.profiles else {
            self.set_status("Profile storage unavailable");
            return;
        };
        match store.delete(name) {
            Ok(true) => {
                self.reload_profiles();
                self.set_status(format!("Profile '{}' deleted", name));
            }
            Ok(false) => self.set_status(format!("Profile '{}' not found", name)),
            Err(e) => self.set_status(format!("Failed to delete profile: {}", e)),
        }
    }

    /// Copy a stored profile to an arbitrary file.
    pub fn export_profile(&mut self, name: &str, path: &Path) {
        let Some(store) = &self.profiles else {
            self.set_status("Profile storage unavailable");
            return;
        };
        let result = store
            .load(name)
            .and_then(|profile| store.export(&profile, path));
        match result {
            Ok(()) => self.set_status(format!("Profile exported to {}", path.display())),
            Err(e) => self.set_status(format!("Failed to export profile: {}", e)),
        }
    }

    /// Read a profile file and add it to storage.
    pub fn import_profile(&mut self, path: &Path) {
        let Some(store) = &self.profiles else {
            self.set_status("Profile storage unavailable");
            return;
        };
        match store.import(path) {
            Ok(profile) => {
                self.reload_profiles();
                self.set_status(format!("Profile '{}' imported", profile.name));
            }
            Err(e) => {
                warn!("Import of {} failed: {}", path.display(), e);
                self.set_status("Failed to import profile");
            }
        }
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Apply every queued transport event. Returns how many were applied.
    pub fn process_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event);
            applied += 1;
        }
        applied
    }

    /// Block up to `timeout` for an event, then apply it and anything queued
    /// behind it. Returns false if nothing arrived.
    pub fn wait_for_event(&mut self, timeout: Duration) -> bool {
        match self.events.recv_timeout(timeout) {
            Ok(event) => {
                self.handle_event(event);
                self.process_events();
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Apply one transport event to the session state.
    pub fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected { port } => {
                self.state.connected = true;
                self.state.connection_status = format!("Connected: {}", port);
                self.set_status("Connected to controller");
            }
            TransportEvent::Disconnected => {
                self.state.connected = false;
                self.state.connection_status = "Disconnected".to_string();
                self.set_status("Disconnected");
            }
            TransportEvent::Error(text) => self.set_status(text),
            TransportEvent::Message(payload) => match self.protocol.decode(&payload) {
                Inbound::Calibration(result) => self.on_calibration(result),
                Inbound::Status(text) => self.set_status(text),
            },
        }
    }

    fn on_calibration(&mut self, result: CalibrationResult) {
        info!(
            "Calibration: {} pulses over {} -> {:.4} pulses/mm",
            result.pulses_per_page, result.page_length, result.pulses_per_mm
        );
        self.state.calibration_result = format!(
            "Pulses per page: {}\nCalculated: {:.2} pulses/mm",
            result.pulses_per_page, result.pulses_per_mm
        );
        self.state.calibrating = false;
        self.state.last_calibration = Some(result);

        if is_usable(&result) {
            self.state.config.encoder_pulses_per_mm = result.pulses_per_mm;
            self.set_status("Calibration complete");
        } else {
            warn!("Ignoring non-positive calibration result");
            self.set_status("Calibration result is not usable");
        }
    }

    fn set_status(&mut self, status: impl Into<String>) {
        self.state.status_message = status.into();
        debug!("status: {}", self.state.status_message);
    }
}

fn is_usable(result: &CalibrationResult) -> bool {
    result.pulses_per_mm.is_finite() && result.pulses_per_mm > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryConnector, MemoryDevice};

    fn controller() -> (SessionController, MemoryDevice) {
        let connector = MemoryConnector::new();
        let device = connector.add_port("ttyA");
        let (transport, events) = Transport::new(Arc::new(connector), Duration::from_millis(1));
        (SessionController::new(transport, events, None), device)
    }

    #[test]
    fn test_initial_state() {
        let (session, _) = controller();
        let state = session.state();
        assert_eq!(state.status_message, "Ready");
        assert_eq!(state.connection_status, "Disconnected");
        assert_eq!(state.calibration_page_length, 1000);
        assert!(!state.connected);
    }

    #[test]
    fn test_connect_without_port() {
        let (mut session, device) = controller();
        session.connect();
        assert_eq!(session.state().status_message, "Please select a port");
        assert_eq!(device.open_count(), 0);
    }

    #[test]
    fn test_refresh_selects_first_port() {
        let (mut session, _) = controller();
        session.refresh_ports();
        assert_eq!(session.state().available_ports, vec!["ttyA".to_string()]);
        assert_eq!(session.state().selected_port.as_deref(), Some("ttyA"));
    }

    #[test]
    fn test_guarded_sends_report_not_connected() {
        let (mut session, device) = controller();
        session.send_config();
        assert_eq!(session.state().status_message, STATUS_NOT_CONNECTED);
        session.start_calibration(1000);
        assert!(!session.state().calibrating);
        session.send_heartbeat();
        assert_eq!(session.state().status_message, STATUS_NOT_CONNECTED);
        assert!(device.take_written().is_empty());
    }

    #[test]
    fn test_test_toggle_recorded_while_disconnected() {
        let (mut session, device) = controller();
        session.set_test_gun(2, true);
        assert_eq!(session.state().test_guns, [false, false, true, false]);
        assert_eq!(session.state().status_message, STATUS_NOT_CONNECTED);
        assert!(device.take_written().is_empty());

        session.set_test_gun(4, true);
        assert_eq!(session.state().status_message, "Invalid gun index 4");
    }

    #[test]
    fn test_zone_editing() {
        let (mut session, _) = controller();
        session.add_zone(1);
        session.add_zone(1);
        assert_eq!(session.config().gun(1).unwrap().zones().len(), 2);

        session.remove_zone(1, 0);
        assert_eq!(session.config().gun(1).unwrap().zones().len(), 1);

        session.remove_zone(1, 5);
        assert!(session.state().status_message.contains("out of range"));
    }

    #[test]
    fn test_error_event_becomes_status() {
        let (mut session, _) = controller();
        session.handle_event(TransportEvent::Error("Send error: timed out".to_string()));
        assert_eq!(session.state().status_message, "Send error: timed out");
    }

    #[test]
    fn test_non_calibration_message_is_verbatim_status() {
        let (mut session, _) = controller();
        session.handle_event(TransportEvent::Message(b"READY".to_vec()));
        assert_eq!(session.state().status_message, "READY");
    }

    #[test]
    fn test_non_positive_calibration_not_applied() {
        let (mut session, _) = controller();
        session.handle_event(TransportEvent::Message(
            br#"{"type":"calibration_result","pulsesPerPage":0}"#.to_vec(),
        ));
        assert_eq!(session.config().encoder_pulses_per_mm, 1.0);
        assert_eq!(session.state().status_message, "Calibration result is not usable");
        assert!(session.state().last_calibration.is_some());
    }

    #[test]
    fn test_apply_calibration_without_result() {
        let (mut session, _) = controller();
        session.apply_calibration();
        assert_eq!(session.state().status_message, "No calibration result to apply");
    }

    #[test]
    fn test_profiles_unavailable_without_store() {
        let (mut session, _) = controller();
        session.save_profile("line 1");
        assert_eq!(session.state().status_message, "Profile storage unavailable");
        session.save_profile("   ");
        assert_eq!(session.state().status_message, "Please enter a profile name");
    }
}
