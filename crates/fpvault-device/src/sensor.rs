use std::collections::{BTreeMap, VecDeque};

/// The sensor's 4-byte command-password.
pub type SensorPassword = [u8; 4];

/// Factory command-password shipped on a fresh sensor module.
pub const FACTORY_PASSWORD: SensorPassword = [0, 0, 0, 0];

/// Highest usable template slot id.
pub const MAX_TEMPLATE_ID: u16 = 127;

/// Errors from the fingerprint sensor capability.
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    /// The serial link to the sensor module failed.
    #[error("sensor link error: {0}")]
    Link(String),

    /// The sensor rejected a command with a module status code.
    #[error("sensor rejected command (code {0:#04x})")]
    Command(u8),

    /// No free template slot for enrollment.
    #[error("template library full")]
    LibraryFull,

    /// The requested template slot holds no template.
    #[error("unknown template id {0}")]
    UnknownTemplate(u16),
}

pub type Result<T> = std::result::Result<T, SensorError>;

/// Capability interface over a password-protected fingerprint sensor
/// module. The auth engine consumes this; it never drives the sensor's
/// wire protocol itself.
///
/// Password-gated commands return `Ok(false)` when the module refuses
/// the supplied command-password; `Err` is reserved for link and
/// protocol faults.
pub trait FingerprintSensor {
    /// Initialize the module session with a command-password.
    fn initialize(&mut self, password: SensorPassword) -> Result<bool>;

    /// Change the command-password. Requires the current one.
    fn set_password(&mut self, current: SensorPassword, new: SensorPassword) -> Result<bool>;

    /// Slot ids of all enrolled templates.
    fn templates(&mut self) -> Result<Vec<u16>>;

    /// Raw feature data for one enrolled template.
    fn template_data(&mut self, id: u16) -> Result<Vec<u8>>;

    /// Run one capture/match cycle. `Ok(None)` means no finger matched.
    fn capture_match(&mut self) -> Result<Option<u16>>;

    /// Drive an enrollment cycle and store the template in `slot`.
    fn enroll(&mut self, slot: u16) -> Result<()>;

    /// Delete an enrolled template.
    fn delete_template(&mut self, id: u16) -> Result<()>;

    /// Soft-reset the module. It will refuse everything until the next
    /// power cycle.
    fn soft_reset(&mut self) -> Result<()>;
}

/// In-memory sensor with scripted match outcomes, for tests and the
/// device simulator.
///
/// Capture results are driven by a queue: each `capture_match` pops the
/// next scripted outcome, and an empty queue falls back to
/// `default_match`.
pub struct ScriptedSensor {
    password: SensorPassword,
    session_open: bool,
    reset: bool,
    templates: BTreeMap<u16, Vec<u8>>,
    captures: VecDeque<Option<u16>>,
    /// Outcome used when the capture script runs dry.
    pub default_match: Option<u16>,
}

impl ScriptedSensor {
    /// A factory-fresh sensor: default password, empty library.
    pub fn new() -> Self {
        Self {
            password: FACTORY_PASSWORD,
            session_open: false,
            reset: false,
            templates: BTreeMap::new(),
            captures: VecDeque::new(),
            default_match: None,
        }
    }

    /// A sensor with one enrolled template that every capture matches —
    /// the simulator's "always authenticated" configuration.
    pub fn always_matching() -> Self {
        let mut sensor = Self::new();
        sensor.templates.insert(1, b"scripted-template-1".to_vec());
        sensor.default_match = Some(1);
        sensor
    }

    /// Pre-enroll a template with explicit feature data.
    pub fn with_template(mut self, id: u16, data: &[u8]) -> Self {
        self.templates.insert(id, data.to_vec());
        self
    }

    /// Start from a non-factory command-password (a previously
    /// bootstrapped device).
    pub fn with_password(mut self, password: SensorPassword) -> Self {
        self.password = password;
        self
    }

    /// Queue capture outcomes, consumed in order.
    pub fn script_captures(&mut self, outcomes: impl IntoIterator<Item = Option<u16>>) {
        self.captures.extend(outcomes);
    }

    fn check_session(&self) -> Result<()> {
        if self.reset || !self.session_open {
            return Err(SensorError::Command(0x21)); // module: password not verified
        }
        Ok(())
    }
}

impl Default for ScriptedSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl FingerprintSensor for ScriptedSensor {
    fn initialize(&mut self, password: SensorPassword) -> Result<bool> {
        if self.reset {
            return Ok(false);
        }
        self.session_open = password == self.password;
        Ok(self.session_open)
    }

    fn set_password(&mut self, current: SensorPassword, new: SensorPassword) -> Result<bool> {
        if self.reset || current != self.password {
            return Ok(false);
        }
        self.password = new;
        self.session_open = false; // must re-initialize with the new password
        Ok(true)
    }

    fn templates(&mut self) -> Result<Vec<u16>> {
        self.check_session()?;
        Ok(self.templates.keys().copied().collect())
    }

    fn template_data(&mut self, id: u16) -> Result<Vec<u8>> {
        self.check_session()?;
        self.templates
            .get(&id)
            .cloned()
            .ok_or(SensorError::UnknownTemplate(id))
    }

    fn capture_match(&mut self) -> Result<Option<u16>> {
        self.check_session()?;
        let outcome = self.captures.pop_front().unwrap_or(self.default_match);
        Ok(outcome.filter(|id| self.templates.contains_key(id)))
    }

    fn enroll(&mut self, slot: u16) -> Result<()> {
        self.check_session()?;
        if slot == 0 || slot > MAX_TEMPLATE_ID {
            return Err(SensorError::Command(0x0b)); // bad storage location
        }
        self.templates
            .insert(slot, format!("scripted-template-{slot}").into_bytes());
        Ok(())
    }

    fn delete_template(&mut self, id: u16) -> Result<()> {
        self.check_session()?;
        if self.templates.remove(&id).is_none() {
            return Err(SensorError::UnknownTemplate(id));
        }
        Ok(())
    }

    fn soft_reset(&mut self) -> Result<()> {
        self.reset = true;
        self.session_open = false;
        Ok(())
    }
}
