use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::sensor::{
    FingerprintSensor, Result, SensorPassword, FACTORY_PASSWORD, MAX_TEMPLATE_ID,
};

/// Biometric failures tolerated before the engine hard-locks.
pub const DEFAULT_MAX_ATTEMPTS: u8 = 5;

/// Auth state machine around a fingerprint sensor.
///
/// Two independent secrets with different threat models: the sensor's
/// own command-password (checked by the module hardware, unlimited
/// retries) gates session establishment, and the biometric match gates
/// each privileged request with a hard attempt cap. Once the cap trips,
/// [`softreset`](Self::softreset) locks everything until the device is
/// power-cycled and the engine rebuilt.
pub struct AuthEngine<S> {
    sensor: S,
    /// Enrolled slot id → SHA-256 hex digest of the template's feature
    /// data, rebuilt on every successful sensor initialization.
    templates: BTreeMap<u16, String>,
    num_attempts: u8,
    max_attempts: u8,
    is_default_pswd: bool,
    is_verified: bool,
    is_reset: bool,
}

impl<S: FingerprintSensor> AuthEngine<S> {
    /// Construct at boot, attempting the factory command-password. A
    /// factory-fresh sensor comes up verified with `is_default_pswd`
    /// set; a bootstrapped one stays unverified until
    /// [`verify_master_hash`](Self::verify_master_hash) supplies the
    /// right token.
    pub fn boot(sensor: S) -> Result<Self> {
        Self::boot_with_max_attempts(sensor, DEFAULT_MAX_ATTEMPTS)
    }

    pub fn boot_with_max_attempts(sensor: S, max_attempts: u8) -> Result<Self> {
        let mut engine = Self {
            sensor,
            templates: BTreeMap::new(),
            num_attempts: 0,
            max_attempts,
            is_default_pswd: false,
            is_verified: false,
            is_reset: false,
        };
        engine.setup(FACTORY_PASSWORD)?;
        Ok(engine)
    }

    /// The only entry point for establishing or checking the master
    /// password, driven by the host-derived 4-byte token.
    ///
    /// First use (`is_default_pswd`): rotate the sensor's command-
    /// password from the factory value to the token, then re-initialize
    /// under it. Thereafter: initialize with the token directly — the
    /// sensor accepts it only if it matches the bootstrapped one. Wrong
    /// tokens leave all state untouched; there is no attempt counter on
    /// this path, the sensor's own password check is the barrier.
    pub fn verify_master_hash(&mut self, token: SensorPassword) -> Result<bool> {
        if self.is_reset {
            return Ok(false);
        }
        if self.is_default_pswd {
            if !self.sensor.set_password(FACTORY_PASSWORD, token)? {
                return Ok(false);
            }
            tracing::info!("sensor command-password bootstrapped from factory value");
            return self.setup(token);
        }
        self.setup(token)
    }

    /// One biometric capture/match cycle gating a privileged request.
    /// Success clears the attempt counter; the `max_attempts`-th
    /// consecutive failure soft-resets the sensor and hard-locks the
    /// engine until power cycle.
    pub fn authenticate(&mut self) -> Result<bool> {
        if !self.session_active() {
            return Ok(false);
        }
        if self.num_attempts >= self.max_attempts {
            self.softreset()?;
            return Ok(false);
        }

        let matched = self.verify_fingerprint()?.is_some();
        if matched {
            self.num_attempts = 0;
            return Ok(true);
        }

        self.num_attempts += 1;
        tracing::warn!(
            attempts = self.num_attempts,
            max = self.max_attempts,
            "biometric mismatch"
        );
        if self.num_attempts >= self.max_attempts {
            self.softreset()?;
        }
        Ok(false)
    }

    /// One capture/match cycle that reports the matched template's slot
    /// id and feature digest. Does not touch the attempt counter.
    pub fn verify_fingerprint(&mut self) -> Result<Option<(u16, String)>> {
        if !self.session_active() {
            return Ok(None);
        }
        let Some(id) = self.sensor.capture_match()? else {
            return Ok(None);
        };
        let digest = match self.templates.get(&id) {
            Some(digest) => digest.clone(),
            None => {
                // Enrolled since the last template scan.
                let digest = template_digest(&self.sensor.template_data(id)?);
                self.templates.insert(id, digest.clone());
                digest
            }
        };
        Ok(Some((id, digest)))
    }

    /// Enroll a new fingerprint into the lowest free slot. Returns the
    /// slot id and the template's feature digest.
    pub fn enroll(&mut self) -> Result<(u16, String)> {
        let slot = (1..=MAX_TEMPLATE_ID)
            .find(|slot| !self.templates.contains_key(slot))
            .ok_or(crate::sensor::SensorError::LibraryFull)?;
        self.sensor.enroll(slot)?;
        let digest = template_digest(&self.sensor.template_data(slot)?);
        self.templates.insert(slot, digest.clone());
        tracing::info!(slot, "fingerprint enrolled");
        Ok((slot, digest))
    }

    /// Delete an enrolled fingerprint.
    pub fn delete(&mut self, id: u16) -> Result<()> {
        self.sensor.delete_template(id)?;
        self.templates.remove(&id);
        tracing::info!(id, "fingerprint deleted");
        Ok(())
    }

    /// Soft-reset the sensor and hard-lock the engine. Irrecoverable
    /// until the device is power-cycled and the engine rebuilt.
    pub fn softreset(&mut self) -> Result<()> {
        self.sensor.soft_reset()?;
        self.is_verified = false;
        self.is_default_pswd = false;
        self.is_reset = true;
        tracing::warn!("sensor soft-reset, device locked until power cycle");
        Ok(())
    }

    /// A master-password session exists and the engine is not locked.
    pub fn session_active(&self) -> bool {
        self.is_verified && !self.is_reset
    }

    pub fn is_default_pswd(&self) -> bool {
        self.is_default_pswd
    }

    pub fn is_verified(&self) -> bool {
        self.is_verified
    }

    pub fn is_reset(&self) -> bool {
        self.is_reset
    }

    /// Enrolled slot ids known to this session.
    pub fn template_ids(&self) -> Vec<u16> {
        self.templates.keys().copied().collect()
    }

    /// Initialize the sensor session with a command-password and, on
    /// success, rebuild the template digest registry.
    fn setup(&mut self, password: SensorPassword) -> Result<bool> {
        if self.is_reset {
            return Ok(false);
        }
        if !self.sensor.initialize(password)? {
            return Ok(false);
        }

        self.templates.clear();
        for id in self.sensor.templates()? {
            let digest = template_digest(&self.sensor.template_data(id)?);
            self.templates.insert(id, digest);
        }

        self.is_verified = true;
        self.is_default_pswd = password == FACTORY_PASSWORD;
        self.num_attempts = 0;
        tracing::debug!(
            templates = self.templates.len(),
            default_pswd = self.is_default_pswd,
            "sensor session established"
        );
        Ok(true)
    }
}

fn template_digest(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
