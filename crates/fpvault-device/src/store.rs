use fpvault_proto::Settings;

use crate::flash::{FlashMedium, BLOCK_SIZE, SETTINGS_BLOCKS};

/// Byte width of the sitename field (half a block).
const SITE_FIELD: usize = BLOCK_SIZE / 2;

/// Byte width of the username and password fields (a quarter block each).
const CRED_FIELD: usize = BLOCK_SIZE / 4;

const SETTINGS_SIZE: usize = SETTINGS_BLOCKS * BLOCK_SIZE;

/// Errors from the credential store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sitename must not be empty")]
    EmptySite,

    #[error("sitename {0:?} already exists")]
    DuplicateSite(String),

    #[error("sitename {0:?} not known")]
    UnknownSite(String),

    #[error("update must supply a new username, a new password, or both")]
    NothingToUpdate,

    #[error("{field} is {len} bytes, max {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("{field} must be ASCII")]
    NotAscii { field: &'static str },

    #[error("entry region full ({capacity} entries)")]
    RegionFull { capacity: usize },

    #[error("encoded settings are {len} bytes, max {max}")]
    SettingsTooLarge { len: usize, max: usize },

    #[error(transparent)]
    Flash(#[from] crate::flash::FlashError),

    #[error("settings encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// One stored entry. `username` and `password` are opaque ciphertext
/// strings produced by the host; the device never interprets them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialEntry {
    pub sitename: String,
    pub username: String,
    pub password: String,
}

/// Block-addressed flash persistence of settings and site entries.
///
/// Layout: `SETTINGS_BLOCKS` of null-padded JSON settings at offset 0,
/// then one 256-byte block per entry (`sitename[128] | username[64] |
/// password[64]`, each null-padded ASCII). Every mutation rewrites the
/// whole region — a simplicity-over-endurance tradeoff that also makes
/// writes all-or-nothing; no read is served while a rewrite is in
/// progress (`&mut self` on every mutating path).
pub struct CredentialStore<F> {
    flash: F,
    entries: Vec<CredentialEntry>,
    settings: Settings,
}

impl<F: FlashMedium> CredentialStore<F> {
    /// Read and parse the region. A corrupt settings region resets to
    /// the default rather than failing startup; unparseable entry
    /// blocks are skipped.
    pub fn open(mut flash: F) -> Result<Self> {
        let raw = flash.read_region()?;

        let settings_bytes = raw.get(..SETTINGS_SIZE.min(raw.len())).unwrap_or(&[]);
        let settings = match serde_json::from_slice(trim_padding(settings_bytes)) {
            Ok(settings) => settings,
            Err(err) => {
                tracing::warn!(%err, "settings region unreadable, resetting to default");
                Settings::default()
            }
        };

        let mut entries = Vec::new();
        if raw.len() > SETTINGS_SIZE {
            for block in raw[SETTINGS_SIZE..].chunks_exact(BLOCK_SIZE) {
                if let Some(entry) = parse_entry(block) {
                    entries.push(entry);
                }
            }
        }

        tracing::debug!(entries = entries.len(), "credential store loaded");
        Ok(Self {
            flash,
            entries,
            settings,
        })
    }

    /// Number of entry blocks the region can hold.
    pub fn capacity(&self) -> usize {
        (self.flash.capacity() - SETTINGS_SIZE) / BLOCK_SIZE
    }

    /// Remaining entry slots.
    pub fn available(&self) -> usize {
        self.capacity() - self.entries.len()
    }

    /// Insert a new entry. Fails if the sitename already exists.
    pub fn add(&mut self, sitename: &str, username: &str, password: &str) -> Result<()> {
        check_field("sitename", sitename, SITE_FIELD)?;
        check_field("username", username, CRED_FIELD)?;
        check_field("password", password, CRED_FIELD)?;
        if sitename.is_empty() {
            return Err(StoreError::EmptySite);
        }
        if self.index_of(sitename).is_some() {
            return Err(StoreError::DuplicateSite(sitename.to_string()));
        }
        if self.available() == 0 {
            return Err(StoreError::RegionFull {
                capacity: self.capacity(),
            });
        }

        self.entries.push(CredentialEntry {
            sitename: sitename.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        });
        self.persist()
    }

    /// Fetch the stored ciphertext pair for a site.
    pub fn get(&self, sitename: &str) -> Result<(&str, &str)> {
        let idx = self
            .index_of(sitename)
            .ok_or_else(|| StoreError::UnknownSite(sitename.to_string()))?;
        let entry = &self.entries[idx];
        Ok((&entry.username, &entry.password))
    }

    /// Replace the supplied fields, leaving the other untouched. Fails
    /// if the site is absent or both fields are `None`.
    pub fn update(
        &mut self,
        sitename: &str,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<()> {
        if username.is_none() && password.is_none() {
            return Err(StoreError::NothingToUpdate);
        }
        if let Some(username) = username {
            check_field("username", username, CRED_FIELD)?;
        }
        if let Some(password) = password {
            check_field("password", password, CRED_FIELD)?;
        }
        let idx = self
            .index_of(sitename)
            .ok_or_else(|| StoreError::UnknownSite(sitename.to_string()))?;

        if let Some(username) = username {
            self.entries[idx].username = username.to_string();
        }
        if let Some(password) = password {
            self.entries[idx].password = password.to_string();
        }
        self.persist()
    }

    /// Remove a site entry. Fails if absent, without mutating the region.
    pub fn delete(&mut self, sitename: &str) -> Result<()> {
        let idx = self
            .index_of(sitename)
            .ok_or_else(|| StoreError::UnknownSite(sitename.to_string()))?;
        self.entries.remove(idx);
        self.persist()
    }

    /// All stored site labels. Unassigned slots never surface here —
    /// zero-filled blocks parse to empty sitenames and are dropped at
    /// load time.
    pub fn all_sites(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.sitename.clone()).collect()
    }

    /// Current settings with the derived capacity field recomputed.
    pub fn settings(&self) -> Settings {
        let mut settings = self.settings.clone();
        settings.num_pswd_avail = self.available() as u32;
        settings
    }

    /// Replace the persisted settings wholesale.
    pub fn set_settings(&mut self, settings: Settings) -> Result<()> {
        self.settings = settings;
        self.persist()
    }

    /// Record an enrolled fingerprint's display name.
    pub fn register_fingerprint(&mut self, id: u16, name: &str) -> Result<()> {
        self.settings.fingerprints.insert(id, name.to_string());
        self.persist()
    }

    /// Drop an enrolled fingerprint's display name.
    pub fn unregister_fingerprint(&mut self, id: u16) -> Result<()> {
        self.settings.fingerprints.remove(&id);
        self.persist()
    }

    /// Consume the store and hand back the flash medium.
    pub fn into_flash(self) -> F {
        self.flash
    }

    fn index_of(&self, sitename: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.sitename == sitename)
    }

    /// Serialize settings + every entry and rewrite the whole region.
    fn persist(&mut self) -> Result<()> {
        let mut settings = self.settings.clone();
        settings.num_pswd_avail = self.available() as u32;
        let encoded = serde_json::to_vec(&settings)?;
        if encoded.len() > SETTINGS_SIZE {
            return Err(StoreError::SettingsTooLarge {
                len: encoded.len(),
                max: SETTINGS_SIZE,
            });
        }

        let mut region = Vec::with_capacity(SETTINGS_SIZE + self.entries.len() * BLOCK_SIZE);
        region.extend_from_slice(&encoded);
        region.resize(SETTINGS_SIZE, 0);

        for entry in &self.entries {
            let base = region.len();
            region.resize(base + BLOCK_SIZE, 0);
            region[base..base + entry.sitename.len()].copy_from_slice(entry.sitename.as_bytes());
            let user = base + SITE_FIELD;
            region[user..user + entry.username.len()].copy_from_slice(entry.username.as_bytes());
            let pass = user + CRED_FIELD;
            region[pass..pass + entry.password.len()].copy_from_slice(entry.password.as_bytes());
        }

        self.flash.write_region(&region)?;
        Ok(())
    }
}

fn check_field(field: &'static str, value: &str, max: usize) -> Result<()> {
    if !value.is_ascii() {
        return Err(StoreError::NotAscii { field });
    }
    if value.contains('\0') {
        return Err(StoreError::NotAscii { field });
    }
    if value.len() > max {
        return Err(StoreError::FieldTooLong {
            field,
            len: value.len(),
            max,
        });
    }
    Ok(())
}

fn parse_entry(block: &[u8]) -> Option<CredentialEntry> {
    let sitename = parse_field(&block[..SITE_FIELD])?;
    if sitename.is_empty() {
        return None; // unassigned slot
    }
    let username = parse_field(&block[SITE_FIELD..SITE_FIELD + CRED_FIELD])?;
    let password = parse_field(&block[SITE_FIELD + CRED_FIELD..])?;
    Some(CredentialEntry {
        sitename,
        username,
        password,
    })
}

fn parse_field(bytes: &[u8]) -> Option<String> {
    let trimmed = trim_padding(bytes);
    if !trimmed.is_ascii() {
        tracing::warn!("skipping entry block with non-ASCII field");
        return None;
    }
    Some(String::from_utf8_lossy(trimmed).into_owned())
}

fn trim_padding(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &bytes[..end]
}
