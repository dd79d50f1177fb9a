use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Device settings, persisted JSON-encoded in the flash settings region
/// and returned by `getSettings`.
///
/// `fingerprints` maps enrolled template slot ids to display names.
/// `numPswdAvail` is derived — the store recomputes it on every read —
/// but it travels inside the structure so the host sees one object.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub fingerprints: BTreeMap<u16, String>,
    #[serde(rename = "numPswdAvail")]
    pub num_pswd_avail: u32,
}
