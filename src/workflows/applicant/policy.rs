use chrono::{Datelike, Local};
use serde::{Deserialize, Serialize};

use super::validators::ADULT_AGE;

/// Knobs covering the behavioral differences between wizard deployments.
///
/// The default is the strictest rule set: checksum, password strength and age
/// are all enforced, and address fields filled by a lookup become read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardPolicy {
    pub lock_resolved_address: bool,
    pub require_address_lookup: bool,
    pub enforce_password_strength: bool,
    pub require_course_name: bool,
    pub minimum_age: u32,
    /// Pins the calendar year used by the age rule. `None` follows the local clock.
    #[serde(default)]
    pub reference_year: Option<i32>,
}

impl Default for WizardPolicy {
    fn default() -> Self {
        Self {
            lock_resolved_address: true,
            require_address_lookup: false,
            enforce_password_strength: true,
            require_course_name: true,
            minimum_age: ADULT_AGE,
            reference_year: None,
        }
    }
}

impl WizardPolicy {
    pub fn current_year(&self) -> i32 {
        self.reference_year.unwrap_or_else(|| Local::now().year())
    }
}
