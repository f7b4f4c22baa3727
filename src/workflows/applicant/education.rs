use serde::{Deserialize, Serialize};

use super::domain::{EducationEntry, EntryId};

/// Ordered, repeatable education sub-records with position-independent identities.
///
/// Identities come from a per-section counter and are never reused, so removing
/// a row while another one is being edited cannot hit the wrong entry. The
/// section may be empty while the applicant edits; the at-least-one rule is
/// checked when leaving step 3.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<EducationEntry>", into = "Vec<EducationEntry>")]
pub struct EducationSection {
    entries: Vec<EducationEntry>,
    next_id: u64,
}

impl Default for EducationSection {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
        }
    }
}

impl EducationSection {
    /// Append a blank entry and return its identity.
    pub fn add(&mut self) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        self.entries.push(EducationEntry::template(id));
        id
    }

    /// Remove the entry with `id`. Unknown identities are ignored.
    pub fn remove(&mut self, id: EntryId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    pub fn get(&self, id: EntryId) -> Option<&EducationEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn get_mut(&mut self, id: EntryId) -> Option<&mut EducationEntry> {
        self.entries.iter_mut().find(|entry| entry.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EducationEntry> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[EducationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<EducationEntry>> for EducationSection {
    fn from(entries: Vec<EducationEntry>) -> Self {
        let next_id = entries
            .iter()
            .map(|entry| entry.id.0)
            .max()
            .map_or(1, |max| max + 1);
        Self { entries, next_id }
    }
}

impl From<EducationSection> for Vec<EducationEntry> {
    fn from(section: EducationSection) -> Self {
        section.entries
    }
}
