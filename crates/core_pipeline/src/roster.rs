//! Captured-student roster with CSV import/export
//!
//! Students are keyed by student number. Capturing a known number again
//! replaces the entry when the name differs (a better OCR read), and is
//! reported as a duplicate when it does not.

use crate::types::StudentIdentity;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Header row of an exported roster
pub const CSV_HEADERS: [&str; 4] = ["Name", "Student Number", "Program", "Timestamp"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Student Number")]
    pub student_number: String,
    #[serde(rename = "Program", default)]
    pub program: String,
    #[serde(rename = "Timestamp", default)]
    pub timestamp: String,
}

impl RosterEntry {
    pub fn new(identity: &StudentIdentity, program: &str, timestamp: &str) -> Self {
        Self {
            name: identity.name.trim().to_string(),
            student_number: identity.student_number.trim().to_string(),
            program: program.trim().to_string(),
            timestamp: timestamp.to_string(),
        }
    }
}

/// What [`Roster::record`] did with a capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterUpdate {
    Added,
    /// Same student number, different name: the entry was replaced
    Updated,
    /// Same student number and name (ignoring case)
    AlreadyExists,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    entries: Vec<RosterEntry>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add a captured identity, deduplicating by student number
    pub fn record(&mut self, identity: &StudentIdentity, program: &str, timestamp: &str) -> RosterUpdate {
        let entry = RosterEntry::new(identity, program, timestamp);

        match self
            .entries
            .iter_mut()
            .find(|existing| existing.student_number.trim() == entry.student_number)
        {
            Some(existing) if existing.name.trim().to_lowercase() == entry.name.to_lowercase() => {
                RosterUpdate::AlreadyExists
            }
            Some(existing) => {
                *existing = entry;
                RosterUpdate::Updated
            }
            None => {
                self.entries.push(entry);
                RosterUpdate::Added
            }
        }
    }

    /// Load a roster previously written by [`Roster::write_csv`]
    pub fn read_csv<R: Read>(reader: R) -> Result<Self, csv::Error> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let entries = csv_reader
            .deserialize()
            .collect::<Result<Vec<RosterEntry>, _>>()?;
        Ok(Self { entries })
    }

    /// Write the header row and one row per entry, in capture order
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut csv_writer = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(writer);
        csv_writer.write_record(CSV_HEADERS)?;
        for entry in &self.entries {
            csv_writer.serialize(entry)?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}
