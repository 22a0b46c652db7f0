//! Encoding and decoding of the `Setting,Value` status file.
//!
//! The format is a header line followed by one `key,value` row per setting.
//! Values are written verbatim: there is no quoting or escaping, because the
//! rig controller reads the file with a plain CSV reader.

use serde::{Deserialize, Serialize};

use crate::types::{STATUS_HEADER, Setting, StatusError};

/// A decoded status file: ordered `key,value` rows.
///
/// Lookups return the first row with a matching key. Unknown keys are kept
/// so that re-encoding a table written by another process preserves them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsTable {
    rows: Vec<(String, String)>,
}

impl SettingsTable {
    /// Decodes the contents of a status file.
    ///
    /// Both `\n` and `\r\n` line endings are accepted. Blank lines are
    /// ignored. Each data row is split on its first comma.
    ///
    /// # Errors
    ///
    /// Returns [`StatusError::Malformed`] if the header is missing or wrong,
    /// or if a non-blank data line has no comma.
    pub fn decode(contents: &str) -> Result<Self, StatusError> {
        let mut lines = contents.lines();

        let header =
            lines.next().ok_or_else(|| StatusError::Malformed("empty file".to_string()))?;
        if header.trim() != STATUS_HEADER {
            return Err(StatusError::Malformed(format!("unexpected header {header:?}")));
        }

        let mut rows = Vec::new();
        for (idx, line) in lines.enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let (key, value) = line.split_once(',').ok_or_else(|| {
                StatusError::Malformed(format!("line {} has no delimiter: {line:?}", idx + 2))
            })?;
            rows.push((key.to_string(), value.to_string()));
        }

        Ok(Self { rows })
    }

    /// Encodes the table as file contents, header first.
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(STATUS_HEADER.len() + 1 + self.rows.len() * 16);
        out.push_str(STATUS_HEADER);
        out.push('\n');
        for (key, value) in &self.rows {
            out.push_str(key);
            out.push(',');
            out.push_str(value);
            out.push('\n');
        }
        out
    }

    /// Returns the raw value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.rows.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Returns the value of `setting`, or `fallback` if the row is absent.
    pub fn get_or<'a>(&'a self, setting: Setting, fallback: &'a str) -> &'a str {
        self.get(setting.key()).unwrap_or(fallback)
    }

    /// Replaces the value of an existing setting in place.
    ///
    /// Returns `false` and leaves the table untouched if the setting has no
    /// row. Row order is preserved.
    pub fn update(&mut self, setting: Setting, value: impl Into<String>) -> bool {
        match self.rows.iter_mut().find(|(k, _)| k == setting.key()) {
            Some((_, v)) => {
                *v = value.into();
                true
            }
            None => false,
        }
    }

    /// Iterates over the rows in file order.
    pub fn rows(&self) -> impl Iterator<Item = (&str, &str)> {
        self.rows.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no data rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A full snapshot of the rig status, one field per [`Setting`].
///
/// Serialized with the same field names the web UI uses in its task payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    /// `JOINT`
    pub part: String,
    /// `SPEED`
    pub speed: String,
    /// `START_POS`
    pub pos1: String,
    /// `END_POS`
    pub pos2: String,
    /// `R_STATUS`
    pub action: String,
    /// `C2COMPLETE`
    pub total_cycle: String,
    /// `CC_COMPLETE`
    pub current_cycle: String,
    /// `Jogging`
    pub jogging: String,
}

impl Default for StatusRecord {
    fn default() -> Self {
        Self {
            part: Setting::Joint.default_value().to_string(),
            speed: Setting::Speed.default_value().to_string(),
            pos1: Setting::StartPos.default_value().to_string(),
            pos2: Setting::EndPos.default_value().to_string(),
            action: Setting::RunStatus.default_value().to_string(),
            total_cycle: Setting::TargetCycles.default_value().to_string(),
            current_cycle: Setting::CompletedCycles.default_value().to_string(),
            jogging: Setting::Jogging.default_value().to_string(),
        }
    }
}

impl StatusRecord {
    /// Returns the value held for `setting`.
    pub fn value(&self, setting: Setting) -> &str {
        match setting {
            Setting::Joint => &self.part,
            Setting::Speed => &self.speed,
            Setting::StartPos => &self.pos1,
            Setting::EndPos => &self.pos2,
            Setting::RunStatus => &self.action,
            Setting::TargetCycles => &self.total_cycle,
            Setting::CompletedCycles => &self.current_cycle,
            Setting::Jogging => &self.jogging,
        }
    }

    /// Builds a record from a decoded table, using write defaults for
    /// absent rows.
    pub fn from_table(table: &SettingsTable) -> Self {
        let field = |setting: Setting| table.get_or(setting, setting.default_value()).to_string();
        Self {
            part: field(Setting::Joint),
            speed: field(Setting::Speed),
            pos1: field(Setting::StartPos),
            pos2: field(Setting::EndPos),
            action: field(Setting::RunStatus),
            total_cycle: field(Setting::TargetCycles),
            current_cycle: field(Setting::CompletedCycles),
            jogging: field(Setting::Jogging),
        }
    }

    /// Converts the record into a table with one row per setting in
    /// on-disk order.
    pub fn to_table(&self) -> SettingsTable {
        SettingsTable {
            rows: Setting::ALL
                .iter()
                .map(|s| (s.key().to_string(), self.value(*s).to_string()))
                .collect(),
        }
    }

    /// Encodes the record as full file contents.
    pub fn encode(&self) -> String {
        self.to_table().encode()
    }

    /// Returns the settings whose value contains a comma or a line break.
    ///
    /// Such values are written unescaped and will be misread by a CSV reader.
    pub fn delimiter_conflicts(&self) -> Vec<Setting> {
        Setting::ALL
            .into_iter()
            .filter(|s| self.value(*s).contains([',', '\n', '\r']))
            .collect()
    }

    /// Returns the settings whose value contains a line break.
    ///
    /// A line break splits the row, leaving a file no reader can decode.
    pub fn line_breaks(&self) -> Vec<Setting> {
        Setting::ALL.into_iter().filter(|s| self.value(*s).contains(['\n', '\r'])).collect()
    }
}
