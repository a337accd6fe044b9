//! `_metacmm.txt`, the provenance marker written into every DLC folder
//! installed by the mod manager.
//!
//! ```text
//! <mod name>
//! <mod version>
//! <installed by>
//! <installer instance id>
//! [INSTALLOPTIONS]option a;option b
//! [INCOMPATIBLEDLC]DLC_MOD_X;DLC_MOD_Y
//! [EXTENDEDATTRIBUTE]key=value
//! ```
//!
//! The first four lines are positional; the tagged lines are optional and may
//! appear in any order. Unknown tagged lines are ignored when reading.

use crate::error::{MergeDlcError, Result};
use camino::Utf8Path;
use std::collections::BTreeMap;
use std::fmt;

/// File name of the marker inside a DLC folder.
pub const METACMM_FILE_NAME: &str = "_metacmm.txt";

const PREFIX_INSTALL_OPTIONS: &str = "[INSTALLOPTIONS]";
const PREFIX_INCOMPATIBLE_DLC: &str = "[INCOMPATIBLEDLC]";
const PREFIX_EXTENDED_ATTRIBUTE: &str = "[EXTENDEDATTRIBUTE]";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaCmm {
    pub mod_name: String,
    pub version: String,
    /// Version of the application that installed the DLC.
    pub installed_by: String,
    /// Id of the installer session that produced the folder.
    pub installer_instance_id: String,
    pub options_selected_at_install: Vec<String>,
    pub incompatible_dlc: Vec<String>,
    pub extended_attributes: BTreeMap<String, String>,
}

impl MetaCmm {
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut meta = MetaCmm::default();

        for (index, line) in text.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            match index {
                0 => meta.mod_name = line.to_string(),
                1 => meta.version = line.to_string(),
                2 => meta.installed_by = line.to_string(),
                3 => meta.installer_instance_id = line.to_string(),
                _ => meta.parse_extended_line(line)?,
            }
        }
        Ok(meta)
    }

    fn parse_extended_line(&mut self, line: &str) -> Result<()> {
        if let Some(list) = line.strip_prefix(PREFIX_INSTALL_OPTIONS) {
            self.options_selected_at_install = split_list(list);
        } else if let Some(list) = line.strip_prefix(PREFIX_INCOMPATIBLE_DLC) {
            self.incompatible_dlc = split_list(list);
        } else if let Some(attribute) = line.strip_prefix(PREFIX_EXTENDED_ATTRIBUTE) {
            let (key, value) = attribute.split_once('=').ok_or_else(|| {
                MergeDlcError::InvalidMetaCmm(format!("extended attribute without value: {line}"))
            })?;
            self.extended_attributes
                .insert(key.trim().to_string(), value.trim().to_string());
        }
        Ok(())
    }

    pub fn read(path: &Utf8Path) -> Result<Self> {
        Self::parse(&std::fs::read_to_string(path)?)
    }

    pub fn write(&self, path: &Utf8Path) -> Result<()> {
        std::fs::write(path, self.to_string())?;
        Ok(())
    }
}

impl fmt::Display for MetaCmm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.mod_name)?;
        writeln!(f, "{}", self.version)?;
        writeln!(f, "{}", self.installed_by)?;
        writeln!(f, "{}", self.installer_instance_id)?;
        if !self.options_selected_at_install.is_empty() {
            writeln!(
                f,
                "{}{}",
                PREFIX_INSTALL_OPTIONS,
                self.options_selected_at_install.join(";")
            )?;
        }
        if !self.incompatible_dlc.is_empty() {
            writeln!(f, "{}{}", PREFIX_INCOMPATIBLE_DLC, self.incompatible_dlc.join(";"))?;
        }
        for (key, value) in &self.extended_attributes {
            writeln!(f, "{}{}={}", PREFIX_EXTENDED_ATTRIBUTE, key, value)?;
        }
        Ok(())
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split(';')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
