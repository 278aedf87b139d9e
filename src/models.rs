//! Domain objects exchanged with the spreadsheet API.
//!
//! Each type has a validating constructor that enforces the construction
//! rules before anything is sent to the remote system. Identifiers are
//! always assigned by the API; a freshly constructed object has an empty
//! `id` until the API returns one.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ProviderError;

/// Maximum length of a sheet name.
pub const MAX_SHEET_NAME_LEN: usize = 31;

/// Characters that may not appear in a sheet name.
const FORBIDDEN_SHEET_CHARS: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

/// Last column addressable in a sheet.
const MAX_COLUMN: &str = "XFD";

/// A supported spreadsheet file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Extension {
    /// Workbook.
    Xlsx,
    /// Macro-enabled workbook.
    Xlsm,
    /// Template.
    Xltx,
    /// Macro-enabled template.
    Xltm,
}

impl Extension {
    /// All supported extensions, in declaration order.
    pub const ALL: [Extension; 4] = [
        Extension::Xlsx,
        Extension::Xlsm,
        Extension::Xltx,
        Extension::Xltm,
    ];

    /// The extension as it appears in a file name, without the dot.
    pub fn as_str(&self) -> &'static str {
        match self {
            Extension::Xlsx => "xlsx",
            Extension::Xlsm => "xlsm",
            Extension::Xltx => "xltx",
            Extension::Xltm => "xltm",
        }
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Extension {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Extension::ALL
            .into_iter()
            .find(|ext| ext.as_str() == s)
            .ok_or_else(|| {
                let supported: Vec<&str> = Extension::ALL.iter().map(|e| e.as_str()).collect();
                ProviderError::Validation(format!(
                    "unsupported extension '{}', expected one of: {}",
                    s,
                    supported.join(", ")
                ))
            })
    }
}

/// A workbook file managed by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workbook {
    #[serde(default)]
    pub id: String,
    pub file_name: String,
    /// Kept as text so a format the service added later still reads back.
    /// Declared values are checked against [`Extension`].
    pub extension: String,
    pub folder_path: String,
}

impl Workbook {
    /// Build a workbook from declared values, validating each of them.
    pub fn new(
        file_name: impl Into<String>,
        extension: &str,
        folder_path: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let file_name = file_name.into();
        let folder_path = folder_path.into();

        validate_file_name(&file_name)?;
        validate_folder_path(&folder_path)?;

        Ok(Self {
            id: String::new(),
            file_name,
            extension: extension.parse::<Extension>()?.to_string(),
            folder_path,
        })
    }

    /// Attach an existing identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// A sheet inside a workbook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sheet {
    #[serde(default)]
    pub id: String,
    pub workbook_id: String,
    pub name: String,
    #[serde(default)]
    pub pos: i64,
}

impl Sheet {
    /// Build a sheet from declared values.
    ///
    /// `pos` is only a hint; the API decides the final position.
    pub fn new(
        workbook_id: impl Into<String>,
        name: impl Into<String>,
        pos: i64,
    ) -> Result<Self, ProviderError> {
        let workbook_id = workbook_id.into();
        let name = name.into();

        require_parent("workbook_id", &workbook_id)?;
        validate_sheet_name(&name)?;
        validate_pos(pos)?;

        Ok(Self {
            id: String::new(),
            workbook_id,
            name,
            pos,
        })
    }

    /// Attach an existing identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// A single cell inside a sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    #[serde(default)]
    pub id: String,
    pub workbook_id: String,
    pub sheet_id: String,
    #[serde(default)]
    pub row: i64,
    pub column: String,
    #[serde(default)]
    pub value: String,
}

impl Cell {
    /// Build a cell from declared values. The row is left for the API to assign.
    pub fn new(
        workbook_id: impl Into<String>,
        sheet_id: impl Into<String>,
        column: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let workbook_id = workbook_id.into();
        let sheet_id = sheet_id.into();
        let column = column.into();

        require_parent("workbook_id", &workbook_id)?;
        require_parent("sheet_id", &sheet_id)?;
        validate_column(&column)?;

        Ok(Self {
            id: String::new(),
            workbook_id,
            sheet_id,
            row: 0,
            column,
            value: value.into(),
        })
    }

    /// Attach an existing identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the row, used when sending a known row back on update.
    pub fn with_row(mut self, row: i64) -> Self {
        self.row = row;
        self
    }
}

/// Check a file name, given without its extension.
pub fn validate_file_name(file_name: &str) -> Result<(), ProviderError> {
    if file_name.is_empty() {
        return Err(ProviderError::Validation(
            "file_name must not be empty".to_string(),
        ));
    }
    if file_name.contains(&['/', '\\'][..]) {
        return Err(ProviderError::Validation(format!(
            "file_name '{}' must not contain path separators",
            file_name
        )));
    }
    Ok(())
}

/// Check the folder a workbook lives in.
pub fn validate_folder_path(folder_path: &str) -> Result<(), ProviderError> {
    if folder_path.is_empty() {
        return Err(ProviderError::Validation(
            "folder_path must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Check a requested sheet position.
pub fn validate_pos(pos: i64) -> Result<(), ProviderError> {
    if pos < 0 {
        return Err(ProviderError::Validation(format!(
            "pos must not be negative, got {}",
            pos
        )));
    }
    Ok(())
}

/// Check that a parent reference is set.
pub fn require_parent(field: &str, value: &str) -> Result<(), ProviderError> {
    if value.is_empty() {
        return Err(ProviderError::Validation(format!(
            "{} must not be empty",
            field
        )));
    }
    Ok(())
}

/// Check a sheet name against the naming rules of spreadsheet applications.
pub fn validate_sheet_name(name: &str) -> Result<(), ProviderError> {
    if name.is_empty() {
        return Err(ProviderError::Validation(
            "sheet name must not be empty".to_string(),
        ));
    }
    if name.chars().count() > MAX_SHEET_NAME_LEN {
        return Err(ProviderError::Validation(format!(
            "sheet name '{}' exceeds {} characters",
            name, MAX_SHEET_NAME_LEN
        )));
    }
    if let Some(c) = name.chars().find(|c| FORBIDDEN_SHEET_CHARS.contains(c)) {
        return Err(ProviderError::Validation(format!(
            "sheet name '{}' contains forbidden character '{}'",
            name, c
        )));
    }
    Ok(())
}

/// Check a column reference such as `A`, `AB` or `XFD`.
pub fn validate_column(column: &str) -> Result<(), ProviderError> {
    let well_formed = !column.is_empty()
        && column.len() <= MAX_COLUMN.len()
        && column.chars().all(|c| c.is_ascii_uppercase());

    // Same-length uppercase strings compare in column order.
    let in_range = column.len() < MAX_COLUMN.len() || column <= MAX_COLUMN;

    if !well_formed || !in_range {
        return Err(ProviderError::Validation(format!(
            "column '{}' must be 1-3 uppercase letters between A and {}",
            column, MAX_COLUMN
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_parse() {
        assert_eq!("xlsx".parse::<Extension>().unwrap(), Extension::Xlsx);
        assert_eq!("xltm".parse::<Extension>().unwrap(), Extension::Xltm);

        let err = "csv".parse::<Extension>().unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
        assert!(err.message().contains("xlsx, xlsm, xltx, xltm"));

        // Case matters
        assert!("XLSX".parse::<Extension>().is_err());
    }

    #[test]
    fn test_extension_serde() {
        let json = serde_json::to_value(Extension::Xlsm).unwrap();
        assert_eq!(json, serde_json::json!("xlsm"));

        let back: Extension = serde_json::from_value(json).unwrap();
        assert_eq!(back, Extension::Xlsm);
    }

    #[test]
    fn test_workbook_new() {
        let wb = Workbook::new("budget", "xlsx", "/reports").unwrap();
        assert!(wb.id.is_empty());
        assert_eq!(wb.file_name, "budget");
        assert_eq!(wb.extension, Extension::Xlsx.as_str());
        assert_eq!(wb.folder_path, "/reports");
    }

    #[test]
    fn test_workbook_new_rejects_bad_input() {
        assert!(Workbook::new("", "xlsx", "/reports").is_err());
        assert!(Workbook::new("a/b", "xlsx", "/reports").is_err());
        assert!(Workbook::new("budget", "xlsx", "").is_err());
        assert!(Workbook::new("budget", "docx", "/reports").is_err());
    }

    #[test]
    fn test_sheet_name_rules() {
        assert!(validate_sheet_name("Summary 2024").is_ok());
        assert!(validate_sheet_name(&"a".repeat(31)).is_ok());
        assert!(validate_sheet_name(&"a".repeat(32)).is_err());
        assert!(validate_sheet_name("").is_err());
        assert!(validate_sheet_name("Q1/Q2").is_err());
        assert!(validate_sheet_name("[draft]").is_err());
    }

    #[test]
    fn test_sheet_new() {
        let sheet = Sheet::new("wb-1", "Data", 0).unwrap();
        assert_eq!(sheet.workbook_id, "wb-1");
        assert!(Sheet::new("", "Data", 0).is_err());
        assert!(Sheet::new("wb-1", "Data", -1).is_err());
    }

    #[test]
    fn test_column_rules() {
        for ok in ["A", "Z", "AA", "AZ", "ZZ", "AAA", "XFD"] {
            assert!(validate_column(ok).is_ok(), "{} should be valid", ok);
        }
        for bad in ["", "a", "A1", "XFE", "ZZZ", "AAAA", "1"] {
            assert!(validate_column(bad).is_err(), "{} should be invalid", bad);
        }
    }

    #[test]
    fn test_cell_new() {
        let cell = Cell::new("wb-1", "sh-1", "A", "42").unwrap();
        assert_eq!(cell.row, 0);
        assert_eq!(cell.value, "42");
        assert!(Cell::new("wb-1", "", "A", "42").is_err());
        assert!(Cell::new("wb-1", "sh-1", "a", "42").is_err());
    }
}
