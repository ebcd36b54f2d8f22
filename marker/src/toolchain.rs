//! Alternate toolchain detection.
//!
//! Some assignments let students opt into a different backend (an IR interpreter, an
//! emulator) through a boolean in a TOML file at the repository root. The check only
//! feeds statistics, so a missing key reads as `false`.

use toml::Table;

use crate::error::MarkerError;

/// Reads boolean `key` from a TOML document. Dotted keys address nested tables.
pub fn flag_enabled(bytes: &[u8], key: &str) -> Result<bool, MarkerError> {
    let text = std::str::from_utf8(bytes).map_err(|e| MarkerError::InvalidToolchainFile(e.to_string()))?;
    let table: Table = text
        .parse()
        .map_err(|e: toml::de::Error| MarkerError::InvalidToolchainFile(e.message().to_string()))?;

    let mut parts = key.split('.');
    let Some(first) = parts.next() else {
        return Ok(false);
    };
    let mut value = table.get(first);
    for part in parts {
        value = value.and_then(|v| v.get(part));
    }

    match value {
        None => Ok(false),
        Some(v) => v
            .as_bool()
            .ok_or_else(|| MarkerError::InvalidToolchainFile(format!("`{key}` is not a boolean"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_top_level_flag() {
        assert!(flag_enabled(b"use_qemu = true\n", "use_qemu").unwrap());
        assert!(!flag_enabled(b"use_qemu = false\n", "use_qemu").unwrap());
    }

    #[test]
    fn missing_key_is_false() {
        assert!(!flag_enabled(b"use_qemu = true\n", "use_accipit").unwrap());
        assert!(!flag_enabled(b"", "use_accipit").unwrap());
    }

    #[test]
    fn dotted_key_reads_nested_table() {
        let doc = b"[backend]\nuse_accipit = true\n";
        assert!(flag_enabled(doc, "backend.use_accipit").unwrap());
    }

    #[test]
    fn broken_documents_are_errors() {
        assert!(matches!(
            flag_enabled(b"use_qemu = \n", "use_qemu"),
            Err(MarkerError::InvalidToolchainFile(_))
        ));
        assert!(matches!(
            flag_enabled(b"use_qemu = \"yes\"\n", "use_qemu"),
            Err(MarkerError::InvalidToolchainFile(_))
        ));
    }
}
