//! The `RunAtLoad` flag in the daemon's launchd property list.
//!
//! Reads are for display only. The toggle is a read-modify-write of one key
//! that leaves every other key and the file's serialization format as they
//! were, and lands through a rename so readers never see a partial file.

use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;

use plist::Value;
use tempfile::NamedTempFile;

use crate::error::AutoStartError;

const BINARY_MAGIC: &[u8] = b"bplist";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Xml,
    Binary,
}

struct Loaded {
    value: Value,
    format: Format,
    bytes: Vec<u8>,
}

fn load(path: &Path) -> Result<Loaded, AutoStartError> {
    let bytes = fs::read(path).map_err(|source| AutoStartError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let format = if bytes.starts_with(BINARY_MAGIC) {
        Format::Binary
    } else {
        Format::Xml
    };
    let value = Value::from_reader(Cursor::new(&bytes)).map_err(|source| AutoStartError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Loaded {
        value,
        format,
        bytes,
    })
}

fn flag(value: &Value, path: &Path, key: &str) -> Result<bool, AutoStartError> {
    let dict = value
        .as_dictionary()
        .ok_or_else(|| AutoStartError::NotADictionary(path.to_path_buf()))?;
    match dict.get(key) {
        // launchd treats a missing RunAtLoad as false
        None => Ok(false),
        Some(v) => v.as_boolean().ok_or_else(|| AutoStartError::NotABoolean {
            path: path.to_path_buf(),
            key: key.to_string(),
        }),
    }
}

/// Current value of `key` in the descriptor at `path`.
pub fn read_run_at_load(path: &Path, key: &str) -> Result<bool, AutoStartError> {
    let loaded = load(path)?;
    flag(&loaded.value, path, key)
}

/// Invert `key` in the descriptor at `path` and return the new value.
///
/// An XML file whose root dictionary already holds the key is edited in
/// place, so only the boolean element changes. Binary files and a missing
/// key fall back to re-serializing the whole record.
pub fn toggle_run_at_load(path: &Path, key: &str) -> Result<bool, AutoStartError> {
    let Loaded {
        mut value,
        format,
        bytes,
    } = load(path)?;
    let next = !flag(&value, path, key)?;

    let dict = value
        .as_dictionary_mut()
        .ok_or_else(|| AutoStartError::NotADictionary(path.to_path_buf()))?;
    match dict.get_mut(key) {
        Some(slot) => *slot = Value::Boolean(next),
        None => {
            dict.insert(key.to_string(), Value::Boolean(next));
        }
    }

    let edited = match format {
        Format::Xml => std::str::from_utf8(&bytes)
            .ok()
            .and_then(|text| edit_root_flag(text, key, next))
            .filter(|text| Value::from_reader_xml(text.as_bytes()).ok().as_ref() == Some(&value)),
        Format::Binary => None,
    };
    let buf = match edited {
        Some(text) => text.into_bytes(),
        None => serialize(&value, format, path)?,
    };

    replace_file(path, &buf)?;
    log::info!("{key} in {} set to {next}", path.display());
    Ok(next)
}

fn serialize(value: &Value, format: Format, path: &Path) -> Result<Vec<u8>, AutoStartError> {
    let mut buf = Vec::new();
    let serialized = match format {
        Format::Xml => value.to_writer_xml(&mut buf),
        Format::Binary => value.to_writer_binary(&mut buf),
    };
    serialized.map_err(|source| AutoStartError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(buf)
}

/// Swap the `<true/>`/`<false/>` that follows `<key>{key}</key>` in the root
/// dictionary of an XML plist. `None` when the text is not in that shape.
fn edit_root_flag(text: &str, key: &str, next: bool) -> Option<String> {
    const TRUE: &str = "<true/>";
    const FALSE: &str = "<false/>";

    let wanted = format!("<key>{key}</key>");
    let mut depth = 0usize;
    let mut pos = 0;
    while let Some(off) = text[pos..].find('<') {
        let at = pos + off;
        let rest = &text[at..];
        if rest.starts_with("<!--") {
            pos = at + rest.find("-->")? + 3;
        } else if rest.starts_with("<![CDATA[") {
            pos = at + rest.find("]]>")? + 3;
        } else if rest.starts_with("<dict>") {
            depth += 1;
            pos = at + "<dict>".len();
        } else if rest.starts_with("</dict>") {
            depth = depth.checked_sub(1)?;
            pos = at + "</dict>".len();
        } else if depth == 1 && rest.starts_with(&wanted) {
            let after_key = at + wanted.len();
            let tail = &text[after_key..];
            let start = after_key + (tail.len() - tail.trim_start().len());
            let old = [TRUE, FALSE]
                .into_iter()
                .find(|el| text[start..].starts_with(el))?;
            let new = if next { TRUE } else { FALSE };
            return Some([&text[..start], new, &text[start + old.len()..]].concat());
        } else {
            pos = at + 1;
        }
    }
    None
}

/// Write `contents` next to `path` and rename over it, keeping its mode.
fn replace_file(path: &Path, contents: &[u8]) -> Result<(), AutoStartError> {
    let write_err = |source: std::io::Error| AutoStartError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let permissions = fs::metadata(path).map_err(write_err)?.permissions();

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(contents).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    fs::set_permissions(tmp.path(), permissions).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}
