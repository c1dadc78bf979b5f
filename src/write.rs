use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
};

/// Creates or truncates `path` and writes `contents` to it, creating missing
/// parent directories first.
pub fn write(path: &Path, contents: &str) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(contents.as_bytes())?;
    writer.flush()?;

    Ok(())
}
