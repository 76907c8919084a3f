//! Download cache for pretrained weights and label tables.
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use safetensors::SafeTensors;

use crate::config::Config;
use crate::error::{Error, Result};

/// Returns the cached copy of `url`, fetching it on first use.
///
/// The file lands in `<cache_dir>/<subdir>/<file_name>`. It is written to a
/// `.part` sibling first and only renamed once `validate` accepted it, so an
/// interrupted download never shows up as a cache hit.
pub fn cached_file<F>(
    config: &Config,
    subdir: &str,
    file_name: &str,
    url: &str,
    validate: F,
) -> Result<PathBuf>
where
    F: FnOnce(&Path) -> Result<()>,
{
    let dir = config.cache_dir.join(subdir);
    let target = dir.join(file_name);
    if target.is_file() {
        tracing::debug!(path = %target.display(), "cache hit");
        return Ok(target);
    }
    fs::create_dir_all(&dir)?;
    let partial = dir.join(format!("{file_name}.part"));
    tracing::info!(%url, path = %target.display(), "downloading");
    let outcome = download(url, &partial).and_then(|()| validate(&partial));
    if let Err(err) = outcome {
        let _ = fs::remove_file(&partial);
        return Err(err);
    }
    fs::rename(&partial, &target)?;
    Ok(target)
}

fn download(source_url: &str, target_file: &Path) -> Result<()> {
    let response = ureq::get(source_url).call()?;
    let status = response.status();
    if status != 200 {
        return Err(Error::Download { url: source_url.to_string(), status });
    }
    let f = fs::File::create(target_file)?;
    let mut writer = BufWriter::new(f);
    let mut reader = response.into_reader();
    let bytes = io::copy(&mut reader, &mut writer)?;
    writer.flush()?;
    tracing::debug!(bytes, "download complete");
    Ok(())
}

/// Checks that `path` holds a well-formed safetensors file.
pub fn validate_safetensors(path: &Path) -> Result<()> {
    let bytes = fs::read(path)?;
    let tensors = SafeTensors::deserialize(&bytes).map_err(|err| Error::SafeTensors {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    if tensors.is_empty() {
        return Err(Error::SafeTensors {
            path: path.to_path_buf(),
            reason: "no tensors".to_string(),
        });
    }
    tracing::debug!(tensors = tensors.len(), "validated safetensors file");
    Ok(())
}

/// Checks that `path` holds a JSON document.
pub fn validate_json(path: &Path) -> Result<()> {
    let file = io::BufReader::new(fs::File::open(path)?);
    let _: serde_json::Value = serde_json::from_reader(file)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_config(name: &str) -> Config {
        let cache_dir = std::env::temp_dir()
            .join(format!("mobilenet-classify-download-{}-{name}", std::process::id()));
        Config { cache_dir, ..Default::default() }
    }

    #[test]
    fn cache_hit_skips_the_network() {
        let config = scratch_config("hit");
        let dir = config.cache_dir.join("labels");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("index.json"), "{}").unwrap();
        // The URL is never contacted on a cache hit.
        let path =
            cached_file(&config, "labels", "index.json", "http://invalid.invalid/", validate_json)
                .unwrap();
        assert_eq!(path, dir.join("index.json"));
        fs::remove_dir_all(&config.cache_dir).unwrap();
    }

    #[test]
    fn rejects_truncated_safetensors() {
        let path = std::env::temp_dir()
            .join(format!("mobilenet-classify-truncated-{}.safetensors", std::process::id()));
        fs::write(&path, [8u8, 0, 0, 0, 0, 0, 0, 0, b'{']).unwrap();
        assert!(matches!(validate_safetensors(&path), Err(Error::SafeTensors { .. })));
        fs::remove_file(&path).unwrap();
    }
}
