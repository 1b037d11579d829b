//! Model downloader for the MusicGen ONNX files.
//!
//! Fetches missing files from HuggingFace on first run, streaming each
//! download through a `.partial` staging file and resuming interrupted
//! transfers via HTTP Range requests.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

use tracing::info;

use crate::error::{Result, ServiceError};
use crate::models::musicgen::{MODEL_URLS, REQUIRED_MODEL_FILES};

/// Downloads all required model files that are not already present.
///
/// Returns Ok(()) once every required file exists. There is no retry
/// beyond resuming a partial transfer; a failed download propagates.
pub fn ensure_models(model_dir: &Path) -> Result<()> {
    if !model_dir.exists() {
        fs::create_dir_all(model_dir).map_err(|e| {
            ServiceError::model_download_failed(format!(
                "Failed to create model directory {}: {}",
                model_dir.display(),
                e
            ))
        })?;
    }

    let missing: Vec<&str> = REQUIRED_MODEL_FILES
        .iter()
        .copied()
        .filter(|file| !model_dir.join(file).exists())
        .collect();

    if missing.is_empty() {
        info!("all model files present");
        return Ok(());
    }

    info!(count = missing.len(), "downloading missing model files (first run may take several minutes)");

    for file in &missing {
        let url = url_for(file).ok_or_else(|| {
            ServiceError::model_download_failed(format!("No download URL for {}", file))
        })?;
        fetch_file(url, &model_dir.join(file))?;
    }

    // config.json is optional but improves model metadata
    let config_path = model_dir.join("config.json");
    if !config_path.exists() {
        if let Some(url) = url_for("config.json") {
            let _ = fetch_file(url, &config_path);
        }
    }

    info!("all model files downloaded");
    Ok(())
}

fn url_for(file: &str) -> Option<&'static str> {
    MODEL_URLS
        .iter()
        .find(|(name, _)| *name == file)
        .map(|(_, url)| *url)
}

fn partial_path(dest: &Path) -> std::path::PathBuf {
    dest.with_extension(
        dest.extension()
            .map(|e| format!("{}.partial", e.to_string_lossy()))
            .unwrap_or_else(|| "partial".to_string()),
    )
}

fn http_client() -> Result<reqwest::blocking::Client> {
    // Long timeout: the decoder weights are hundreds of megabytes
    reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(3600))
        .build()
        .map_err(|e| {
            ServiceError::model_download_failed(format!("Failed to create HTTP client: {}", e))
        })
}

/// Downloads one file, resuming a `.partial` staging file when present.
fn fetch_file(url: &str, dest: &Path) -> Result<()> {
    let staging = partial_path(dest);
    let existing = if staging.exists() {
        fs::metadata(&staging).map(|m| m.len()).unwrap_or(0)
    } else {
        0
    };

    let filename = dest.file_name().unwrap_or_default().to_string_lossy();
    let client = http_client()?;

    let mut request = client.get(url);
    if existing > 0 {
        eprint!("  Resuming {} from {} bytes... ", filename, existing);
        request = request.header("Range", format!("bytes={}-", existing));
    } else {
        eprint!("  Downloading {}... ", filename);
    }

    let mut response = request.send().map_err(|e| {
        ServiceError::model_download_failed(format!("Failed to download {}: {}", url, e))
    })?;

    let status = response.status();
    let resuming = status == reqwest::StatusCode::PARTIAL_CONTENT;
    if !resuming && existing > 0 && status.is_success() {
        // Server ignored the Range header; restart from scratch
        eprintln!("server doesn't support resume, restarting...");
        let _ = fs::remove_file(&staging);
        return fetch_file(url, dest);
    }
    if !status.is_success() {
        return Err(ServiceError::model_download_failed(format!(
            "HTTP {} for {}",
            status, url
        )));
    }

    let mut file = if resuming {
        OpenOptions::new()
            .append(true)
            .open(&staging)
            .map_err(|e| {
                ServiceError::model_download_failed(format!(
                    "Failed to open {} for resume: {}",
                    staging.display(),
                    e
                ))
            })?
    } else {
        File::create(&staging).map_err(|e| {
            ServiceError::model_download_failed(format!(
                "Failed to create {}: {}",
                staging.display(),
                e
            ))
        })?
    };

    let total = existing + response.content_length().unwrap_or(0);
    let mut downloaded = existing;
    let mut buffer = [0_u8; 65536];
    let mut last_percent = if total > 0 {
        (existing * 100 / total) as usize
    } else {
        0
    };

    loop {
        let n = response.read(&mut buffer).map_err(|e| {
            ServiceError::model_download_failed(format!("Failed to read response: {}", e))
        })?;
        if n == 0 {
            break;
        }

        file.write_all(&buffer[..n]).map_err(|e| {
            ServiceError::model_download_failed(format!("Failed to write file: {}", e))
        })?;
        downloaded += n as u64;

        if total > 0 {
            let percent = (downloaded * 100 / total) as usize;
            if percent >= last_percent + 10 {
                eprint!("{}%... ", percent);
                last_percent = percent;
            }
        }
    }

    // Sync before rename so a crash can't leave a truncated final file
    file.sync_all()
        .map_err(|e| ServiceError::model_download_failed(format!("Failed to sync file: {}", e)))?;
    drop(file);

    fs::rename(&staging, dest).map_err(|e| {
        ServiceError::model_download_failed(format!(
            "Failed to rename {} to {}: {}",
            staging.display(),
            dest.display(),
            e
        ))
    })?;

    eprintln!("done ({:.1} MB)", downloaded as f64 / (1024.0 * 1024.0));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_path_appends_to_extension() {
        let dest = Path::new("/tmp/decoder_model.onnx");
        assert_eq!(
            partial_path(dest),
            Path::new("/tmp/decoder_model.onnx.partial")
        );
    }

    #[test]
    fn url_lookup_covers_required_files() {
        for file in REQUIRED_MODEL_FILES {
            assert!(url_for(file).is_some(), "no URL for {}", file);
        }
        assert!(url_for("nonexistent.onnx").is_none());
    }

    #[test]
    fn ensure_models_short_circuits_when_present() {
        let dir = tempfile::tempdir().unwrap();
        for file in REQUIRED_MODEL_FILES {
            fs::write(dir.path().join(file), b"stub").unwrap();
        }
        // config.json too, so no network is touched
        fs::write(dir.path().join("config.json"), b"{}").unwrap();

        assert!(ensure_models(dir.path()).is_ok());
    }
}
