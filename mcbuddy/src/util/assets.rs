use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct OcrAssets {
	pub detection: PathBuf,
	pub recognition: PathBuf,
	pub charset: PathBuf,
}

fn normalize_ocr_dir(dir: &Path) -> PathBuf {
	// Accept either the app root (containing `ocr/`) or the `ocr/` folder itself.
	if dir.join("detection.mnn").is_file() {
		dir.to_path_buf()
	} else {
		dir.join("ocr")
	}
}

/// Resolve OCR model paths.
///
/// Search order: the configured folder, `MCBUDDY_ASSETS_DIR`, next to the
/// executable, the working directory, then (debug builds) the workspace root.
pub fn resolve_ocr_assets(configured: Option<&Path>, lang_code: &str) -> Result<OcrAssets> {
	let mut candidates: Vec<PathBuf> = Vec::new();
	if let Some(dir) = configured {
		candidates.push(dir.to_path_buf());
	}
	if let Some(dir) = std::env::var_os("MCBUDDY_ASSETS_DIR") {
		candidates.push(PathBuf::from(dir));
	}
	if let Ok(exe) = std::env::current_exe()
		&& let Some(dir) = exe.parent()
	{
		candidates.push(dir.to_path_buf());
	}
	if let Ok(cwd) = std::env::current_dir() {
		candidates.push(cwd);
	}
	#[cfg(debug_assertions)]
	candidates.push(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(".."));

	find_in(&candidates, lang_code)
}

/// First candidate folder holding a complete model set for `lang_code`.
pub fn find_in(candidates: &[PathBuf], lang_code: &str) -> Result<OcrAssets> {
	let recognition_name = format!("{lang_code}_recognition.mnn");
	let charset_name = format!("{lang_code}_charset.txt");

	let mut tried = Vec::new();
	for base in candidates {
		let ocr_dir = normalize_ocr_dir(base);
		let detection = ocr_dir.join("detection.mnn");
		let recognition = ocr_dir.join(&recognition_name);
		let charset = ocr_dir.join(&charset_name);

		if detection.is_file() && recognition.is_file() && charset.is_file() {
			return Ok(OcrAssets { detection, recognition, charset });
		}

		tried.push(ocr_dir);
	}

	bail!(
		"OCR model files not found. Expected these files:\n  - ocr/detection.mnn\n  - ocr/{recognition_name}\n  - ocr/{charset_name}\n\nSearched in:\n{}\n\nFix: copy the 'ocr/' folder next to the executable, set `ocr.dir` in the config, or set MCBUDDY_ASSETS_DIR.",
		tried
			.into_iter()
			.map(|p| format!("  - {}", p.display()))
			.collect::<Vec<_>>()
			.join("\n")
	)
}
