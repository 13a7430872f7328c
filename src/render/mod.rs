//! Remotion Runner (C8): Node/pnpm/Remotion workspace setup and final render
//! (spec §4.8). Setup steps 1-4 are idempotent and skipped when already done;
//! step 5 (render) always runs.

pub mod templates;

use crate::composition::CompositionData;
use crate::error::{Result, VideoGenError};
use crate::paths::ProjectPaths;
use crate::persona::Persona;
use std::path::Path;
use std::process::Command;
use std::time::Duration;
use tracing::{debug, info};

pub struct RenderOutcome {
    pub output_path: std::path::PathBuf,
}

/// Verify Node.js/pnpm/npx availability once per session (spec §4.8, "Chrome
/// headless checks performed once per session via a shared helper").
pub fn check_toolchain() -> Result<()> {
    for (bin, install_hint) in [
        ("node", "Install Node.js from https://nodejs.org/"),
        ("pnpm", "Install pnpm: npm install -g pnpm"),
        ("npx", "npx ships with Node.js; reinstall Node.js"),
    ] {
        Command::new(bin).arg("--version").output().map_err(|e| {
            VideoGenError::Rendering(format!("{bin} not found ({install_hint}): {e}"))
        })?;
    }
    Ok(())
}

/// Step 1: create the Remotion project if it doesn't already exist.
pub fn initialize_remotion_project(paths: &ProjectPaths) -> Result<()> {
    let remotion_dir = paths.remotion_dir();
    if remotion_dir.join("package.json").exists() {
        debug!("remotion project already initialized at {remotion_dir:?}");
        return Ok(());
    }

    if let Some(parent) = remotion_dir.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let status = Command::new("pnpm")
        .args([
            "create",
            "@remotion/video",
            remotion_dir.to_string_lossy().as_ref(),
            "--template",
            "blank",
        ])
        .status()
        .map_err(|e| VideoGenError::Rendering(format!("pnpm create failed to start: {e}")))?;

    if !status.success() {
        return Err(VideoGenError::Rendering(
            "pnpm create @remotion/video exited with a non-zero status".to_string(),
        ));
    }
    Ok(())
}

/// Step 2: emit `VideoGenerator.tsx` and `Root.tsx` from templates.
pub fn generate_typescript_sources(
    paths: &ProjectPaths,
    composition: &CompositionData,
    personas: &[Persona],
) -> Result<()> {
    let src_dir = paths.remotion_dir().join("src");
    std::fs::create_dir_all(&src_dir)?;

    let video_generator = templates::render_video_generator(composition, personas);
    std::fs::write(src_dir.join("VideoGenerator.tsx"), video_generator)?;

    let root = templates::render_root(composition);
    std::fs::write(src_dir.join("Root.tsx"), root)?;

    Ok(())
}

/// Step 3: ensure the project is listed in the top-level `pnpm-workspace.yaml`.
pub fn update_workspace(workspace_root: &Path, project_name: &str) -> Result<()> {
    let workspace_file = workspace_root.join("pnpm-workspace.yaml");
    let member_path = format!("projects/{project_name}/remotion");

    let mut contents = if workspace_file.exists() {
        std::fs::read_to_string(&workspace_file)?
    } else {
        "packages:\n".to_string()
    };

    if !contents.contains(&member_path) {
        contents.push_str(&format!("  - \"{member_path}\"\n"));
        std::fs::write(&workspace_file, contents)?;
    }
    Ok(())
}

/// Step 4: symlink audio/slides into `public/` and copy character images.
pub fn link_assets(
    paths: &ProjectPaths,
    personas: &[Persona],
    multilingual: bool,
    lang: Option<&str>,
) -> Result<()> {
    let public_dir = paths.remotion_dir().join("public");
    std::fs::create_dir_all(&public_dir)?;

    symlink_or_refresh(&paths.audio_dir(), &public_dir.join("audio"))?;
    symlink_or_refresh(&paths.slides_dir(lang, multilingual), &public_dir.join("slides"))?;

    for persona in personas {
        let dest = public_dir.join("characters").join(&persona.id);
        std::fs::create_dir_all(&dest)?;
        let src = paths.assets_characters_dir(&persona.id);
        if src.exists() {
            for entry in std::fs::read_dir(&src)? {
                let entry = entry?;
                let target = dest.join(entry.file_name());
                std::fs::copy(entry.path(), target)?;
            }
        }
    }
    Ok(())
}

#[cfg(unix)]
fn symlink_or_refresh(src: &Path, dest: &Path) -> Result<()> {
    if dest.exists() || dest.symlink_metadata().is_ok() {
        std::fs::remove_file(dest).or_else(|_| std::fs::remove_dir_all(dest)).ok();
    }
    std::os::unix::fs::symlink(src, dest)?;
    Ok(())
}

#[cfg(not(unix))]
fn symlink_or_refresh(src: &Path, dest: &Path) -> Result<()> {
    if dest.exists() {
        std::fs::remove_dir_all(dest).ok();
    }
    copy_dir_recursive(src, dest)
}

#[cfg(not(unix))]
fn copy_dir_recursive(src: &Path, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}

/// Step 5: always runs. Invokes `npx remotion render` with the configured
/// timeout and concurrency.
pub async fn render(
    paths: &ProjectPaths,
    output_path: &Path,
    render_concurrency: usize,
    timeout_seconds: u64,
) -> Result<RenderOutcome> {
    let composition_json = paths.composition_json();
    let remotion_dir = paths.remotion_dir();

    info!("rendering video to {}", output_path.display());

    let mut child = tokio::process::Command::new("npx")
        .current_dir(&remotion_dir)
        .args([
            "remotion",
            "render",
            "VideoGenerator",
            &output_path.to_string_lossy(),
            "--props",
            &composition_json.to_string_lossy(),
            "--concurrency",
            &render_concurrency.to_string(),
        ])
        .spawn()
        .map_err(|e| VideoGenError::Rendering(format!("failed to start npx remotion render: {e}")))?;

    let status = tokio::time::timeout(Duration::from_secs(timeout_seconds), child.wait())
        .await
        .map_err(|_| {
            VideoGenError::Rendering(format!(
                "render timed out after {timeout_seconds}s"
            ))
        })?
        .map_err(|e| VideoGenError::Rendering(format!("render process error: {e}")))?;

    if !status.success() {
        return Err(VideoGenError::Rendering(
            "remotion render exited with a non-zero status".to_string(),
        ));
    }

    Ok(RenderOutcome {
        output_path: output_path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_workspace_appends_member_once() {
        let dir = tempfile::tempdir().unwrap();
        update_workspace(dir.path(), "demo").unwrap();
        update_workspace(dir.path(), "demo").unwrap();
        let contents = std::fs::read_to_string(dir.path().join("pnpm-workspace.yaml")).unwrap();
        assert_eq!(contents.matches("projects/demo/remotion").count(), 1);
    }

    #[test]
    fn initialize_skips_when_package_json_present() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ProjectPaths::new(dir.path());
        std::fs::create_dir_all(paths.remotion_dir()).unwrap();
        std::fs::write(paths.remotion_dir().join("package.json"), "{}").unwrap();
        // Should return Ok without invoking pnpm (which may not exist in CI).
        initialize_remotion_project(&paths).unwrap();
    }
}
