use std::path::{
    Path,
    PathBuf,
};

use color_eyre::eyre::eyre;
use directories::ProjectDirs;

use crate::{
    Error,
    config::Config,
};

#[derive(Debug)]
pub struct AppFiles {
    project_dirs: ProjectDirs,
}

impl AppFiles {
    pub fn new() -> Result<Self, Error> {
        let project_dirs = ProjectDirs::from("", "scottie", "scottie")
            .ok_or_else(|| eyre!("Could not determine project directories"))?;
        let this = Self { project_dirs };

        std::fs::create_dir_all(this.config_dir())?;

        Ok(this)
    }

    fn config_dir(&self) -> &Path {
        self.project_dirs.config_dir()
    }

    pub fn config(&self) -> Result<Config, Error> {
        let path = self.config_dir().join("config.toml");

        if path.exists() {
            Config::from_path(path)
        }
        else {
            let config = Config::default();
            config.to_path(path)?;
            Ok(config)
        }
    }
}

/// Path for the `index`-th decoded frame: `output` itself for the first, then
/// `name-1.ext`, `name-2.ext` and so on.
pub fn frame_path(output: &Path, index: usize) -> PathBuf {
    if index == 0 {
        return output.to_owned();
    }

    let stem = output
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match output.extension() {
        Some(extension) => format!("{stem}-{index}.{}", extension.to_string_lossy()),
        None => format!("{stem}-{index}"),
    };
    output.with_file_name(file_name)
}
