use std::path::PathBuf;

use tracker_store::StorePaths;

use crate::Result;

#[derive(Clone, Debug)]
pub struct AppPaths {
    pub app_data_dir: PathBuf,
    pub store: StorePaths,
}

impl AppPaths {
    pub fn new(app_data_dir: PathBuf) -> Self {
        let store = StorePaths::new(app_data_dir.clone());
        Self {
            app_data_dir,
            store,
        }
    }
}

pub fn ensure_app_data_dir(paths: &AppPaths) -> Result<()> {
    std::fs::create_dir_all(&paths.app_data_dir)?;
    Ok(())
}
