use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathInputs {
    pub home_dir: PathBuf,
    pub xdg_config_home: Option<PathBuf>,
    pub trs_dir_override: Option<PathBuf>,
    pub config_file_override: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrsPaths {
    pub trs_dir: PathBuf,
    pub log_dir: PathBuf,

    pub config_dir: PathBuf,
    pub config_file: PathBuf,
}

pub fn compute_paths(inputs: PathInputs) -> TrsPaths {
    let trs_dir = inputs
        .trs_dir_override
        .clone()
        .unwrap_or_else(|| inputs.home_dir.join(".trs"));

    let config_dir = match inputs.trs_dir_override {
        Some(ref override_dir) => override_dir.join("config"),
        None => inputs
            .xdg_config_home
            .unwrap_or_else(|| inputs.home_dir.join(".config"))
            .join("trs"),
    };

    let config_file = inputs
        .config_file_override
        .unwrap_or_else(|| config_dir.join("config.toml"));

    TrsPaths {
        log_dir: trs_dir.join("logs"),
        trs_dir,
        config_file,
        config_dir,
    }
}
