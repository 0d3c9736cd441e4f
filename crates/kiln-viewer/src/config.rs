use std::path::PathBuf;

use glam::Vec3;

/// Environment variable overriding the asset directory.
pub const ASSET_DIR_VAR: &str = "KILN_ASSET_DIR";

/// Viewer start-up settings.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub title: String,
    pub width: f64,
    pub height: f64,
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
    pub texture: PathBuf,
    pub camera_position: Vec3,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self::with_asset_dir(PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/assets")))
    }
}

impl ViewerConfig {
    /// Resolves every asset path under `dir`.
    pub fn with_asset_dir(dir: PathBuf) -> Self {
        Self {
            title: "kiln".to_string(),
            width: 800.0,
            height: 800.0,
            vertex_shader: dir.join("shaders/default.vert.wgsl"),
            fragment_shader: dir.join("shaders/default.frag.wgsl"),
            texture: dir.join("textures/checker.png"),
            camera_position: Vec3::new(0.0, 0.0, 2.0),
        }
    }

    /// Default config, with assets taken from `KILN_ASSET_DIR` when set.
    pub fn from_env() -> Self {
        match std::env::var_os(ASSET_DIR_VAR) {
            Some(dir) if !dir.is_empty() => Self::with_asset_dir(PathBuf::from(dir)),
            _ => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_assets_ship_with_the_crate() {
        let config = ViewerConfig::default();
        assert!(config.vertex_shader.is_file(), "{:?}", config.vertex_shader);
        assert!(config.fragment_shader.is_file(), "{:?}", config.fragment_shader);
        assert!(config.texture.is_file(), "{:?}", config.texture);
    }

    #[test]
    fn asset_dir_prefixes_every_path() {
        let config = ViewerConfig::with_asset_dir(PathBuf::from("/data/kiln"));
        assert!(config.vertex_shader.starts_with("/data/kiln"));
        assert!(config.fragment_shader.starts_with("/data/kiln"));
        assert!(config.texture.starts_with("/data/kiln"));
        assert_eq!(config.camera_position, Vec3::new(0.0, 0.0, 2.0));
    }
}
