use camino::{Utf8Path, Utf8PathBuf};
use dirs::home_dir;

pub const DEFAULT_METASHARE_HOME: &str = ".metashare";
pub const DEFAULT_DATASTORE_DIR: &str = "data";
pub const DEFAULT_STORAGE_DIR: &str = "storage";

pub fn default_node_dir() -> Utf8PathBuf {
    if let Some(home) = home_dir() {
        if let Some(home) = Utf8Path::from_path(&home) {
            return home.join(DEFAULT_METASHARE_HOME);
        }
    }

    Utf8PathBuf::from(DEFAULT_METASHARE_HOME)
}
