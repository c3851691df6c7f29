use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("arm-apps: Failed to parse {:?} as toml ({}).", .0, .1)]
    TomlParseFailure(PathBuf, #[source] toml::de::Error),
    #[error("arm-apps: No File {:?} is found ({}).", .0, .1)]
    NoFile(PathBuf, #[source] std::io::Error),
    #[error("arm-apps: No ParentDirectory {:?} is found.", .0)]
    NoParentDirectory(PathBuf),
    #[error("arm-apps: arm-client: {:?}", .0)]
    ArmClient(#[from] arm_client::Error),
    #[error("arm-apps: arm-interface: {:?}", .0)]
    ArmInterface(#[from] arm_interface::Error),
    #[error("arm-apps: urdf-rs: {:?}", .0)]
    UrdfRs(#[from] urdf_rs::UrdfError),
    #[error("arm-apps: Other: {:?}", .0)]
    Other(#[from] anyhow::Error),
}
