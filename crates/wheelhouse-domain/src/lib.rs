#![deny(clippy::all)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

//! Pure model of wheel artifacts: names, requirement files, host tags, the
//! wheel filename grammar, the remote index, and skip-binary planning.

pub mod filename;
pub mod host;
pub mod index;
pub mod name;
pub mod plan;
pub mod requirements;
pub mod spec;
pub mod tags;

pub use filename::{WheelFilename, WheelFilenameError, WheelTag};
pub use host::{alpine_platform, wheel_arch, HostProfile, PlatformEpoch, TagError};
pub use index::{listing_filenames, ArtifactRecord, PackageIndex};
pub use name::{canonicalize_package_name, PackageName};
pub use plan::{plan_skip_binary, SkipBinary, SkipBinaryRequest, NONE_SENTINEL, SELECTOR_DELIMITER};
pub use requirements::{
    extract_packages, filter_packages, filter_requirements, parse_requirements,
    write_requirements, RequirementError,
};
pub use spec::{desired_versions, PackageSpec};
pub use tags::{abi_compatible, compatible, platform_compatible, PlatformTag};

pub use pep440_rs::Version;
