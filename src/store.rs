pub mod artifacts;

pub use artifacts::ArtifactLayout;
