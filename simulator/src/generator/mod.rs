pub mod scene;
pub mod template;

pub use scene::{SceneConfig, SyntheticSensor};
