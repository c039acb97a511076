//! Board Renderer
//!
//! Mirrors a live, externally-owned chess board into a software-rendered 3D
//! view: tilted cameras, hover, alternate piece styles, occlusion segments,
//! blur and freehand annotations.

pub mod camera;
pub mod error;
pub mod extractor;
pub mod geometry;
pub mod host;
pub mod mirror;
pub mod models;
pub mod output;
pub mod overlay;
pub mod pieces;
pub mod renderer;
pub mod scene;
pub mod scheduler;
pub mod settings;
pub mod tracker;
pub mod transform;

pub use error::Error;
pub use error::Result;
pub use mirror::BoardMirror;
