pub mod curvature;
pub mod los;
pub mod sweep;
pub mod viewshed;
