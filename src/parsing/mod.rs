pub mod kml;
pub mod sheets;
