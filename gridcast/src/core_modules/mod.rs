pub mod cell;
pub mod frame;
pub mod grid_analyzer;
pub mod mosaic;
pub mod pixel;
