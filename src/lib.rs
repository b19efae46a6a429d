pub mod alignment;
pub mod alphabet;
pub mod conservation;
pub mod render_heatmap;
pub mod table;
