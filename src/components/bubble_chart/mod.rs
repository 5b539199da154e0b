//! Force-directed bubble chart: simulation engine, controller, and canvas component.

mod color;
mod component;
mod quadtree;
pub mod render;
pub mod simulation;
pub mod state;
pub mod types;

pub use component::BubbleChart;
pub use render::{BubbleRenderer, CanvasRenderer};
pub use simulation::{Force, ManyBody, Node, PositionX, PositionY, Simulation, SimulationConfig};
pub use state::{BubbleChartState, ChartConfig, ClusterTargets, EventSink, Reconciliation};
pub use types::{BubbleRecord, Category, ChartEvent, ParseCategoryError};
