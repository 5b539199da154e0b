use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use log::{debug, info};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::color::darker;
use super::render::BubbleRenderer;
use super::simulation::{ManyBody, Node, PositionX, PositionY, Simulation, SimulationConfig};
use super::types::{BubbleRecord, Category, ChartEvent};

/// Viewport and appearance settings for one chart.
#[derive(Clone, Debug)]
pub struct ChartConfig {
	/// Viewport width
	pub width: f64,
	/// Viewport height
	pub height: f64,
	/// Radius given to every new bubble
	pub node_radius: f64,
	/// Force strength shared by the cluster pulls and the charge
	pub force_strength: f64,
	/// Energy below which the chart reports itself settled
	pub settled_threshold: f64,
	/// How long new bubbles take to grow to full size
	pub grow_duration: Duration,
	/// Bubble outline width
	pub stroke_width: f64,
}

impl Default for ChartConfig {
	fn default() -> Self {
		Self {
			width: 1000.0,
			height: 800.0,
			node_radius: 10.0,
			force_strength: 0.03,
			settled_threshold: 0.2,
			grow_duration: Duration::from_millis(2000),
			stroke_width: 2.0,
		}
	}
}

/// Where each vote option's bubbles gather.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClusterTargets {
	left: (f64, f64),
	center: (f64, f64),
	right: (f64, f64),
}

impl ClusterTargets {
	/// Yes on the left third, no on the right third, everything else centred.
	pub fn new(width: f64, height: f64) -> Self {
		let y = height / 2.0;
		Self {
			left: (width / 3.0, y),
			center: (width / 2.0, y),
			right: (2.0 * width / 3.0, y),
		}
	}

	/// Target point for a category.
	pub fn target(&self, category: Category) -> (f64, f64) {
		match category {
			Category::Yes => self.left,
			Category::Absent | Category::Both => self.center,
			Category::No => self.right,
		}
	}

	/// Shared vertical target.
	pub fn center_y(&self) -> f64 {
		self.center.1
	}
}

/// Outcome of merging a batch of records into the live node set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reconciliation {
	/// Ids that got a new node, in submission order.
	pub created: Vec<String>,
	/// Ids whose node survived, in submission order.
	pub updated: Vec<String>,
	/// Ids whose node was dropped, sorted.
	pub removed: Vec<String>,
}

/// Receiver of the chart's outward notifications.
pub type EventSink = Box<dyn FnMut(ChartEvent)>;

/// Owns one chart's simulation, its drawn bubbles and its outward events.
pub struct BubbleChartState<R: BubbleRenderer> {
	simulation: Simulation,
	renderer: R,
	targets: ClusterTargets,
	config: ChartConfig,
	rng: SmallRng,
	events: EventSink,
	settled: bool,
	hovered: Option<String>,
	/// Energy reported by the engine's tick listener, drained by `tick`.
	pending_tick: Rc<Cell<Option<f64>>>,
}

impl<R: BubbleRenderer> BubbleChartState<R> {
	/// Builds a stopped chart; `seed` drives initial bubble placement.
	pub fn new(config: ChartConfig, renderer: R, events: EventSink, seed: u64) -> Self {
		let targets = ClusterTargets::new(config.width, config.height);
		let strength = config.force_strength;
		let mut simulation = Simulation::new(SimulationConfig::default())
			.with_force(PositionX::new(strength, move |node: &Node| {
				targets.target(node.category).0
			}))
			.with_force(PositionY::new(strength, targets.center_y()))
			.with_force(ManyBody::new(move |node: &Node| {
				-node.radius.powi(2) * strength
			}));
		let pending_tick = Rc::new(Cell::new(None));
		let report = pending_tick.clone();
		simulation.on_tick(move |_, energy| report.set(Some(energy)));

		Self {
			simulation,
			renderer,
			targets,
			config,
			rng: SmallRng::seed_from_u64(seed),
			events,
			settled: false,
			hovered: None,
			pending_tick,
		}
	}

	/// Live nodes, in the order of the last submission.
	pub fn nodes(&self) -> &[Node] {
		self.simulation.nodes()
	}

	/// The drawing surface.
	pub fn renderer(&self) -> &R {
		&self.renderer
	}

	/// The drawing surface, mutably.
	pub fn renderer_mut(&mut self) -> &mut R {
		&mut self.renderer
	}

	/// Current simulation energy.
	pub fn energy(&self) -> f64 {
		self.simulation.energy()
	}

	/// Whether the simulation is still ticking.
	pub fn is_running(&self) -> bool {
		self.simulation.is_running()
	}

	/// Whether settlement was reported since the last submission.
	pub fn is_settled(&self) -> bool {
		self.settled
	}

	/// Target x coordinate for a node's cluster.
	pub fn option_position(&self, node: &Node) -> f64 {
		self.targets.target(node.category).0
	}

	/// Merges `records` and reheats the simulation fully.
	pub fn set_nodes(&mut self, records: &[BubbleRecord]) -> Reconciliation {
		self.set_nodes_with_energy(records, 1.0)
	}

	/// Merges `records` into the node set by id and reheats the simulation to `energy`.
	///
	/// Surviving nodes keep their position and velocity; new ones are dropped at a
	/// random spot in the viewport. Duplicate ids within one batch resolve to the
	/// last record.
	pub fn set_nodes_with_energy(
		&mut self,
		records: &[BubbleRecord],
		energy: f64,
	) -> Reconciliation {
		let mut previous: HashMap<String, Node> = self
			.simulation
			.take_nodes()
			.into_iter()
			.map(|node| (node.id.clone(), node))
			.collect();

		let mut result = Reconciliation::default();
		let mut nodes: Vec<Node> = Vec::with_capacity(records.len());
		let mut slots: HashMap<&str, usize> = HashMap::with_capacity(records.len());

		for record in records {
			if let Some(&slot) = slots.get(record.id.as_str()) {
				let node = &mut nodes[slot];
				node.category = record.category;
				node.colour = record.colour.clone();
				node.border_colour = record.border_colour.clone();
				continue;
			}

			let node = match previous.remove(&record.id) {
				Some(mut node) => {
					node.category = record.category;
					node.colour = record.colour.clone();
					node.border_colour = record.border_colour.clone();
					result.updated.push(record.id.clone());
					node
				}
				None => {
					result.created.push(record.id.clone());
					Node {
						id: record.id.clone(),
						x: self.rng.random::<f64>() * self.config.width,
						y: self.rng.random::<f64>() * self.config.height,
						vx: 0.0,
						vy: 0.0,
						radius: self.config.node_radius,
						category: record.category,
						colour: record.colour.clone(),
						border_colour: record.border_colour.clone(),
					}
				}
			};
			slots.insert(record.id.as_str(), nodes.len());
			nodes.push(node);
		}

		result.removed = previous.into_keys().collect();
		result.removed.sort();

		for id in &result.removed {
			self.renderer.remove_visual(id);
		}
		if self.hovered.as_ref().is_some_and(|id| result.removed.contains(id)) {
			self.hovered = None;
		}
		for id in &result.created {
			self.renderer.create_visual(id, 0.0);
		}
		for node in &nodes {
			self.renderer.set_fill(&node.id, &node.colour);
			let stroke = match &node.border_colour {
				Some(border) => border.clone(),
				None => darker(&node.colour),
			};
			self.renderer.set_stroke(&node.id, &stroke);
			self.renderer.set_position(&node.id, node.x, node.y);
			self.renderer
				.animate_radius(&node.id, node.radius, self.config.grow_duration);
		}

		debug!(
			"reconciled {} records: {} created, {} updated, {} removed",
			records.len(),
			result.created.len(),
			result.updated.len(),
			result.removed.len()
		);

		self.simulation.set_nodes(nodes);
		self.settled = false;
		self.simulation.set_energy(energy);
		self.simulation.start();
		result
	}

	/// Runs one simulation step and mirrors it onto the renderer.
	pub fn tick(&mut self) -> bool {
		self.simulation.tick();
		let Some(energy) = self.pending_tick.take() else {
			return false;
		};
		self.ticked(energy);
		true
	}

	/// The renderer is owned here, so the engine listener only records the tick
	/// and the visual work happens once control returns.
	fn ticked(&mut self, energy: f64) {
		for node in self.simulation.nodes() {
			self.renderer.set_position(&node.id, node.x, node.y);
		}

		if !self.settled && energy < self.config.settled_threshold {
			self.settled = true;
			info!("chart settled with {} bubbles", self.simulation.nodes().len());
			(self.events)(ChartEvent::Settled);
		}
	}

	/// Halts the simulation; bubbles stay where they are.
	pub fn stop(&mut self) {
		self.simulation.stop();
	}

	fn contains(&self, id: &str) -> bool {
		self.simulation.nodes().iter().any(|node| node.id == id)
	}

	/// Updates which bubble is under the pointer, emitting exit then enter on change.
	pub fn hover(&mut self, id: Option<&str>) {
		let id = id.filter(|id| self.contains(id));
		if self.hovered.as_deref() == id {
			return;
		}
		if let Some(previous) = self.hovered.take() {
			(self.events)(ChartEvent::NodeUnhovered(previous));
		}
		if let Some(id) = id {
			self.hovered = Some(id.to_string());
			(self.events)(ChartEvent::NodeHovered(id.to_string()));
		}
	}

	/// Forwards a click on a live bubble.
	pub fn click(&mut self, id: &str) {
		if self.contains(id) {
			(self.events)(ChartEvent::NodeClicked(id.to_string()));
		}
	}
}
