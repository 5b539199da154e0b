//! Force simulation engine.
//!
//! Keeps a set of bodies, applies the configured forces once per tick, damps
//! and integrates velocities, and cools an `alpha` energy level until the
//! layout comes to rest. Ticks are synchronous and driven by the caller.

use super::quadtree::QuadTree;
use super::types::Category;

/// Above this many nodes the many-body force switches to Barnes-Hut.
const EXACT_CHARGE_LIMIT: usize = 64;

/// A simulated bubble.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
	/// Entity key.
	pub id: String,
	/// Horizontal position.
	pub x: f64,
	/// Vertical position.
	pub y: f64,
	/// Horizontal velocity.
	pub vx: f64,
	/// Vertical velocity.
	pub vy: f64,
	/// Drawn radius, which also scales the node's charge.
	pub radius: f64,
	/// Cluster label.
	pub category: Category,
	/// Fill colour, opaque to the engine.
	pub colour: String,
	/// Stroke colour override, opaque to the engine.
	pub border_colour: Option<String>,
}

/// Cooling and damping parameters.
#[derive(Clone, Debug)]
pub struct SimulationConfig {
	/// Ticking stops once alpha falls below this
	pub alpha_min: f64,
	/// Fraction of the distance to `alpha_target` covered each tick
	pub alpha_decay: f64,
	/// Energy the simulation cools toward
	pub alpha_target: f64,
	/// Fraction of velocity lost each tick
	pub velocity_decay: f64,
}

impl Default for SimulationConfig {
	fn default() -> Self {
		Self {
			alpha_min: 0.001,
			alpha_decay: 1.0 - 0.001_f64.powf(1.0 / 300.0),
			alpha_target: 0.0,
			velocity_decay: 0.2,
		}
	}
}

/// A velocity contribution applied to every node on each tick.
pub trait Force {
	/// Adds this force's contribution to each node's velocity.
	fn apply(&mut self, nodes: &mut [Node], alpha: f64);
}

/// Pulls each node toward a per-node x coordinate.
pub struct PositionX {
	strength: f64,
	target: Box<dyn Fn(&Node) -> f64>,
}

impl PositionX {
	/// `target` gives the x coordinate each node is pulled toward.
	pub fn new(strength: f64, target: impl Fn(&Node) -> f64 + 'static) -> Self {
		Self {
			strength,
			target: Box::new(target),
		}
	}
}

impl Force for PositionX {
	fn apply(&mut self, nodes: &mut [Node], alpha: f64) {
		for node in nodes {
			node.vx += ((self.target)(&*node) - node.x) * self.strength * alpha;
		}
	}
}

/// Pulls every node toward a shared y coordinate.
pub struct PositionY {
	strength: f64,
	target: f64,
}

impl PositionY {
	/// Pulls toward `target` with the given strength.
	pub fn new(strength: f64, target: f64) -> Self {
		Self { strength, target }
	}
}

impl Force for PositionY {
	fn apply(&mut self, nodes: &mut [Node], alpha: f64) {
		for node in nodes {
			node.vy += (self.target - node.y) * self.strength * alpha;
		}
	}
}

/// Mutual charge between all nodes. Negative strengths repel.
pub struct ManyBody {
	strength: Box<dyn Fn(&Node) -> f64>,
	theta: f64,
	strengths: Vec<f64>,
}

impl ManyBody {
	/// `strength` gives each node's charge.
	pub fn new(strength: impl Fn(&Node) -> f64 + 'static) -> Self {
		Self {
			strength: Box::new(strength),
			theta: 0.9,
			strengths: Vec::new(),
		}
	}

	/// Barnes-Hut opening criterion. Zero forces exact summation.
	pub fn theta(mut self, theta: f64) -> Self {
		self.theta = theta;
		self
	}

	fn apply_exact(&self, nodes: &mut [Node], alpha: f64) {
		let n = nodes.len();
		for i in 0..n {
			let (mut dvx, mut dvy) = (0.0, 0.0);
			for j in 0..n {
				if i == j {
					continue;
				}
				let (a, b) = (&nodes[i], &nodes[j]);
				let (dx, dy) = separation((a.x, a.y), (b.x, b.y), i, j);
				let l = softened(dx * dx + dy * dy);
				let w = self.strengths[j] * alpha / l;
				dvx += dx * w;
				dvy += dy * w;
			}
			nodes[i].vx += dvx;
			nodes[i].vy += dvy;
		}
	}

	fn apply_approximate(&self, nodes: &mut [Node], alpha: f64) {
		let points: Vec<(f64, f64)> = nodes.iter().map(|n| (n.x, n.y)).collect();
		let tree = QuadTree::build(&points, &self.strengths);
		for (i, node) in nodes.iter_mut().enumerate() {
			let (dvx, dvy) = tree.force_on(i, &points, &self.strengths, self.theta, alpha);
			node.vx += dvx;
			node.vy += dvy;
		}
	}
}

impl Force for ManyBody {
	fn apply(&mut self, nodes: &mut [Node], alpha: f64) {
		self.strengths.clear();
		self.strengths.extend(nodes.iter().map(|n| (self.strength)(n)));

		if self.theta > 0.0 && nodes.len() > EXACT_CHARGE_LIMIT {
			self.apply_approximate(nodes, alpha);
		} else {
			self.apply_exact(nodes, alpha);
		}
	}
}

/// Vector from `a` to `b`, nudged apart when the two coincide.
pub(crate) fn separation(a: (f64, f64), b: (f64, f64), i: usize, j: usize) -> (f64, f64) {
	let (mut dx, mut dy) = (b.0 - a.0, b.1 - a.1);
	if dx == 0.0 {
		dx = jiggle(i, j);
	}
	if dy == 0.0 {
		dy = jiggle(i, j);
	}
	(dx, dy)
}

/// Tiny signed offset, opposite for the two members of a pair.
pub(crate) fn jiggle(i: usize, j: usize) -> f64 {
	if j > i { 1e-6 } else { -1e-6 }
}

/// Squared distances under one are softened to avoid blow-ups.
pub(crate) fn softened(l: f64) -> f64 {
	if l < 1.0 { l.sqrt() } else { l }
}

type TickListener = Box<dyn FnMut(&[Node], f64)>;

/// The engine: a node set, the forces acting on it, and its energy.
pub struct Simulation {
	nodes: Vec<Node>,
	forces: Vec<Box<dyn Force>>,
	config: SimulationConfig,
	alpha: f64,
	running: bool,
	listeners: Vec<TickListener>,
}

impl Simulation {
	/// Creates a stopped simulation with no nodes.
	pub fn new(config: SimulationConfig) -> Self {
		Self {
			nodes: Vec::new(),
			forces: Vec::new(),
			config,
			alpha: 1.0,
			running: false,
			listeners: Vec::new(),
		}
	}

	/// Adds a force, applied after those added before it.
	pub fn with_force(mut self, force: impl Force + 'static) -> Self {
		self.forces.push(Box::new(force));
		self
	}

	/// The current node set.
	pub fn nodes(&self) -> &[Node] {
		&self.nodes
	}

	/// Replaces the node set.
	pub fn set_nodes(&mut self, nodes: Vec<Node>) {
		self.nodes = nodes;
	}

	/// Hands the node set back, leaving the simulation empty.
	pub fn take_nodes(&mut self) -> Vec<Node> {
		std::mem::take(&mut self.nodes)
	}

	/// Current alpha.
	pub fn energy(&self) -> f64 {
		self.alpha
	}

	/// Sets alpha, clamped into `[0, 1]`.
	pub fn set_energy(&mut self, alpha: f64) {
		self.alpha = alpha.clamp(0.0, 1.0);
	}

	/// Allows ticking.
	pub fn start(&mut self) {
		self.running = true;
	}

	/// Prevents any further ticks until the next `start`.
	pub fn stop(&mut self) {
		self.running = false;
	}

	/// Whether ticks will advance the layout.
	pub fn is_running(&self) -> bool {
		self.running
	}

	/// Registers a callback run after every integration step.
	pub fn on_tick(&mut self, listener: impl FnMut(&[Node], f64) + 'static) {
		self.listeners.push(Box::new(listener));
	}

	/// Advances one step. Returns false when nothing was simulated.
	pub fn tick(&mut self) -> bool {
		if !self.running || self.nodes.is_empty() {
			return false;
		}

		self.alpha += (self.config.alpha_target - self.alpha) * self.config.alpha_decay;

		for force in &mut self.forces {
			force.apply(&mut self.nodes, self.alpha);
		}

		let retain = 1.0 - self.config.velocity_decay;
		for node in &mut self.nodes {
			node.vx *= retain;
			node.vy *= retain;
			node.x += node.vx;
			node.y += node.vy;
		}

		for listener in &mut self.listeners {
			listener(&self.nodes, self.alpha);
		}

		if self.alpha < self.config.alpha_min {
			self.running = false;
		}
		true
	}

	/// Ticks until the simulation stops or `max_ticks` is reached, returning the ticks taken.
	pub fn run_to_convergence(&mut self, max_ticks: usize) -> usize {
		let mut ticks = 0;
		while ticks < max_ticks && self.tick() {
			ticks += 1;
		}
		ticks
	}
}

#[cfg(test)]
mod tests {
	use std::cell::RefCell;
	use std::rc::Rc;

	use super::*;

	fn node(id: &str, x: f64, y: f64, radius: f64) -> Node {
		Node {
			id: id.to_string(),
			x,
			y,
			vx: 0.0,
			vy: 0.0,
			radius,
			category: Category::Yes,
			colour: "#ff0000".to_string(),
			border_colour: None,
		}
	}

	fn charge() -> ManyBody {
		ManyBody::new(|n: &Node| -n.radius.powi(2) * 0.03)
	}

	#[test]
	fn starts_stopped() {
		let mut sim = Simulation::new(SimulationConfig::default());
		sim.set_nodes(vec![node("a", 0.0, 0.0, 10.0)]);

		assert!(!sim.is_running());
		assert!(!sim.tick());
		assert_eq!(sim.energy(), 1.0);
		assert_eq!(sim.nodes()[0].x, 0.0);
	}

	#[test]
	fn empty_simulation_is_a_no_op() {
		let mut sim = Simulation::new(SimulationConfig::default()).with_force(charge());
		sim.start();

		assert!(!sim.tick());
		assert_eq!(sim.run_to_convergence(100), 0);
		assert_eq!(sim.energy(), 1.0);
	}

	#[test]
	fn energy_is_clamped() {
		let mut sim = Simulation::new(SimulationConfig::default());
		sim.set_energy(3.0);
		assert_eq!(sim.energy(), 1.0);
		sim.set_energy(-1.0);
		assert_eq!(sim.energy(), 0.0);
	}

	#[test]
	fn energy_decays_monotonically() {
		let mut sim = Simulation::new(SimulationConfig::default())
			.with_force(PositionY::new(0.03, 400.0))
			.with_force(charge());
		sim.set_nodes(vec![node("a", 10.0, 10.0, 10.0), node("b", 30.0, 50.0, 10.0)]);
		sim.start();

		let mut previous = sim.energy();
		while sim.tick() {
			assert!(sim.energy() <= previous);
			previous = sim.energy();
		}
	}

	#[test]
	fn converges_and_stops_itself() {
		let mut sim = Simulation::new(SimulationConfig::default())
			.with_force(PositionX::new(0.03, |_: &Node| 500.0))
			.with_force(PositionY::new(0.03, 400.0))
			.with_force(charge());
		sim.set_nodes(vec![node("a", 0.0, 0.0, 10.0), node("b", 900.0, 700.0, 10.0)]);
		sim.start();

		let ticks = sim.run_to_convergence(400);

		assert!(ticks <= 310, "took {ticks} ticks");
		assert!(sim.energy() < 0.001);
		assert!(!sim.is_running());
		assert!(!sim.tick());
	}

	#[test]
	fn stop_prevents_further_ticks() {
		let mut sim = Simulation::new(SimulationConfig::default()).with_force(charge());
		sim.set_nodes(vec![node("a", 0.0, 0.0, 10.0), node("b", 5.0, 0.0, 10.0)]);
		sim.start();
		assert!(sim.tick());

		sim.stop();
		let before = sim.nodes().to_vec();
		assert!(!sim.tick());
		assert_eq!(sim.nodes(), before.as_slice());
	}

	#[test]
	fn attraction_pulls_toward_targets() {
		let mut sim = Simulation::new(SimulationConfig::default())
			.with_force(PositionX::new(0.03, |_: &Node| 200.0))
			.with_force(PositionY::new(0.03, 100.0));
		sim.set_nodes(vec![node("a", 900.0, 700.0, 10.0)]);
		sim.start();
		sim.run_to_convergence(400);

		let a = &sim.nodes()[0];
		assert!((a.x - 200.0).abs() < 5.0, "x = {}", a.x);
		assert!((a.y - 100.0).abs() < 5.0, "y = {}", a.y);
	}

	#[test]
	fn charge_pushes_nodes_apart() {
		let mut sim = Simulation::new(SimulationConfig::default()).with_force(charge());
		sim.set_nodes(vec![node("a", 0.0, 0.0, 10.0), node("b", 10.0, 0.0, 10.0)]);
		sim.start();
		sim.tick();

		let (a, b) = (&sim.nodes()[0], &sim.nodes()[1]);
		assert!(a.vx < 0.0);
		assert!(b.vx > 0.0);
		assert!(b.x - a.x > 10.0);
	}

	#[test]
	fn larger_radius_repels_harder() {
		let push = |radius: f64| {
			let mut sim = Simulation::new(SimulationConfig::default()).with_force(charge());
			sim.set_nodes(vec![node("small", 0.0, 0.0, 10.0), node("big", 20.0, 0.0, radius)]);
			sim.start();
			sim.tick();
			-sim.nodes()[0].vx
		};
		assert!(push(20.0) > push(10.0));
	}

	#[test]
	fn coincident_nodes_separate() {
		let mut sim = Simulation::new(SimulationConfig::default()).with_force(charge());
		sim.set_nodes(vec![node("a", 50.0, 50.0, 10.0), node("b", 50.0, 50.0, 10.0)]);
		sim.start();
		sim.tick();

		let (a, b) = (&sim.nodes()[0], &sim.nodes()[1]);
		assert!(a.x != b.x);
		assert!(a.x.is_finite() && b.x.is_finite());
	}

	#[test]
	fn tick_listeners_see_updated_positions() {
		let seen = Rc::new(RefCell::new(Vec::new()));
		let mut sim = Simulation::new(SimulationConfig::default())
			.with_force(PositionX::new(0.03, |_: &Node| 100.0));
		let seen_tick = seen.clone();
		sim.on_tick(move |nodes, alpha| seen_tick.borrow_mut().push((nodes[0].x, alpha)));
		sim.set_nodes(vec![node("a", 0.0, 0.0, 10.0)]);
		sim.start();
		sim.tick();
		sim.tick();

		let seen = seen.borrow();
		assert_eq!(seen.len(), 2);
		assert!(seen[0].0 > 0.0);
		assert!(seen[1].0 > seen[0].0);
		assert_eq!(seen[1].1, sim.energy());
	}

	#[test]
	fn barnes_hut_matches_exact_sum() {
		let nodes: Vec<Node> = (0..100)
			.map(|i| {
				let (x, y) = ((i % 10) as f64 * 37.0, (i / 10) as f64 * 29.0);
				node(&i.to_string(), x, y, 5.0 + (i % 4) as f64 * 3.0)
			})
			.collect();

		let mut exact = nodes.clone();
		let mut approx = nodes;
		charge().theta(0.0).apply(&mut exact, 1.0);
		charge().theta(0.9).apply(&mut approx, 1.0);

		for (e, a) in exact.iter().zip(&approx) {
			let scale = e.vx.hypot(e.vy).max(0.05);
			assert!((e.vx - a.vx).abs() < scale * 0.5, "{} vs {}", e.vx, a.vx);
			assert!((e.vy - a.vy).abs() < scale * 0.5, "{} vs {}", e.vy, a.vy);
		}
	}
}
