//! Barnes-Hut quadtree for the many-body force.
//!
//! Each cell stores the summed strength of the points beneath it and their
//! strength-weighted centroid. Cells far enough from a node (relative to their
//! size) act on it as a single aggregate charge.

use super::simulation::{jiggle, separation, softened};

/// Cells stop splitting at this depth, which bounds near-coincident clusters.
const MAX_DEPTH: usize = 24;

pub(crate) struct QuadTree {
	root: Option<Quad>,
}

struct Quad {
	x0: f64,
	y0: f64,
	size: f64,
	strength: f64,
	cx: f64,
	cy: f64,
	contents: Contents,
}

enum Contents {
	Leaf(Vec<usize>),
	Branch(Vec<Quad>),
}

impl QuadTree {
	pub(crate) fn build(points: &[(f64, f64)], strengths: &[f64]) -> Self {
		if points.is_empty() {
			return Self { root: None };
		}

		let (mut x0, mut y0) = (f64::INFINITY, f64::INFINITY);
		let (mut x1, mut y1) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
		for &(x, y) in points {
			x0 = x0.min(x);
			y0 = y0.min(y);
			x1 = x1.max(x);
			y1 = y1.max(y);
		}
		let size = (x1 - x0).max(y1 - y0).max(1.0);

		let indices = (0..points.len()).collect();
		Self {
			root: Some(Quad::build(indices, x0, y0, size, 0, points, strengths)),
		}
	}

	/// Velocity change on point `i` from every other point.
	pub(crate) fn force_on(
		&self,
		i: usize,
		points: &[(f64, f64)],
		strengths: &[f64],
		theta: f64,
		alpha: f64,
	) -> (f64, f64) {
		let mut dv = (0.0, 0.0);
		if let Some(root) = &self.root {
			root.accumulate(i, points, strengths, theta * theta, alpha, &mut dv);
		}
		dv
	}
}

impl Quad {
	fn build(
		indices: Vec<usize>,
		x0: f64,
		y0: f64,
		size: f64,
		depth: usize,
		points: &[(f64, f64)],
		strengths: &[f64],
	) -> Self {
		let coincident = indices.iter().all(|&j| points[j] == points[indices[0]]);
		let contents = if indices.len() == 1 || coincident || depth >= MAX_DEPTH {
			Contents::Leaf(indices)
		} else {
			let half = size / 2.0;
			let (mx, my) = (x0 + half, y0 + half);
			let mut quadrants: [Vec<usize>; 4] = Default::default();
			for j in indices {
				let (x, y) = points[j];
				let q = usize::from(x >= mx) | (usize::from(y >= my) << 1);
				quadrants[q].push(j);
			}
			let children = quadrants
				.into_iter()
				.enumerate()
				.filter(|(_, members)| !members.is_empty())
				.map(|(q, members)| {
					let cx0 = if q & 1 == 1 { mx } else { x0 };
					let cy0 = if q & 2 == 2 { my } else { y0 };
					Quad::build(members, cx0, cy0, half, depth + 1, points, strengths)
				})
				.collect();
			Contents::Branch(children)
		};

		let mut quad = Quad {
			x0,
			y0,
			size,
			strength: 0.0,
			cx: 0.0,
			cy: 0.0,
			contents,
		};
		quad.aggregate(points, strengths);
		quad
	}

	fn aggregate(&mut self, points: &[(f64, f64)], strengths: &[f64]) {
		let (mut strength, mut weight, mut sx, mut sy, mut count) = (0.0, 0.0, 0.0, 0.0, 0.0);
		let (mut px, mut py) = (0.0, 0.0);
		match &self.contents {
			Contents::Leaf(members) => {
				for &j in members {
					let c = strengths[j].abs();
					strength += strengths[j];
					weight += c;
					sx += c * points[j].0;
					sy += c * points[j].1;
					px += points[j].0;
					py += points[j].1;
					count += 1.0;
				}
			}
			Contents::Branch(children) => {
				for child in children {
					let c = child.strength.abs();
					strength += child.strength;
					weight += c;
					sx += c * child.cx;
					sy += c * child.cy;
					px += child.cx;
					py += child.cy;
					count += 1.0;
				}
			}
		}
		self.strength = strength;
		(self.cx, self.cy) = if weight > 0.0 {
			(sx / weight, sy / weight)
		} else {
			(px / count, py / count)
		};
	}

	fn accumulate(
		&self,
		i: usize,
		points: &[(f64, f64)],
		strengths: &[f64],
		theta2: f64,
		alpha: f64,
		dv: &mut (f64, f64),
	) {
		if self.strength == 0.0 {
			return;
		}

		let (xi, yi) = points[i];
		let (dx, dy) = (self.cx - xi, self.cy - yi);
		let l = dx * dx + dy * dy;

		if self.size * self.size / theta2 < l && !self.contains(xi, yi) {
			let dx = if dx == 0.0 { jiggle(i, i + 1) } else { dx };
			let dy = if dy == 0.0 { jiggle(i, i + 1) } else { dy };
			let w = self.strength * alpha / softened(dx * dx + dy * dy);
			dv.0 += dx * w;
			dv.1 += dy * w;
			return;
		}

		match &self.contents {
			Contents::Branch(children) => {
				for child in children {
					child.accumulate(i, points, strengths, theta2, alpha, dv);
				}
			}
			Contents::Leaf(members) => {
				for &j in members {
					if j == i {
						continue;
					}
					let (dx, dy) = separation(points[i], points[j], i, j);
					let w = strengths[j] * alpha / softened(dx * dx + dy * dy);
					dv.0 += dx * w;
					dv.1 += dy * w;
				}
			}
		}
	}

	fn contains(&self, x: f64, y: f64) -> bool {
		x >= self.x0 && x <= self.x0 + self.size && y >= self.y0 && y <= self.y0 + self.size
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_tree_exerts_nothing() {
		let tree = QuadTree::build(&[], &[]);
		assert!(tree.root.is_none());
	}

	#[test]
	fn root_aggregates_strength_and_centroid() {
		let points = [(0.0, 0.0), (10.0, 0.0), (0.0, 10.0), (10.0, 10.0)];
		let strengths = [-1.0, -1.0, -1.0, -3.0];
		let tree = QuadTree::build(&points, &strengths);

		let root = tree.root.as_ref().unwrap();
		assert_eq!(root.strength, -6.0);
		assert!((root.cx - 40.0 / 6.0).abs() < 1e-9);
		assert!((root.cy - 40.0 / 6.0).abs() < 1e-9);
	}

	#[test]
	fn coincident_points_share_a_leaf() {
		let points = [(5.0, 5.0), (5.0, 5.0), (5.0, 5.0)];
		let strengths = [-1.0; 3];
		let tree = QuadTree::build(&points, &strengths);

		match &tree.root.as_ref().unwrap().contents {
			Contents::Leaf(members) => assert_eq!(members.len(), 3),
			Contents::Branch(_) => panic!("coincident points should not split"),
		}
		let (dvx, dvy) = tree.force_on(0, &points, &strengths, 0.9, 1.0);
		assert!(dvx.is_finite() && dvy.is_finite());
	}

	#[test]
	fn distant_pair_repels_like_exact_sum() {
		let points = [(0.0, 0.0), (100.0, 0.0)];
		let strengths = [-3.0, -3.0];
		let tree = QuadTree::build(&points, &strengths);

		let (dvx, dvy) = tree.force_on(0, &points, &strengths, 0.9, 1.0);
		assert!((dvx - (100.0 * -3.0 / 10_000.0)).abs() < 1e-9);
		assert!(dvy.abs() < 1e-9);
	}
}
