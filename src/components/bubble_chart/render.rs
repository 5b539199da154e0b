use std::collections::HashMap;
use std::f64::consts::PI;
use std::time::Duration;

use web_sys::CanvasRenderingContext2d;

/// Drawing surface the chart drives. Visuals are addressed by entity id.
pub trait BubbleRenderer {
	/// Adds a visual with an initial radius.
	fn create_visual(&mut self, id: &str, radius: f64);
	/// Moves a visual's centre.
	fn set_position(&mut self, id: &str, x: f64, y: f64);
	/// Sets a visual's fill colour.
	fn set_fill(&mut self, id: &str, colour: &str);
	/// Sets a visual's outline colour.
	fn set_stroke(&mut self, id: &str, colour: &str);
	/// Eases a visual's radius from its current value to `radius`.
	fn animate_radius(&mut self, id: &str, radius: f64, duration: Duration);
	/// Destroys a visual.
	fn remove_visual(&mut self, id: &str);
}

fn ease_cubic_in_out(t: f64) -> f64 {
	let t = t * 2.0;
	if t <= 1.0 {
		t * t * t / 2.0
	} else {
		let t = t - 2.0;
		(t * t * t + 2.0) / 2.0
	}
}

#[derive(Clone, Debug)]
struct RadiusTween {
	from: f64,
	to: f64,
	duration_ms: f64,
	/// Stamped by the first frame drawn after the tween is issued.
	started_at: Option<f64>,
}

#[derive(Clone, Debug)]
struct Bubble {
	x: f64,
	y: f64,
	radius: f64,
	fill: String,
	stroke: String,
	tween: Option<RadiusTween>,
}

impl Bubble {
	fn advance(&mut self, now_ms: f64) {
		let Some(tween) = self.tween.as_mut() else {
			return;
		};
		let start = *tween.started_at.get_or_insert(now_ms);
		let t = if tween.duration_ms <= 0.0 {
			1.0
		} else {
			((now_ms - start) / tween.duration_ms).clamp(0.0, 1.0)
		};
		self.radius = tween.from + (tween.to - tween.from) * ease_cubic_in_out(t);
		if t >= 1.0 {
			self.tween = None;
		}
	}
}

/// Retained-mode bubble store painted onto a 2d canvas each frame.
pub struct CanvasRenderer {
	bubbles: HashMap<String, Bubble>,
	/// Creation order, so later bubbles paint over earlier ones.
	order: Vec<String>,
	/// Canvas width cleared each frame
	pub width: f64,
	/// Canvas height cleared each frame
	pub height: f64,
	/// Outline width
	pub stroke_width: f64,
}

impl CanvasRenderer {
	/// An empty renderer for a canvas of the given size.
	pub fn new(width: f64, height: f64, stroke_width: f64) -> Self {
		Self {
			bubbles: HashMap::new(),
			order: Vec::new(),
			width,
			height,
			stroke_width,
		}
	}

	/// Steps radius animations to `now_ms`. Returns true while any are in flight.
	pub fn advance(&mut self, now_ms: f64) -> bool {
		let mut animating = false;
		for bubble in self.bubbles.values_mut() {
			bubble.advance(now_ms);
			animating |= bubble.tween.is_some();
		}
		animating
	}

	/// Topmost bubble under the point, by its current drawn radius.
	pub fn visual_at(&self, x: f64, y: f64) -> Option<&str> {
		self.order.iter().rev().map(String::as_str).find(|id| {
			self.bubbles.get(*id).is_some_and(|b| {
				let (dx, dy) = (b.x - x, b.y - y);
				dx * dx + dy * dy < b.radius * b.radius
			})
		})
	}

	/// Advances animations and paints every bubble.
	pub fn draw(&mut self, ctx: &CanvasRenderingContext2d, now_ms: f64) {
		self.advance(now_ms);

		ctx.clear_rect(0.0, 0.0, self.width, self.height);
		ctx.set_line_width(self.stroke_width);
		for id in &self.order {
			let Some(bubble) = self.bubbles.get(id) else {
				continue;
			};
			if bubble.radius <= 0.0 {
				continue;
			}
			ctx.begin_path();
			let _ = ctx.arc(bubble.x, bubble.y, bubble.radius, 0.0, 2.0 * PI);
			ctx.set_fill_style_str(&bubble.fill);
			ctx.fill();
			ctx.set_stroke_style_str(&bubble.stroke);
			ctx.stroke();
		}
	}
}

impl BubbleRenderer for CanvasRenderer {
	fn create_visual(&mut self, id: &str, radius: f64) {
		if self.bubbles.contains_key(id) {
			return;
		}
		self.bubbles.insert(
			id.to_string(),
			Bubble {
				x: 0.0,
				y: 0.0,
				radius,
				fill: String::from("transparent"),
				stroke: String::from("transparent"),
				tween: None,
			},
		);
		self.order.push(id.to_string());
	}

	fn set_position(&mut self, id: &str, x: f64, y: f64) {
		if let Some(bubble) = self.bubbles.get_mut(id) {
			bubble.x = x;
			bubble.y = y;
		}
	}

	fn set_fill(&mut self, id: &str, colour: &str) {
		if let Some(bubble) = self.bubbles.get_mut(id) {
			bubble.fill = colour.to_string();
		}
	}

	fn set_stroke(&mut self, id: &str, colour: &str) {
		if let Some(bubble) = self.bubbles.get_mut(id) {
			bubble.stroke = colour.to_string();
		}
	}

	fn animate_radius(&mut self, id: &str, radius: f64, duration: Duration) {
		if let Some(bubble) = self.bubbles.get_mut(id) {
			bubble.tween = Some(RadiusTween {
				from: bubble.radius,
				to: radius,
				duration_ms: duration.as_secs_f64() * 1000.0,
				started_at: None,
			});
		}
	}

	fn remove_visual(&mut self, id: &str) {
		if self.bubbles.remove(id).is_some() {
			self.order.retain(|other| other != id);
		}
	}
}
