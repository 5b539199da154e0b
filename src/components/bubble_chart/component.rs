use std::cell::RefCell;
use std::rc::Rc;

use leptos::prelude::*;
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, MouseEvent};

use super::render::CanvasRenderer;
use super::state::{BubbleChartState, ChartConfig};
use super::types::{BubbleRecord, ChartEvent};

type SharedState = Rc<RefCell<Option<BubbleChartState<CanvasRenderer>>>>;

fn pointer_position(canvas: &HtmlCanvasElement, ev: &MouseEvent) -> (f64, f64) {
	let rect = canvas.get_bounding_client_rect();
	(
		ev.client_x() as f64 - rect.left(),
		ev.client_y() as f64 - rect.top(),
	)
}

/// Canvas bubble chart. The chart is created once the canvas is mounted and
/// every change to `data` is reconciled into it.
#[component]
pub fn BubbleChart(
	#[prop(into)] data: Signal<Vec<BubbleRecord>>,
	#[prop(default = 1000.0)] width: f64,
	#[prop(default = 800.0)] height: f64,
	#[prop(optional)] on_event: Option<Callback<ChartEvent>>,
) -> impl IntoView {
	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let state: SharedState = Rc::new(RefCell::new(None));
	let animate: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
	let (state_init, animate_init) = (state.clone(), animate.clone());

	Effect::new(move |_| {
		let records = data.get();
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let canvas: HtmlCanvasElement = canvas.into();

		if state_init.borrow().is_none() {
			canvas.set_width(width as u32);
			canvas.set_height(height as u32);
			let ctx: CanvasRenderingContext2d = canvas
				.get_context("2d")
				.unwrap()
				.unwrap()
				.dyn_into()
				.unwrap();

			let config = ChartConfig {
				width,
				height,
				..ChartConfig::default()
			};
			let renderer = CanvasRenderer::new(width, height, config.stroke_width);
			let on_event = on_event.clone();
			let events = Box::new(move |event: ChartEvent| {
				if let Some(ref cb) = on_event {
					cb.run(event);
				}
			});
			let seed = js_sys::Date::now().to_bits();
			*state_init.borrow_mut() = Some(BubbleChartState::new(config, renderer, events, seed));

			let (state_anim, animate_inner) = (state_init.clone(), animate_init.clone());
			*animate_init.borrow_mut() = Some(Closure::new(move || {
				if let Some(ref mut s) = *state_anim.borrow_mut() {
					s.tick();
					s.renderer_mut().draw(&ctx, js_sys::Date::now());
				}
				if let Some(ref cb) = *animate_inner.borrow() {
					let _ = web_sys::window()
						.unwrap()
						.request_animation_frame(cb.as_ref().unchecked_ref());
				}
			}));
			if let Some(ref cb) = *animate_init.borrow() {
				let _ = web_sys::window()
					.unwrap()
					.request_animation_frame(cb.as_ref().unchecked_ref());
			}
		}

		if let Some(ref mut s) = *state_init.borrow_mut() {
			s.set_nodes(&records);
		}
	});

	let state_mm = state.clone();
	let on_mousemove = move |ev: MouseEvent| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let canvas: HtmlCanvasElement = canvas.into();
		let (x, y) = pointer_position(&canvas, &ev);
		if let Some(ref mut s) = *state_mm.borrow_mut() {
			let hit = s.renderer().visual_at(x, y).map(str::to_owned);
			s.hover(hit.as_deref());
		}
	};

	let state_ml = state.clone();
	let on_mouseleave = move |_: MouseEvent| {
		if let Some(ref mut s) = *state_ml.borrow_mut() {
			s.hover(None);
		}
	};

	let state_click = state.clone();
	let on_click = move |ev: MouseEvent| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let canvas: HtmlCanvasElement = canvas.into();
		let (x, y) = pointer_position(&canvas, &ev);
		if let Some(ref mut s) = *state_click.borrow_mut() {
			if let Some(id) = s.renderer().visual_at(x, y).map(str::to_owned) {
				s.click(&id);
			}
		}
	};

	view! {
		<canvas
			node_ref=canvas_ref
			class="bubble-chart"
			on:mousemove=on_mousemove
			on:mouseleave=on_mouseleave
			on:click=on_click
			style="display: block;"
		/>
	}
}
