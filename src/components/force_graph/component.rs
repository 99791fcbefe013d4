use std::cell::RefCell;
use std::rc::Rc;

use leptos::prelude::*;
use log::{error, warn};
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, MouseEvent, WheelEvent, Window};

use super::config::EngineConfig;
use super::events::{EngineCommand, EngineEvent};
use super::layout::PrecomputedLayout;
use super::render::Canvas2dRenderer;
use super::state::{GraphEngine, LayoutRequest};
use super::types::GraphData;

const FRAME_MS: f64 = 16.0;

type SharedEngine = Rc<RefCell<Option<GraphEngine>>>;

fn window_size(window: &Window) -> Option<(f64, f64)> {
	let w = window.inner_width().ok()?.as_f64()?;
	let h = window.inner_height().ok()?.as_f64()?;
	Some((w, h))
}

fn now_ms() -> Option<f64> {
	Some(web_sys::window()?.performance()?.now())
}

fn local_point(canvas_ref: NodeRef<leptos::html::Canvas>, ev: &MouseEvent) -> Option<(f64, f64)> {
	let canvas: HtmlCanvasElement = canvas_ref.get()?.into();
	let rect = canvas.get_bounding_client_rect();
	Some((
		ev.client_x() as f64 - rect.left(),
		ev.client_y() as f64 - rect.top(),
	))
}

fn layout_request(positions: Option<&str>) -> LayoutRequest {
	match positions.map(PrecomputedLayout::from_json) {
		Some(Ok(layout)) => LayoutRequest::Precomputed(layout),
		Some(Err(e)) => {
			error!("unreadable position file, simulating instead: {e}");
			LayoutRequest::Simulate
		}
		None => LayoutRequest::Simulate,
	}
}

#[component]
pub fn ForceGraphCanvas(
	#[prop(into)] data: Signal<GraphData>,
	/// Position file contents. Without one the layout is simulated.
	#[prop(optional, into)]
	positions: Option<Signal<Option<String>>>,
	#[prop(optional)] config: Option<EngineConfig>,
	#[prop(optional)] on_event: Option<Callback<EngineEvent>>,
	#[prop(optional, into)] command: Option<Signal<Option<EngineCommand>>>,
	#[prop(default = false)] fullscreen: bool,
	#[prop(default = None)] width: Option<f64>,
	#[prop(default = None)] height: Option<f64>,
) -> impl IntoView {
	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let engine: SharedEngine = Rc::new(RefCell::new(None));
	let animate: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
	let resize_cb: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
	let (engine_init, animate_init, resize_cb_init) =
		(engine.clone(), animate.clone(), resize_cb.clone());
	let config = config.unwrap_or_default();

	Effect::new(move |_| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		if engine_init.borrow().is_some() {
			return;
		}
		let canvas: HtmlCanvasElement = canvas.into();
		let Some(window) = web_sys::window() else {
			return;
		};

		let (w, h) = match (fullscreen, window_size(&window)) {
			(true, Some(size)) => size,
			_ => (
				width.unwrap_or_else(|| {
					canvas
						.parent_element()
						.map(|p| p.client_width() as f64)
						.unwrap_or(800.0)
				}),
				height.unwrap_or_else(|| {
					canvas
						.parent_element()
						.map(|p| p.client_height() as f64)
						.unwrap_or(600.0)
				}),
			),
		};
		canvas.set_width(w as u32);
		canvas.set_height(h as u32);

		let Some(ctx) = canvas
			.get_context("2d")
			.ok()
			.flatten()
			.and_then(|c| c.dyn_into::<CanvasRenderingContext2d>().ok())
		else {
			error!("canvas has no 2d context");
			return;
		};
		let mut renderer = Canvas2dRenderer::new(ctx);

		let mut instance = GraphEngine::new(config.clone(), w, h);
		if let Some(cb) = on_event {
			instance.subscribe(move |e| cb.run(e.clone()));
		}
		let json = positions.and_then(|p| p.get_untracked());
		instance.load_project(data.get_untracked(), layout_request(json.as_deref()), None);
		*engine_init.borrow_mut() = Some(instance);

		if fullscreen {
			let (engine_resize, canvas_resize) = (engine_init.clone(), canvas.clone());
			*resize_cb_init.borrow_mut() = Some(Closure::new(move || {
				let Some((nw, nh)) = web_sys::window().as_ref().and_then(window_size) else {
					return;
				};
				canvas_resize.set_width(nw as u32);
				canvas_resize.set_height(nh as u32);
				if let Some(ref mut e) = *engine_resize.borrow_mut() {
					e.resize(nw, nh);
				}
			}));
			if let Some(ref cb) = *resize_cb_init.borrow() {
				let _ =
					window.add_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
			}
		}

		let (engine_anim, animate_inner) = (engine_init.clone(), animate_init.clone());
		let mut last = now_ms();
		*animate_init.borrow_mut() = Some(Closure::new(move || {
			let now = now_ms();
			let dt = match (last, now) {
				(Some(a), Some(b)) if b > a => b - a,
				_ => FRAME_MS,
			};
			last = now;
			if let Some(ref mut e) = *engine_anim.borrow_mut() {
				if e.tick(dt) {
					e.render(&mut renderer);
				}
			}
			if let (Some(win), Some(cb)) = (web_sys::window(), animate_inner.borrow().as_ref()) {
				let _ = win.request_animation_frame(cb.as_ref().unchecked_ref());
			}
		}));
		if let Some(ref cb) = *animate_init.borrow() {
			let _ = window.request_animation_frame(cb.as_ref().unchecked_ref());
		}
	});

	// The first load happens at mount; later runs follow the graph or position file
	let engine_load = engine.clone();
	Effect::new(move |prev: Option<()>| {
		let graph = data.get();
		let json = positions.and_then(|p| p.get());
		if prev.is_none() {
			return;
		}
		if let Some(ref mut e) = *engine_load.borrow_mut() {
			e.load_project(graph, layout_request(json.as_deref()), None);
		}
	});

	let engine_cmd = engine.clone();
	Effect::new(move |_| {
		let Some(cmd) = command.and_then(|c| c.get()) else {
			return;
		};
		match *engine_cmd.borrow_mut() {
			Some(ref mut e) => e.dispatch(cmd),
			None => warn!("command before the canvas mounted: {cmd:?}"),
		}
	});

	let engine_md = engine.clone();
	let on_mousedown = move |ev: MouseEvent| {
		let Some((x, y)) = local_point(canvas_ref, &ev) else {
			return;
		};
		if ev.button() != 0 {
			return;
		}
		if let Some(ref mut e) = *engine_md.borrow_mut() {
			e.pointer_down(x, y);
		}
	};

	let engine_mm = engine.clone();
	let on_mousemove = move |ev: MouseEvent| {
		let Some((x, y)) = local_point(canvas_ref, &ev) else {
			return;
		};
		if let Some(ref mut e) = *engine_mm.borrow_mut() {
			e.pointer_move(x, y);
		}
	};

	let engine_mu = engine.clone();
	let on_mouseup = move |ev: MouseEvent| {
		let Some((x, y)) = local_point(canvas_ref, &ev) else {
			return;
		};
		if let Some(ref mut e) = *engine_mu.borrow_mut() {
			e.pointer_up(x, y);
		}
	};

	let engine_ml = engine.clone();
	let on_mouseleave = move |_: MouseEvent| {
		if let Some(ref mut e) = *engine_ml.borrow_mut() {
			e.pointer_leave();
		}
	};

	let engine_wh = engine.clone();
	let on_wheel = move |ev: WheelEvent| {
		ev.prevent_default();
		let Some((x, y)) = local_point(canvas_ref, &ev) else {
			return;
		};
		if let Some(ref mut e) = *engine_wh.borrow_mut() {
			e.wheel(x, y, ev.delta_y());
		}
	};

	let engine_cm = engine.clone();
	let on_contextmenu = move |ev: MouseEvent| {
		let Some((x, y)) = local_point(canvas_ref, &ev) else {
			return;
		};
		if let Some(ref mut e) = *engine_cm.borrow_mut() {
			if e.context_menu(x, y) {
				ev.prevent_default();
			}
		}
	};

	view! {
		<canvas
			node_ref=canvas_ref
			class="force-graph-canvas"
			on:mousedown=on_mousedown
			on:mousemove=on_mousemove
			on:mouseup=on_mouseup
			on:mouseleave=on_mouseleave
			on:wheel=on_wheel
			on:contextmenu=on_contextmenu
			style="display: block; cursor: grab;"
		/>
	}
}
