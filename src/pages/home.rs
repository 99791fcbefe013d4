use leptos::prelude::*;

use crate::components::force_graph::{
	EngineCommand, EngineEvent, FilterChange, ForceGraphCanvas, GraphData, GraphLink, GraphNode,
	NodeKind, ViewAction,
};

/// Sample project: motions with a handful of applicants and supporters each.
fn generate_sample_data(motions: usize) -> GraphData {
	let people = motions * 3;
	let mut nodes: Vec<GraphNode> = (0..motions)
		.map(|i| {
			GraphNode::new(format!("motion-{i}"), format!("Motion {i}"), NodeKind::Motion)
				.with_sublabel(format!("A{:03}", i + 1))
		})
		.collect();
	nodes.extend((0..people).map(|i| {
		GraphNode::new(format!("person-{i}"), format!("Person {i}"), NodeKind::Supporter)
	}));

	let links = (0..motions)
		.flat_map(|m| {
			(0..4).map(move |j| {
				let person = (rand_simple(m * 4 + j) * people as f64) as usize;
				let weight = if j == 0 { 2.0 } else { 1.0 };
				GraphLink::new(format!("motion-{m}"), format!("person-{person}"), weight)
			})
		})
		.collect();

	GraphData { nodes, links }
}

/// Simple pseudo-random number generator (deterministic for consistency).
fn rand_simple(seed: usize) -> f64 {
	let x = ((seed + 1) * 9301 + 49297) % 233280;
	(x as f64) / 233280.0
}

/// Default Home Page
#[component]
pub fn Home() -> impl IntoView {
	let graph_data = Signal::derive(move || generate_sample_data(40));
	let (command, set_command) = signal(None::<EngineCommand>);
	let (selected, set_selected) = signal(None::<String>);
	let (show_supporters, set_show_supporters) = signal(true);
	let (show_labels, set_show_labels) = signal(false);

	let on_event = Callback::new(move |event: EngineEvent| {
		if let EngineEvent::SelectionChanged { node_id, .. } = event {
			set_selected.set(node_id);
		}
	});

	let toggle_supporters = move |_| {
		let visible = !show_supporters.get_untracked();
		set_show_supporters.set(visible);
		set_command.set(Some(EngineCommand::SetFilter(FilterChange::ShowKind(
			NodeKind::Supporter,
			visible,
		))));
	};
	let toggle_labels = move |_| {
		let visible = !show_labels.get_untracked();
		set_show_labels.set(visible);
		set_command.set(Some(EngineCommand::SetFilter(FilterChange::ShowLabels(visible))));
	};
	let reset = move |_| {
		set_show_supporters.set(true);
		set_command.set(Some(EngineCommand::View(ViewAction::Reset)));
	};

	view! {
		<ErrorBoundary fallback=|errors| {
			view! {
				<h1>"Uh oh! Something went wrong!"</h1>

				<p>"Errors: "</p>
				<ul>
					{move || {
						errors
							.get()
							.into_iter()
							.map(|(_, e)| view! { <li>{e.to_string()}</li> })
							.collect_view()
					}}
				</ul>
			}
		}>

			<div class="fullscreen-graph">
				<ForceGraphCanvas data=graph_data on_event=on_event command=command fullscreen=true />
				<div class="graph-overlay">
					<h1>"Motions"</h1>
					<p class="subtitle">"Click a node to select it. Scroll to zoom. Drag to pan."</p>
					<div class="graph-toolbar">
						<button on:click=toggle_supporters>
							{move || if show_supporters.get() { "Hide supporters" } else { "Show supporters" }}
						</button>
						<button on:click=toggle_labels>
							{move || if show_labels.get() { "Hide labels" } else { "Show labels" }}
						</button>
						<button on:click=reset>"Reset view"</button>
					</div>
					<p class="selection">
						{move || selected.get().unwrap_or_else(|| "Nothing selected".to_string())}
					</p>
				</div>
			</div>
		</ErrorBoundary>
	}
}
