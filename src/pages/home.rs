use leptos::prelude::*;
use leptos::task::spawn_local;
use log::{debug, error, warn};

use crate::api::{self, ApiConfig, ApiError, InitialData, Vote};
use crate::components::bubble_chart::{BubbleChart, BubbleRecord, ChartEvent};

fn vote_title(vote: &Vote) -> String {
	match (&vote.text, &vote.date) {
		(Some(text), Some(date)) => format!("{date}: {text}"),
		(Some(text), None) => text.clone(),
		(None, Some(date)) => format!("Vote {} ({date})", vote.id),
		(None, None) => format!("Vote {}", vote.id),
	}
}

/// Signals the page writes as vote data arrives.
#[derive(Clone, Copy)]
struct ChartSignals {
	selected: ReadSignal<Option<i64>>,
	records: WriteSignal<Vec<BubbleRecord>>,
	settled: WriteSignal<bool>,
	error: WriteSignal<Option<String>>,
}

impl ChartSignals {
	/// Charts a new batch. Settlement is cleared here so only this batch can report it.
	fn show_records(&self, records: Vec<BubbleRecord>) {
		self.settled.set(false);
		self.records.set(records);
	}

	/// Applies a finished load of `vote_id`, unless another vote was selected meanwhile.
	fn finish_load(&self, vote_id: i64, loaded: Result<Vec<BubbleRecord>, ApiError>) {
		if self.selected.get_untracked() != Some(vote_id) {
			debug!("dropping stale events for vote {vote_id}");
			return;
		}
		match loaded {
			Ok(records) => {
				self.error.set(None);
				self.show_records(records);
			}
			Err(err) => {
				error!("failed to load vote {vote_id}: {err}");
				self.error.set(Some(err.to_string()));
			}
		}
	}
}

/// Loads the events of `vote_id` into the chart.
fn load_vote(config: ApiConfig, vote_id: i64, signals: ChartSignals) {
	spawn_local(async move {
		let loaded = api::fetch_vote_events(&config, vote_id)
			.await
			.and_then(|events| api::records_for(&events).map_err(Into::into));
		signals.finish_load(vote_id, loaded);
	});
}

/// Default Home Page
#[component]
pub fn Home() -> impl IntoView {
	let config = ApiConfig::from_env();
	let (records, set_records) = signal(Vec::<BubbleRecord>::new());
	let (votes, set_votes) = signal(Vec::<Vote>::new());
	let (selected, set_selected) = signal(None::<i64>);
	let (hovered, set_hovered) = signal(None::<String>);
	let (settled, set_settled) = signal(false);
	let (load_error, set_error) = signal(None::<String>);
	let signals = ChartSignals {
		selected,
		records: set_records,
		settled: set_settled,
		error: set_error,
	};

	let initial_config = config.clone();
	spawn_local(async move {
		let loaded: Result<InitialData, _> = api::fetch_initial_data(&initial_config).await;
		match loaded {
			Ok(data) => {
				match api::records_for(&data.latest_vote.vote_events) {
					Ok(latest) => signals.show_records(latest),
					Err(err) => {
						warn!("latest vote not charted: {err}");
						set_error.set(Some(err.to_string()));
					}
				}
				set_selected.set(Some(data.latest_vote.id));
				set_votes.set(data.votes);
			}
			Err(err) => {
				error!("failed to load initial data: {err}");
				set_error.set(Some(err.to_string()));
			}
		}
	});

	let on_event = Callback::new(move |event: ChartEvent| match event {
		ChartEvent::Settled => set_settled.set(true),
		ChartEvent::NodeHovered(id) => set_hovered.set(Some(id)),
		ChartEvent::NodeUnhovered(_) => set_hovered.set(None),
		ChartEvent::NodeClicked(id) => log::info!("person {id} clicked"),
	});

	let hovered_label = move || {
		let id = hovered.get()?;
		let record = records.with(|records| records.iter().find(|r| r.id == id).cloned())?;
		Some(format!("Person {} voted {}", record.id, record.category))
	};

	view! {
		<div class="bubble-page">
			<aside class="vote-list">
				<h2>"Votes"</h2>
				<ul>
					<For
						each=move || votes.get()
						key=|vote| vote.id
						children=move |vote| {
							let id = vote.id;
							let title = vote_title(&vote);
							let config = config.clone();
							view! {
								<li
									class:selected=move || selected.get() == Some(id)
									on:click=move |_| {
										set_selected.set(Some(id));
										load_vote(config.clone(), id, signals);
									}
								>
									{title}
								</li>
							}
						}
					/>
				</ul>
			</aside>

			<main class="chart-area">
				<BubbleChart data=records on_event=on_event />
				<p class="chart-status">
					{move || if settled.get() { "Settled" } else { "Arranging…" }}
				</p>
				<p class="hovered-person">{hovered_label}</p>
				<Show when=move || load_error.get().is_some()>
					<p class="load-error">{move || load_error.get().unwrap_or_default()}</p>
				</Show>
			</main>
		</div>
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::bubble_chart::Category;

	fn batch(id: &str) -> Vec<BubbleRecord> {
		vec![BubbleRecord {
			id: id.to_string(),
			category: Category::Yes,
			colour: "#dc241f".to_string(),
			border_colour: None,
		}]
	}

	struct Page {
		signals: ChartSignals,
		set_selected: WriteSignal<Option<i64>>,
		records: ReadSignal<Vec<BubbleRecord>>,
		settled: ReadSignal<bool>,
		error: ReadSignal<Option<String>>,
	}

	fn page() -> Page {
		let (selected, set_selected) = signal(None::<i64>);
		let (records, set_records) = signal(Vec::<BubbleRecord>::new());
		let (settled, set_settled) = signal(false);
		let (error, set_error) = signal(None::<String>);
		Page {
			signals: ChartSignals {
				selected,
				records: set_records,
				settled: set_settled,
				error: set_error,
			},
			set_selected,
			records,
			settled,
			error,
		}
	}

	#[test]
	fn late_response_for_previous_vote_is_dropped() {
		let page = page();
		page.set_selected.set(Some(1));
		page.set_selected.set(Some(2));

		page.signals.finish_load(2, Ok(batch("b")));
		page.signals.finish_load(1, Ok(batch("a")));

		assert_eq!(page.records.get_untracked(), batch("b"));
		assert_eq!(page.error.get_untracked(), None);
	}

	#[test]
	fn stale_failure_does_not_surface() {
		let page = page();
		page.set_selected.set(Some(2));

		page.signals.finish_load(1, Err(ApiError::Status(500)));

		assert_eq!(page.error.get_untracked(), None);
	}

	#[test]
	fn settlement_resets_when_new_records_land() {
		let page = page();
		page.set_selected.set(Some(3));
		page.signals.settled.set(true);

		page.set_selected.set(Some(4));
		assert!(page.settled.get_untracked());

		page.signals.finish_load(4, Ok(batch("c")));
		assert!(!page.settled.get_untracked());
		assert_eq!(page.records.get_untracked(), batch("c"));
	}
}
