//! Client for the votes API: payload types, fetching, and conversion into chart records.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::Response;

use crate::components::bubble_chart::{BubbleRecord, ParseCategoryError};

/// Where the API is served when `VOTES_API_URL` is not set at build time.
pub const DEFAULT_API_URL: &str = "http://localhost:4567";

const UNKNOWN_PARTY_COLOUR: &str = "#999999";

/// Failure fetching or decoding API data.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ApiError {
	/// Not running in a browser window.
	#[error("no browser window available")]
	NoWindow,
	/// The request itself failed.
	#[error("request failed: {0}")]
	Network(String),
	/// The server answered with a non-success status.
	#[error("server responded with status {0}")]
	Status(u16),
	/// The body was not the expected JSON.
	#[error("could not decode response: {0}")]
	Decode(String),
	/// A vote event carried an option the chart cannot place.
	#[error(transparent)]
	Category(#[from] ParseCategoryError),
}

impl ApiError {
	fn from_js(value: JsValue) -> Self {
		ApiError::Network(format!("{value:?}"))
	}
}

/// API location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiConfig {
	/// Base URL without a trailing slash.
	pub base_url: String,
}

impl ApiConfig {
	/// Reads `VOTES_API_URL` as captured at build time.
	pub fn from_env() -> Self {
		Self::new(option_env!("VOTES_API_URL").unwrap_or(DEFAULT_API_URL))
	}

	/// Uses `base_url`, trimming any trailing slash.
	pub fn new(base_url: &str) -> Self {
		Self {
			base_url: base_url.trim_end_matches('/').to_string(),
		}
	}

	/// URL of the initial data bundle.
	pub fn initial_data_url(&self) -> String {
		format!("{}/initial-data", self.base_url)
	}

	/// URL of one vote's events.
	pub fn vote_events_url(&self, vote_id: i64) -> String {
		format!("{}/vote-events/{}", self.base_url, vote_id)
	}
}

impl Default for ApiConfig {
	fn default() -> Self {
		Self::from_env()
	}
}

/// How one person voted in one division, joined with who they were on that date.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct VoteEvent {
	/// Person the event belongs to.
	pub person_id: i64,
	/// Vote the event belongs to.
	pub vote_id: i64,
	/// Raw vote option, e.g. `aye`, `no`, `absent`.
	pub option: String,
	/// Display name, when the join supplied one.
	#[serde(default)]
	pub name: Option<String>,
	/// Party on the vote date.
	#[serde(default)]
	pub party: Option<String>,
}

impl VoteEvent {
	/// Chart record for this event, coloured by party.
	pub fn to_record(&self) -> Result<BubbleRecord, ParseCategoryError> {
		Ok(BubbleRecord {
			id: self.person_id.to_string(),
			category: self.option.parse()?,
			colour: party_colour(self.party.as_deref()).to_string(),
			border_colour: None,
		})
	}
}

/// A division.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Vote {
	/// Vote id.
	pub id: i64,
	/// Date of the vote, as stored.
	#[serde(default)]
	pub date: Option<String>,
	/// Description of the motion.
	#[serde(default)]
	pub text: Option<String>,
	/// Policies the vote counts toward.
	#[serde(rename = "policyIds", default)]
	pub policy_ids: Vec<i64>,
	/// Present only on the latest vote of the initial data bundle.
	#[serde(rename = "voteEvents", default)]
	pub vote_events: Vec<VoteEvent>,
}

/// A policy grouping related votes.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Policy {
	/// Policy id.
	pub id: i64,
	/// Policy title.
	#[serde(default)]
	pub title: Option<String>,
}

/// Everything the page needs on first load.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialData {
	/// Most recent vote, with its events.
	pub latest_vote: Vote,
	/// All votes, without events.
	pub votes: Vec<Vote>,
	/// All policies.
	pub policies: Vec<Policy>,
}

/// Converts a batch of events, rejecting the whole batch on any unknown option.
pub fn records_for(events: &[VoteEvent]) -> Result<Vec<BubbleRecord>, ParseCategoryError> {
	events.iter().map(VoteEvent::to_record).collect()
}

/// Bubble fill for a party name.
pub fn party_colour(party: Option<&str>) -> &'static str {
	let Some(party) = party else {
		return UNKNOWN_PARTY_COLOUR;
	};
	match party.trim().to_ascii_lowercase().as_str() {
		"labour" | "labour/co-operative" => "#dc241f",
		"conservative" => "#0087dc",
		"liberal democrat" => "#fdbb30",
		"scottish national party" => "#fff95d",
		"green" => "#6ab023",
		"plaid cymru" => "#008142",
		"dup" => "#d46a4c",
		"sinn féin" => "#326760",
		_ => UNKNOWN_PARTY_COLOUR,
	}
}

async fn get_json<T: DeserializeOwned>(url: &str) -> Result<T, ApiError> {
	let window = web_sys::window().ok_or(ApiError::NoWindow)?;
	let response = JsFuture::from(window.fetch_with_str(url))
		.await
		.map_err(ApiError::from_js)?;
	let response: Response = response.dyn_into().map_err(ApiError::from_js)?;
	if !response.ok() {
		return Err(ApiError::Status(response.status()));
	}
	let body = JsFuture::from(response.text().map_err(ApiError::from_js)?)
		.await
		.map_err(ApiError::from_js)?;
	let body = body
		.as_string()
		.ok_or_else(|| ApiError::Decode("response body is not text".to_string()))?;
	serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Fetches the initial data bundle.
pub async fn fetch_initial_data(config: &ApiConfig) -> Result<InitialData, ApiError> {
	get_json(&config.initial_data_url()).await
}

/// Fetches the events of one vote.
pub async fn fetch_vote_events(
	config: &ApiConfig,
	vote_id: i64,
) -> Result<Vec<VoteEvent>, ApiError> {
	get_json(&config.vote_events_url(vote_id)).await
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::bubble_chart::Category;

	const INITIAL: &str = r##"{
		"latestVote": {
			"id": 7,
			"date": "2017-03-01",
			"text": "Second reading",
			"policyIds": [3],
			"voteEvents": [
				{"person_id": 10, "vote_id": 7, "option": "aye", "party": "Labour", "name": "A"},
				{"person_id": 11, "vote_id": 7, "option": "no", "party": "Conservative"},
				{"person_id": 12, "vote_id": 7, "option": "absent"}
			]
		},
		"votes": [{"id": 6, "policyIds": []}, {"id": 7, "policyIds": [3]}],
		"policies": [{"id": 3, "title": "Transport"}]
	}"##;

	#[test]
	fn decodes_initial_data() {
		let data: InitialData = serde_json::from_str(INITIAL).unwrap();
		assert_eq!(data.latest_vote.id, 7);
		assert_eq!(data.latest_vote.vote_events.len(), 3);
		assert_eq!(data.votes[1].policy_ids, vec![3]);
		assert!(data.votes[0].vote_events.is_empty());
		assert_eq!(data.policies[0].title.as_deref(), Some("Transport"));
	}

	#[test]
	fn events_become_party_coloured_records() {
		let data: InitialData = serde_json::from_str(INITIAL).unwrap();
		let records = records_for(&data.latest_vote.vote_events).unwrap();

		assert_eq!(records[0].id, "10");
		assert_eq!(records[0].category, Category::Yes);
		assert_eq!(records[0].colour, "#dc241f");
		assert_eq!(records[1].category, Category::No);
		assert_eq!(records[1].colour, "#0087dc");
		assert_eq!(records[2].category, Category::Absent);
		assert_eq!(records[2].colour, UNKNOWN_PARTY_COLOUR);
	}

	#[test]
	fn unknown_option_rejects_batch() {
		let events: Vec<VoteEvent> = serde_json::from_str(
			r#"[{"person_id": 1, "vote_id": 2, "option": "aye"},
			    {"person_id": 2, "vote_id": 2, "option": "spoilt"}]"#,
		)
		.unwrap();
		let err = records_for(&events).unwrap_err();
		assert_eq!(err, ParseCategoryError("spoilt".to_string()));
	}

	#[test]
	fn config_builds_urls() {
		let config = ApiConfig::new("http://votes.test/");
		assert_eq!(config.initial_data_url(), "http://votes.test/initial-data");
		assert_eq!(config.vote_events_url(42), "http://votes.test/vote-events/42");
	}
}
