use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How a person voted, which decides the cluster their bubble is pulled toward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
	/// Aye, including tellers for the ayes.
	Yes,
	/// No, including tellers for the noes.
	No,
	/// Did not vote.
	Absent,
	/// Voted both ways.
	Both,
}

impl Category {
	/// Canonical lowercase name.
	pub fn as_str(self) -> &'static str {
		match self {
			Category::Yes => "yes",
			Category::No => "no",
			Category::Absent => "absent",
			Category::Both => "both",
		}
	}
}

impl fmt::Display for Category {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A vote option outside the known set.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown vote option `{0}`")]
pub struct ParseCategoryError(pub String);

impl FromStr for Category {
	type Err = ParseCategoryError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		// Tellers are counted with the side they told for.
		match s.trim().to_ascii_lowercase().as_str() {
			"yes" | "aye" | "tellaye" => Ok(Category::Yes),
			"no" | "tellno" => Ok(Category::No),
			"absent" => Ok(Category::Absent),
			"both" => Ok(Category::Both),
			_ => Err(ParseCategoryError(s.to_string())),
		}
	}
}

/// One entity handed to the chart by the page shell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BubbleRecord {
	/// Stable entity key, used to match bubbles across updates.
	pub id: String,
	/// Cluster the bubble is pulled toward.
	pub category: Category,
	/// Fill colour.
	pub colour: String,
	/// Stroke colour; a darker shade of `colour` when absent.
	#[serde(default)]
	pub border_colour: Option<String>,
}

/// Notifications the chart sends outward.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChartEvent {
	/// Energy dropped below the settled threshold since the last data submission.
	Settled,
	/// Pointer entered the bubble with this id.
	NodeHovered(String),
	/// Pointer left the bubble with this id.
	NodeUnhovered(String),
	/// The bubble with this id was clicked.
	NodeClicked(String),
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_known_options_and_aliases() {
		assert_eq!("yes".parse::<Category>(), Ok(Category::Yes));
		assert_eq!("Aye".parse::<Category>(), Ok(Category::Yes));
		assert_eq!("tellno".parse::<Category>(), Ok(Category::No));
		assert_eq!(" absent ".parse::<Category>(), Ok(Category::Absent));
		assert_eq!("both".parse::<Category>(), Ok(Category::Both));
	}

	#[test]
	fn rejects_unknown_option() {
		let err = "abstain".parse::<Category>().unwrap_err();
		assert_eq!(err, ParseCategoryError("abstain".to_string()));
		assert_eq!(err.to_string(), "unknown vote option `abstain`");
	}

	#[test]
	fn record_deserializes_without_border() {
		let record: BubbleRecord =
			serde_json::from_str(r##"{"id":"42","category":"no","colour":"#dc241f"}"##).unwrap();
		assert_eq!(record.category, Category::No);
		assert_eq!(record.border_colour, None);
	}
}
