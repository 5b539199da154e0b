use leptos::prelude::*;
use vote_bubbles::{App, init_logging};

fn main() {
	init_logging();
	mount_to_body(App);
}
