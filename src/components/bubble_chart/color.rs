/// Channel multiplier for one step darker.
const DARKER: f64 = 0.7;

fn parse_hex(colour: &str) -> Option<[u8; 3]> {
	let hex = colour.strip_prefix('#')?;
	let channel = |s: &str| u8::from_str_radix(s, 16).ok();
	match hex.len() {
		3 => {
			let mut rgb = [0; 3];
			for (i, c) in hex.chars().enumerate() {
				let v = c.to_digit(16)? as u8;
				rgb[i] = v * 16 + v;
			}
			Some(rgb)
		}
		6 => Some([
			channel(hex.get(0..2)?)?,
			channel(hex.get(2..4)?)?,
			channel(hex.get(4..6)?)?,
		]),
		_ => None,
	}
}

/// Border colour for a bubble whose record gives none. Colours that are not
/// `#rgb`/`#rrggbb` hex are returned unchanged.
pub fn darker(colour: &str) -> String {
	match parse_hex(colour) {
		Some(rgb) => {
			let [r, g, b] = rgb.map(|c| (c as f64 * DARKER).round() as u8);
			format!("#{r:02x}{g:02x}{b:02x}")
		}
		None => colour.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn darkens_long_hex() {
		assert_eq!(darker("#0a64c8"), "#07468c");
		assert_eq!(darker("#DC241F"), "#9a1916");
	}

	#[test]
	fn darkens_short_hex() {
		assert_eq!(darker("#864"), "#5f4730");
	}

	#[test]
	fn passes_through_named_colours() {
		assert_eq!(darker("red"), "red");
		assert_eq!(darker("#12345"), "#12345");
	}
}
