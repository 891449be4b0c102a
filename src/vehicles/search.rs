use super::Vehicle;

/// Largest edit distance at which a word still counts as a hit.
const MAX_DISTANCE: usize = 2;
const MIN_FUZZY_LEN: usize = 4;

/// Keyword search over the descriptive fields of a vehicle.
///
/// A hit is either a case-insensitive substring of one of the fields or a
/// single word within [`MAX_DISTANCE`] edits of the keyword, so "cretta"
/// and "kathmandoo" still find what the user meant. Keywords shorter than
/// [`MIN_FUZZY_LEN`] only match as substrings.
pub fn matches_keyword(vehicle: &Vehicle, keyword: &str) -> bool {
	let keyword = keyword.trim().to_lowercase();
	if keyword.is_empty() {
		return true;
	}

	let fields = [
		vehicle.name.as_str(),
		vehicle.brand.as_str(),
		vehicle.model.as_str(),
		vehicle.location.as_str(),
		vehicle.description.as_str(),
		vehicle.vehicle_type.as_str(),
	];

	fields.iter().any(|field| {
		let field = field.to_lowercase();
		if field.contains(&keyword) {
			return true;
		}
		if keyword.chars().count() < MIN_FUZZY_LEN {
			return false;
		}
		field
			.split(|c: char| !c.is_alphanumeric())
			.filter(|word| !word.is_empty())
			.any(|word| levenshtein::levenshtein(word, &keyword) <= MAX_DISTANCE)
	})
}
