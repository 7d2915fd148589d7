//! Splits long command outputs into messages `Discord` accepts

use crate::constants::limits;

/// Accumulates lines into pages no longer than a message
#[derive(Debug)]
pub(crate) struct Paginator {
	/// Maximum number of characters in a page
	max_size: usize,
	/// Finished pages
	pages: Vec<String>,
	/// Page being filled
	current: String,
	/// Number of characters in the current page
	current_size: usize,
}

impl Default for Paginator {
	fn default() -> Self {
		Self::with_max_size(limits::MESSAGE_LENGTH)
	}
}

impl Paginator {
	/// A paginator with custom page size
	///
	/// # Panics
	/// If `max_size` is zero
	pub(crate) fn with_max_size(max_size: usize) -> Self {
		assert!(max_size > 0, "pages must hold at least one character");

		Self {
			max_size,
			pages: Vec::new(),
			current: String::new(),
			current_size: 0,
		}
	}

	/// Add a line, followed by a blank one when `empty` is set
	///
	/// Lines too long for a single page are cut across several pages.
	pub(crate) fn add_line(&mut self, line: &str, empty: bool) {
		let chars = line.chars().collect::<Vec<_>>();

		if chars.is_empty() {
			self.push("", 0);
		}

		for chunk in chars.chunks(self.max_size) {
			self.push(&chunk.iter().collect::<String>(), chunk.len());
		}

		if empty {
			self.push("", 0);
		}
	}

	/// Append an already fitting line to the pages
	fn push(&mut self, line: &str, size: usize) {
		// Blank lines are never worth opening a page for
		if self.current.is_empty() && size == 0 {
			return;
		}

		if !self.current.is_empty() && self.current_size + 1 + size > self.max_size {
			self.close_page();
		}

		if !self.current.is_empty() {
			self.current.push('\n');
			self.current_size += 1;
		}

		self.current.push_str(line);
		self.current_size += size;
	}

	/// Move the current page to the finished ones
	fn close_page(&mut self) {
		let page = std::mem::take(&mut self.current);
		self.current_size = 0;

		let page = page.trim_end_matches('\n');
		if !page.is_empty() {
			self.pages.push(page.to_owned());
		}
	}

	/// Finish the last page and return all of them
	pub(crate) fn into_pages(mut self) -> Vec<String> {
		self.close_page();
		self.pages
	}
}
