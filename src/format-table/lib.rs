//! Format tables with a stupid API.
//!
//! Each row is a single string with fields separated by `\t`. Column widths
//! are computed from the longest field in each column and the table is
//! printed with two spaces of padding between columns. The first row is
//! treated as a header and is not otherwise special-cased.

/// Print a table of tab-separated rows to stdout, aligning columns.
pub fn format_table(rows: Vec<String>) {
	for line in format_table_to_string(rows).lines() {
		println!("{}", line);
	}
}

/// Same as [`format_table`] but returns the formatted text instead of
/// printing it, for callers that want to embed it elsewhere (e.g. a
/// non-interactive report).
pub fn format_table_to_string(rows: Vec<String>) -> String {
	let splitrows = rows
		.iter()
		.map(|r| r.split('\t').collect::<Vec<_>>())
		.collect::<Vec<_>>();

	let ncols = splitrows.iter().map(|r| r.len()).max().unwrap_or(0);
	let mut col_width = vec![0; ncols];

	for row in splitrows.iter() {
		for (i, cell) in row.iter().enumerate() {
			col_width[i] = col_width[i].max(cell.chars().count());
		}
	}

	let mut out = String::new();
	for row in splitrows.iter() {
		let mut line = String::new();
		for (i, cell) in row.iter().enumerate() {
			if i + 1 == row.len() {
				line.push_str(cell);
			} else {
				line.push_str(&format!("{:width$}  ", cell, width = col_width[i]));
			}
		}
		out.push_str(line.trim_end());
		out.push('\n');
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn aligns_columns() {
		let rows = vec![
			"a\tbb\tccc".to_string(),
			"aaaa\tb\tc".to_string(),
		];
		let out = format_table_to_string(rows);
		let lines: Vec<&str> = out.lines().collect();
		assert_eq!(lines.len(), 2);
		assert!(lines[0].starts_with("a     "));
	}
}
