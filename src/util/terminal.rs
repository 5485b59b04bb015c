// Uplift
// Copyright (C) 2025 - Uplift contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// long with this program.  If not, see <http://www.gnu.org/licenses/>.

pub fn markdown_print(markdown: &str) {
    termimad::print_text(markdown);
}

pub fn banner(msg: &str) {
    let markdown = format!("|:-|\n|{}|\n|-", msg);
    markdown_print(&markdown);
}

/// Render a table with an arbitrary number of columns; used by `show`
/// and the run recap.
pub fn table(headers: &[&str], rows: &[Vec<String>]) {
    let mut buffer = String::new();
    buffer.push_str(&format!("|:-{}\n", "|:-".repeat(headers.len().saturating_sub(1))));
    buffer.push_str(&format!("|{}\n", headers.join("|")));
    for row in rows.iter() {
        buffer.push_str(&format!("|-{}\n", "|-".repeat(headers.len().saturating_sub(1))));
        buffer.push_str(&format!("|{}\n", row.join("|")));
    }
    buffer.push_str(&format!("|-{}\n", "|-".repeat(headers.len().saturating_sub(1))));
    markdown_print(&buffer);
}
