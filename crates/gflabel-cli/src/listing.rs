#![forbid(unsafe_code)]

//! `--list-fragments` and `--list-symbols`.

use std::io::{self, Write};

use gflabel_fragments::{FragmentRegistry, SymbolEntry};

pub fn write_fragments(out: &mut impl Write, registry: &FragmentRegistry) -> io::Result<()> {
    for row in registry.describe() {
        let names: Vec<String> = row.names.iter().map(|name| format!("{{{name}}}")).collect();
        writeln!(out, "{}", names.join(", "))?;
        for line in row.description.lines() {
            writeln!(out, "    {line}")?;
        }
        if !row.examples.is_empty() {
            writeln!(out, "    Examples: {}", row.examples.join("  "))?;
        }
        writeln!(out)?;
    }
    Ok(())
}

pub fn write_symbols(out: &mut impl Write, symbols: &[SymbolEntry]) -> io::Result<()> {
    let header = ["ID", "CATEGORY", "STANDARD", "NAME", "FILENAME"];
    let rows: Vec<[&str; 5]> = symbols
        .iter()
        .map(|entry| {
            [
                entry.id.as_str(),
                entry.category.as_str(),
                entry.standard.as_str(),
                entry.name.as_str(),
                entry.filename.as_str(),
            ]
        })
        .collect();

    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    for row in std::iter::once(&header).chain(&rows) {
        let cells: Vec<String> = row
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        writeln!(out, "{}", cells.join("  ").trim_end())?;
    }
    Ok(())
}
