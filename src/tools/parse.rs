use super::Reference;

/// Parses `global -x` style output: `symbol line file source...`.
///
/// Rows with fewer than three fields or a non-numeric line are skipped. The
/// source text is the remaining fields joined by single spaces.
pub fn parse_xref_output(output: &str) -> Vec<Reference> {
    output.lines().filter_map(parse_xref_line).collect()
}

pub fn parse_xref_line(line: &str) -> Option<Reference> {
    let mut parts = line.split_whitespace();
    let symbol = parts.next()?;
    let line_no = parts.next()?;
    let file = parts.next()?;
    let Ok(line_no) = line_no.parse::<u32>() else {
        tracing::debug!(line, "Skipping xref row with non-numeric line");
        return None;
    };
    Some(Reference {
        symbol: symbol.to_string(),
        line: line_no,
        file: file.to_string(),
        source_text: parts.collect::<Vec<_>>().join(" "),
    })
}
