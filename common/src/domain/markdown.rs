use crate::error::ManifestParseError;

/// Splits a `---` delimited preamble from the markdown body, tolerating a
/// leading BOM.
pub fn split_raw_frontmatter(input: &str) -> Result<(String, String), ManifestParseError> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);
    let mut lines = input.lines();
    let first = lines.next().unwrap_or_default();
    if first.trim_end() != "---" {
        return Err(ManifestParseError::MissingFrontmatter);
    }
    let mut fm_lines = Vec::new();
    let mut closed = false;
    for line in lines.by_ref() {
        if line.trim_end() == "---" {
            closed = true;
            break;
        }
        fm_lines.push(line);
    }
    if !closed {
        return Err(ManifestParseError::InvalidYaml(
            "frontmatter is not terminated by '---'".to_string(),
        ));
    }
    let fm = fm_lines.join("\n");
    let body = lines.collect::<Vec<_>>().join("\n");
    Ok((fm, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_raw_frontmatter_requires_opening_delimiter() {
        let err = split_raw_frontmatter("name: x\n---\nbody").unwrap_err();
        assert_eq!(err, ManifestParseError::MissingFrontmatter);
    }

    #[test]
    fn split_raw_frontmatter_rejects_unterminated_preamble() {
        let err = split_raw_frontmatter("---\nname: x\n# no close").unwrap_err();
        assert!(err.to_string().contains("not terminated"));
    }

    #[test]
    fn split_raw_frontmatter_strips_bom_and_returns_body() -> Result<(), ManifestParseError> {
        let (fm, body) = split_raw_frontmatter("\u{feff}---\nname: a\n---\n# Body")?;
        assert_eq!(fm, "name: a");
        assert_eq!(body, "# Body");
        Ok(())
    }
}
