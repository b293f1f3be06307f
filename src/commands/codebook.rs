use std::io::{self, BufWriter, Write};

use anyhow::{Result, bail};

use crate::cli::{CodebookArgs, OutputFormat};
use crate::codebook::{Codebook, CodebookEntry};
use crate::util::print_json;

pub fn run(args: CodebookArgs) -> Result<()> {
    let codebook = Codebook::load_or_builtin(args.codebook.codebook.as_deref())?;
    let entries = select_entries(&codebook, args.domain.as_deref())?;

    match args.format {
        OutputFormat::Json => print_json(&entries),
        OutputFormat::Text => write_text(&codebook, &entries),
    }
}

fn select_entries<'a>(codebook: &'a Codebook, domain: Option<&str>) -> Result<Vec<&'a CodebookEntry>> {
    let Some(domain) = domain else {
        return Ok(codebook.entries().iter().collect());
    };

    let entries = codebook.entries_in_domain(domain).collect::<Vec<_>>();
    if entries.is_empty() {
        bail!(
            "unknown codebook domain '{domain}'; available: {}",
            codebook.domains().join(", ")
        );
    }
    Ok(entries)
}

fn write_text(codebook: &Codebook, entries: &[&CodebookEntry]) -> Result<()> {
    let mut output = BufWriter::new(io::stdout().lock());
    for domain in codebook.domains() {
        let in_domain = entries
            .iter()
            .filter(|entry| entry.domain == domain)
            .collect::<Vec<_>>();
        if in_domain.is_empty() {
            continue;
        }

        writeln!(output, "{domain}")?;
        for entry in in_domain {
            writeln!(output, "  {:<8} {}", entry.code, entry.name)?;
            if !entry.description.is_empty() {
                writeln!(output, "           {}", entry.description)?;
            }
        }
        writeln!(output)?;
    }
    output.flush()?;
    Ok(())
}
