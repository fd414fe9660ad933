//! Search entry names with a regular expression

use crate::error::{Result, TarballError};
use crate::reader::TarballReader;
use regex::Regex;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Names matched before a scan failed, together with the failure
#[derive(Debug)]
pub struct PartialScan {
    pub names: Vec<String>,
    pub error: TarballError,
}

impl std::fmt::Display for PartialScan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "scan stopped after {} matches: {}",
            self.names.len(),
            self.error
        )
    }
}

impl std::error::Error for PartialScan {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl From<TarballError> for PartialScan {
    fn from(error: TarballError) -> Self {
        PartialScan {
            names: Vec::new(),
            error,
        }
    }
}

impl From<PartialScan> for TarballError {
    fn from(scan: PartialScan) -> Self {
        scan.error
    }
}

/// List the names of all entries matching `pattern` anywhere in the name, in stream order.
///
/// The pattern is compiled before anything is read. Payloads are skipped, never
/// buffered. If the stream turns out to be corrupt, the names found up to that point
/// are returned alongside the error.
pub fn find_entries<R: Read>(source: R, pattern: &str) -> std::result::Result<Vec<String>, PartialScan> {
    let regex = Regex::new(pattern).map_err(TarballError::from)?;
    scan(TarballReader::new(source), &regex)
}

/// Like [`find_entries`], reading the tarball from a file
pub fn find_entries_in_file<P: AsRef<Path>>(
    path: P,
    pattern: &str,
) -> std::result::Result<Vec<String>, PartialScan> {
    let regex = Regex::new(pattern).map_err(TarballError::from)?;
    let file = File::open(path).map_err(TarballError::from)?;
    scan(TarballReader::new(BufReader::new(file)), &regex)
}

fn scan<R: Read>(
    mut reader: TarballReader<R>,
    regex: &Regex,
) -> std::result::Result<Vec<String>, PartialScan> {
    let mut names = Vec::new();
    match collect_matches(&mut reader, regex, &mut names) {
        Ok(()) => {
            log::debug!("{} entries match {}", names.len(), regex);
            Ok(names)
        }
        Err(error) => Err(PartialScan { names, error }),
    }
}

fn collect_matches<R: Read>(
    reader: &mut TarballReader<R>,
    regex: &Regex,
    names: &mut Vec<String>,
) -> Result<()> {
    while let Some(header) = reader.next_entry()? {
        if regex.is_match(&header.name) {
            names.push(header.name);
        }
        reader.skip_entry()?;
    }
    Ok(())
}
