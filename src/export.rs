//! Workout exports: a CSV spreadsheet that can be read back, and a paginated
//! plain-text report.

use std::io::{Read, Write};

use crate::error::AppError;
use crate::models::WorkoutEntry;

const CSV_HEADER: [&str; 8] = [
    "id", "owner", "date", "routine", "exercise", "reps", "sets", "weight_kg",
];

const PAGE_BREAK: char = '\u{000C}';

// Lines produced by `entry_block`.
const ENTRY_LINES: usize = 8;

pub fn write_workouts_csv<W: Write>(entries: &[WorkoutEntry], writer: W) -> Result<(), AppError> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    wtr.write_record(CSV_HEADER)?;
    for entry in entries {
        wtr.serialize(entry)?;
    }
    wtr.flush()?;

    Ok(())
}

pub fn workouts_csv_string(entries: &[WorkoutEntry]) -> Result<String, AppError> {
    let mut output = Vec::new();
    write_workouts_csv(entries, &mut output)?;
    String::from_utf8(output).map_err(|e| AppError::Export(e.to_string()))
}

/// Columns are matched by header name, so any column order is accepted.
pub fn read_workouts_csv<R: Read>(reader: R) -> Result<Vec<WorkoutEntry>, AppError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut entries = Vec::new();
    for row in rdr.deserialize::<WorkoutEntry>() {
        entries.push(row?);
    }
    Ok(entries)
}

pub fn csv_filename(owner: Option<&str>) -> String {
    match owner {
        Some(owner) => format!("workouts_{}.csv", owner),
        None => "workouts_all.csv".to_string(),
    }
}

pub fn report_filename(owner: &str) -> String {
    format!("report_{}.txt", owner)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub title: String,
    pub pages: Vec<Vec<String>>,
}

impl Report {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Pages separated by a form feed, each headed by `title - page i/n`.
    pub fn render(&self) -> String {
        let total = self.pages.len();
        let rendered: Vec<String> = self
            .pages
            .iter()
            .enumerate()
            .map(|(i, lines)| {
                let mut page = format!("{} - page {}/{}\n\n", self.title, i + 1, total);
                for line in lines {
                    page.push_str(line);
                    page.push('\n');
                }
                page
            })
            .collect();

        rendered.join(&PAGE_BREAK.to_string())
    }
}

fn entry_block(entry: &WorkoutEntry) -> Vec<String> {
    vec![
        format!("Entry #{}", entry.id),
        format!("Owner: {}", entry.owner),
        format!("Date: {}", entry.date),
        format!("Routine: {}", entry.routine),
        format!("Exercise: {}", entry.exercise),
        format!("Reps: {}", entry.reps),
        format!("Sets: {}", entry.sets),
        format!("Weight (kg): {:.1}", entry.weight_kg),
    ]
}

/// Lays entries out one field per line. An entry never straddles two pages.
pub fn render_report(
    title: &str,
    entries: &[WorkoutEntry],
    lines_per_page: usize,
) -> Result<Report, AppError> {
    if lines_per_page < ENTRY_LINES {
        return Err(AppError::Validation(format!(
            "A report page needs at least {} lines, got {}",
            ENTRY_LINES, lines_per_page
        )));
    }

    let mut pages: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();

    for entry in entries {
        let block = entry_block(entry);
        let separator = usize::from(!current.is_empty());

        if current.len() + separator + block.len() > lines_per_page {
            pages.push(std::mem::take(&mut current));
        } else if separator == 1 {
            current.push(String::new());
        }
        current.extend(block);
    }

    if !current.is_empty() {
        pages.push(current);
    }
    if pages.is_empty() {
        pages.push(vec!["No workouts recorded.".to_string()]);
    }

    Ok(Report {
        title: title.to_string(),
        pages,
    })
}
