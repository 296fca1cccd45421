//! CSV output format for reconstructed timelines
//!
//! Flattens both timelines into one table for spreadsheet analysis:
//! `scope,key,time,evt,ref` where `scope` is `cpu` (key = CPU id, ref = task
//! id) or `task` (key = task id, ref = CPU id). Rows keep timeline order.

use crate::model::NormalizedModel;

/// CSV record for one timeline entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRow {
    pub scope: &'static str,
    pub key: i64,
    pub time: u64,
    pub evt: &'static str,
    pub reference: i64,
}

/// CSV output formatter
#[derive(Debug, Default)]
pub struct CsvOutput {
    rows: Vec<CsvRow>,
    include_tasks: bool,
}

impl CsvOutput {
    /// Create a new CSV output formatter
    pub fn new(include_tasks: bool) -> Self {
        Self {
            rows: Vec::new(),
            include_tasks,
        }
    }

    /// Build rows from a finished model
    pub fn from_model(model: &NormalizedModel, include_tasks: bool) -> Self {
        let mut output = Self::new(include_tasks);
        for (&cpu, entries) in model.cpu_timelines() {
            for entry in entries {
                output.add_row(CsvRow {
                    scope: "cpu",
                    key: i64::from(cpu),
                    time: entry.time,
                    evt: entry.evt.as_str(),
                    reference: entry.tid,
                });
            }
        }
        if include_tasks {
            for (&tid, entries) in model.task_timelines() {
                for entry in entries {
                    output.add_row(CsvRow {
                        scope: "task",
                        key: tid,
                        time: entry.time,
                        evt: entry.evt.as_str(),
                        reference: i64::from(entry.cpu),
                    });
                }
            }
        }
        output
    }

    /// Add a row to the output
    pub fn add_row(&mut self, row: CsvRow) {
        if row.scope == "task" && !self.include_tasks {
            return;
        }
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn header() -> &'static str {
        "scope,key,time,evt,ref"
    }

    fn format_row(row: &CsvRow) -> String {
        format!(
            "{},{},{},{},{}",
            row.scope, row.key, row.time, row.evt, row.reference
        )
    }

    /// Generate CSV output as string
    pub fn to_csv(&self) -> String {
        let mut output = String::new();

        output.push_str(Self::header());
        output.push('\n');

        for row in &self.rows {
            output.push_str(&Self::format_row(row));
            output.push('\n');
        }

        output
    }
}
