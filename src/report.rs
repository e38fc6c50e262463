use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use csv::{Terminator, WriterBuilder};

/// Tab-separated savings table. Every ratio and every row is flushed as soon as it is written,
/// so an interrupted analysis still leaves its finished configurations on disk.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl ReportWriter<File> {
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::new(File::create(path)?))
    }
}

impl<W: Write> ReportWriter<W> {
    pub fn new(writer: W) -> Self {
        let writer = WriterBuilder::new()
            .delimiter(b'\t')
            .terminator(Terminator::Any(b'\n'))
            .from_writer(writer);
        Self { writer }
    }

    pub fn write_header(&mut self, trip_slacks: &[f64], thresholds: &[f64]) -> io::Result<()> {
        self.writer.write_field("ArrivalSlack")?;
        for &trip_slack in trip_slacks {
            for &threshold in thresholds {
                self.writer.write_field(column_name(trip_slack, threshold))?;
            }
        }
        self.end_row()
    }

    pub fn begin_row(&mut self, arrival_slack: f64) -> io::Result<()> {
        self.writer.write_field(arrival_slack.to_string())?;
        Ok(())
    }

    pub fn write_ratios(&mut self, ratios: &[f64]) -> io::Result<()> {
        for &ratio in ratios {
            self.writer.write_field(format_ratio(ratio))?;
            self.writer.flush()?;
        }
        Ok(())
    }

    pub fn end_row(&mut self) -> io::Result<()> {
        self.writer.write_record(None::<&[u8]>)?;
        self.writer.flush()
    }

    pub fn into_inner(self) -> io::Result<W> {
        self.writer.into_inner().map_err(|e| e.into_error())
    }
}

/// E.g. trip slack `1.25` and threshold `0.5` give `TripSlack25Savings50`.
pub fn column_name(trip_slack: f64, threshold: f64) -> String {
    let slack_percent = (trip_slack * 100.).round() as i64 - 100;
    let threshold_percent = (threshold * 100.).round() as i64;
    format!("TripSlack{slack_percent}Savings{threshold_percent}")
}

// Six decimals without trailing zeros: 1/3 gives `0.333333`, 0.2 gives `0.2`, 0 gives `0`.
fn format_ratio(ratio: f64) -> String {
    let text = format!("{ratio:.6}");
    text.trim_end_matches('0').trim_end_matches('.').to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_names_use_whole_percentages() {
        assert_eq!(column_name(1.25, 0.5), "TripSlack25Savings50");
        assert_eq!(column_name(1., 0.75), "TripSlack0Savings75");
        assert_eq!(column_name(1.1, 0.29), "TripSlack10Savings29");
    }

    #[test]
    fn ratios_are_printed_with_six_decimals() {
        assert_eq!(format_ratio(1. / 3.), "0.333333");
        assert_eq!(format_ratio(2. / 3.), "0.666667");
        assert_eq!(format_ratio(0.2), "0.2");
        assert_eq!(format_ratio(0.), "0");
        assert_eq!(format_ratio(1.), "1");
    }

    #[test]
    fn rows_follow_the_header() {
        let mut report = ReportWriter::new(Vec::new());
        report.write_header(&[1., 1.5], &[0.5]).unwrap();
        report.begin_row(1.1).unwrap();
        report.write_ratios(&[0.25]).unwrap();
        report.write_ratios(&[1. / 3.]).unwrap();
        report.end_row().unwrap();
        report.begin_row(1.).unwrap();
        report.write_ratios(&[1., 0.5]).unwrap();
        report.end_row().unwrap();

        let text = String::from_utf8(report.into_inner().unwrap()).unwrap();
        assert_eq!(
            text,
            "ArrivalSlack\tTripSlack0Savings50\tTripSlack50Savings50\n1.1\t0.25\t0.333333\n1\t1\t0.5\n"
        );
    }
}
