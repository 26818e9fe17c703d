//! Fixed-width `###` boxed console report, one box group per carton.

use cartons_inventory::model::{CartonFailure, CartonReport};

pub const DEFAULT_WIDTH: usize = 140;

pub struct BoxReport {
    width: usize,
    lines: Vec<String>,
}

impl BoxReport {
    pub fn new(width: usize) -> Self {
        Self { width, lines: Vec::new() }
    }

    pub fn rule(&mut self) {
        self.lines.push("#".repeat(self.width));
    }

    pub fn centered(&mut self, msg: &str) {
        let pad = self.width.saturating_sub(msg.len() + 7);
        let left = pad / 2;
        let right = pad - left;
        self.lines.push(format!("###{}{}{} ###", " ".repeat(left), msg, " ".repeat(right)));
    }

    pub fn param(&mut self, name: &str, value: &str) {
        let w = self.width.saturating_sub(name.len() + 10);
        self.lines.push(format!("### {name}: {value:<w$} ###"));
    }

    pub fn range(&mut self, name: &str, min: &str, max: &str) {
        let pad = self.width.saturating_sub(min.len() + max.len() + name.len() + 20);
        self.lines.push(format!("### {name} range: {min} to {max}{} ###", " ".repeat(pad)));
    }

    pub fn carton(&mut self, report: &CartonReport) {
        let config = &report.config;
        let s = &report.summary;

        self.rule();
        self.centered("CARTON DEPENDENT INFORMATION");
        self.centered(" ");
        self.param("carton", &report.carton);
        self.param("file", config.file.as_deref().unwrap_or("N/A"));
        self.param("bands", &config.bands.join(", "));
        self.param("identity_fields", &config.identity_fields.join(", "));
        self.param("placeholder_sentinel", &opt(config.placeholder_sentinel));
        let transforms: Vec<String> =
            config.transforms.iter().map(|t| format!("{}={}", t.key, t.coefficient)).collect();
        self.param("transforms", &transforms.join(", "));
        self.rule();

        self.centered("VALUES PER TARGET DEPENDENT PARAMETER");
        self.centered(" ");
        self.param("entries", &s.total_entries.to_string());
        self.param("found", &s.found.to_string());
        self.param("new", &s.new.to_string());
        self.param("ambiguous", &s.ambiguous.to_string());
        self.param("finalized", &s.finalized.to_string());
        self.param("entries_with_outliers", &s.entries_with_outliers.to_string());
        self.param("priority_violations", &s.priority_violations.to_string());
        self.range("priority", &opt(s.priority_min), &opt(s.priority_max));
        for column in &config.range_columns {
            match s.value_ranges.get(column) {
                Some(r) => self.range(column, &r.min.to_string(), &r.max.to_string()),
                None => self.range(column, "None", "None"),
            }
        }
        for (column, values) in &s.value_sets {
            self.param(&format!("{column} values"), &values.iter().cloned().collect::<Vec<_>>().join(", "));
        }
        for band in &config.bands {
            if let Some(r) = config.range(band) {
                self.range(band, &r.min.to_string(), &r.max.to_string());
            }
            if let Some(c) = s.bands.get(band) {
                self.param(
                    &format!("{band} placeholders/outliers"),
                    &format!(
                        "{} transform, {} sentinel / {} outliers",
                        c.transform_placeholders, c.sentinel_placeholders, c.outliers
                    ),
                );
            }
        }
        self.rule();

        self.centered("MAGNITUDE PLACEHOLDERS PER PHOTOMETRIC SYSTEM");
        self.centered(" ");
        let kinds = s
            .magnitude_placeholders
            .as_ref()
            .map(|k| k.iter().cloned().collect::<Vec<_>>().join(", "))
            .unwrap_or_else(|| "None".to_string());
        self.param("magnitude_placeholders", &kinds);
        self.rule();
    }

    pub fn failure(&mut self, failure: &CartonFailure) {
        self.rule();
        self.centered("CARTON DEPENDENT INFORMATION");
        self.centered(" ");
        self.param("carton", &failure.carton);
        self.param("failure", &failure.kind);
        self.rule();
        self.centered("The carton stopped on a fatal error");
        self.centered("this is all the information we can get");
        self.rule();
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn render(&self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "None".to_string())
}
