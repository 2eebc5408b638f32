//! Report wording for both render modes.
//!
//! All text of one report is produced through a single [`RenderMode`], so a
//! document is either fully Unicode or fully ASCII.

use crate::models::RunRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// A Unicode TTF is embedded; Russian wording.
    Unicode,
    /// Built-in Helvetica only; English wording, values transliterated.
    Ascii,
}

impl RenderMode {
    pub fn title(self) -> &'static str {
        match self {
            RenderMode::Unicode => "Отчёт по контролю фенов в парикмахерской",
            RenderMode::Ascii => "Hair Dryer Control Report",
        }
    }

    pub fn no_data(self) -> &'static str {
        match self {
            RenderMode::Unicode => "Нет данных",
            RenderMode::Ascii => "No data",
        }
    }

    fn file_label(self) -> &'static str {
        match self {
            RenderMode::Unicode => "Файл",
            RenderMode::Ascii => "File",
        }
    }

    fn count_label(self) -> &'static str {
        match self {
            RenderMode::Unicode => "Найдено фенов",
            RenderMode::Ascii => "Hair dryers",
        }
    }

    /// One numbered body line; `index` starts at 1.
    pub fn entry_line(self, index: usize, record: &RunRecord) -> String {
        let line = format!(
            "{}. {} | {}: {} | {}: {}",
            index,
            record.timestamp_seconds(),
            self.file_label(),
            record.filename,
            self.count_label(),
            record.detected_count
        );
        self.fit(&line)
    }

    /// Make arbitrary text representable in this mode.
    pub fn fit(self, text: &str) -> String {
        match self {
            RenderMode::Unicode => text.to_string(),
            RenderMode::Ascii => transliterate(text),
        }
    }
}

/// Title plus body lines of one report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportText {
    pub mode: RenderMode,
    pub title: String,
    pub lines: Vec<String>,
}

pub fn compose(records: &[RunRecord], mode: RenderMode) -> ReportText {
    let lines = if records.is_empty() {
        vec![mode.no_data().to_string()]
    } else {
        records
            .iter()
            .enumerate()
            .map(|(i, record)| mode.entry_line(i + 1, record))
            .collect()
    };
    ReportText {
        mode,
        title: mode.title().to_string(),
        lines,
    }
}

/// Latin rendering of Cyrillic; any other non-ASCII character becomes `?`.
pub fn transliterate(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii() {
            out.push(c);
            continue;
        }
        let lower = c.to_lowercase().next().unwrap_or(c);
        match cyrillic(lower) {
            Some(latin) if lower != c => {
                let mut chars = latin.chars();
                if let Some(first) = chars.next() {
                    out.push(first.to_ascii_uppercase());
                    out.push_str(chars.as_str());
                }
            }
            Some(latin) => out.push_str(latin),
            None => out.push('?'),
        }
    }
    out
}

fn cyrillic(c: char) -> Option<&'static str> {
    let latin = match c {
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "g",
        'д' => "d",
        'е' => "e",
        'ё' => "yo",
        'ж' => "zh",
        'з' => "z",
        'и' => "i",
        'й' => "y",
        'к' => "k",
        'л' => "l",
        'м' => "m",
        'н' => "n",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'у' => "u",
        'ф' => "f",
        'х' => "kh",
        'ц' => "ts",
        'ч' => "ch",
        'ш' => "sh",
        'щ' => "shch",
        'ъ' => "",
        'ы' => "y",
        'ь' => "",
        'э' => "e",
        'ю' => "yu",
        'я' => "ya",
        'є' => "ye",
        'і' => "i",
        'ї' => "yi",
        'ґ' => "g",
        _ => return None,
    };
    Some(latin)
}
