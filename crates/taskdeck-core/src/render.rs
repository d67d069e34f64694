use std::io::Write;

use chrono::Local;
use unicode_width::UnicodeWidthStr;

use crate::category::Category;
use crate::filter::FilterSet;
use crate::store::auth::User;
use crate::store::tasks::TaskStats;
use crate::store::theme::{ThemeMode, ThemeStore};
use crate::task::{Priority, Task};

#[derive(Debug, Clone, Copy)]
enum Tone {
    Accent,
    Muted,
    Danger,
    Warning,
    Success,
}

/// Plain-text views of store state. Colors follow the current theme.
#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    theme: ThemeStore,
}

impl Renderer {
    pub fn new(color: bool, theme: ThemeStore) -> Self {
        Self { color, theme }
    }

    #[tracing::instrument(skip(self, out, tasks, categories))]
    pub fn print_task_table<W: Write>(
        &self,
        out: &mut W,
        tasks: &[Task],
        categories: &[Category],
    ) -> anyhow::Result<()> {
        if tasks.is_empty() {
            writeln!(out, "{}", self.tone("No tasks found", Tone::Muted))?;
            return Ok(());
        }

        let headers = vec![
            "ID".to_string(),
            "Done".to_string(),
            "Pri".to_string(),
            "Category".to_string(),
            "Title".to_string(),
            "Created".to_string(),
        ];

        let mut rows = Vec::with_capacity(tasks.len());
        for task in tasks {
            let done = if task.completed {
                self.tone("[x]", Tone::Success)
            } else {
                "[ ]".to_string()
            };
            let title = if task.completed {
                self.tone(&task.title, Tone::Muted)
            } else {
                task.title.clone()
            };

            rows.push(vec![
                self.tone(&task.id.to_string(), Tone::Accent),
                done,
                self.priority(task.priority),
                self.category_label(categories, task),
                title,
                task.created_at
                    .with_timezone(&Local)
                    .format("%Y-%m-%d")
                    .to_string(),
            ]);
        }

        write_table(out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, out, task, categories))]
    pub fn print_task_detail<W: Write>(
        &self,
        out: &mut W,
        task: &Task,
        categories: &[Category],
    ) -> anyhow::Result<()> {
        let status = if task.completed {
            self.tone("completed", Tone::Success)
        } else {
            "pending".to_string()
        };

        writeln!(out, "id        {}", self.tone(&task.id.to_string(), Tone::Accent))?;
        writeln!(out, "title     {}", task.title)?;
        if !task.description.is_empty() {
            writeln!(out, "desc      {}", task.description)?;
        }
        writeln!(out, "category  {}", self.category_label(categories, task))?;
        writeln!(out, "priority  {}", self.priority(task.priority))?;
        writeln!(out, "status    {status}")?;
        writeln!(
            out,
            "created   {}",
            task.created_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M")
        )?;
        Ok(())
    }

    pub fn print_categories<W: Write>(
        &self,
        out: &mut W,
        categories: &[Category],
        tasks: &[Task],
    ) -> anyhow::Result<()> {
        let headers = vec![
            "ID".to_string(),
            "Name".to_string(),
            "Color".to_string(),
            "Tasks".to_string(),
        ];
        let rows = categories
            .iter()
            .map(|category| {
                let count = tasks
                    .iter()
                    .filter(|task| task.category_id == category.id)
                    .count();
                vec![
                    self.tone(&category.id.to_string(), Tone::Accent),
                    self.swatch(&category.name, &category.color),
                    category.color.clone(),
                    count.to_string(),
                ]
            })
            .collect();
        write_table(out, headers, rows)
    }

    pub fn print_stats<W: Write>(
        &self,
        out: &mut W,
        stats: &TaskStats,
        filters: &FilterSet,
    ) -> anyhow::Result<()> {
        writeln!(out, "total      {}", stats.total)?;
        writeln!(out, "pending    {}", stats.pending)?;
        writeln!(
            out,
            "completed  {}",
            self.tone(&stats.completed.to_string(), Tone::Success)
        )?;
        writeln!(out, "categories {}", stats.categories)?;
        self.print_filters(out, filters)
    }

    pub fn print_filters<W: Write>(&self, out: &mut W, filters: &FilterSet) -> anyhow::Result<()> {
        let search = if filters.search.is_empty() {
            "-".to_string()
        } else {
            format!("\"{}\"", filters.search)
        };
        writeln!(
            out,
            "filters    category={} status={} search={} ({} active)",
            filters.category,
            filters.status,
            search,
            filters.active_count()
        )?;
        Ok(())
    }

    pub fn print_user<W: Write>(&self, out: &mut W, user: &User) -> anyhow::Result<()> {
        writeln!(out, "name    {}", self.tone(&user.name, Tone::Accent))?;
        writeln!(out, "email   {}", user.email)?;
        writeln!(out, "avatar  {}", user.avatar)?;
        Ok(())
    }

    pub fn error_line(&self, message: &str) -> String {
        self.tone(message, Tone::Danger)
    }

    pub fn notice_line(&self, message: &str) -> String {
        self.tone(message, Tone::Muted)
    }

    fn priority(&self, priority: Priority) -> String {
        let tone = match priority {
            Priority::High => Tone::Danger,
            Priority::Medium => Tone::Warning,
            Priority::Low => Tone::Muted,
        };
        self.tone(priority.as_str(), tone)
    }

    fn category_label(&self, categories: &[Category], task: &Task) -> String {
        match categories.iter().find(|c| c.id == task.category_id) {
            Some(category) => self.swatch(&category.name, &category.color),
            None => format!("#{}", task.category_id),
        }
    }

    fn tone(&self, text: &str, tone: Tone) -> String {
        let dark = self.theme.mode() == ThemeMode::Dark;
        let code = match (tone, dark) {
            (Tone::Accent, false) => "34",
            (Tone::Accent, true) => "94",
            (Tone::Muted, false) => "90",
            (Tone::Muted, true) => "37",
            (Tone::Danger, false) => "31",
            (Tone::Danger, true) => "91",
            (Tone::Warning, false) => "33",
            (Tone::Warning, true) => "93",
            (Tone::Success, false) => "32",
            (Tone::Success, true) => "92",
        };
        self.paint(text, code)
    }

    fn swatch(&self, text: &str, hex: &str) -> String {
        match parse_hex_color(hex) {
            Some((r, g, b)) => self.paint(text, &format!("38;2;{r};{g};{b}")),
            None => text.to_string(),
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn parse_hex_color(hex: &str) -> Option<(u8, u8, u8)> {
    let digits = hex.strip_prefix('#')?;
    if digits.len() != 6 || !digits.is_ascii() {
        return None;
    }
    let channel = |at: usize| u8::from_str_radix(&digits[at..at + 2], 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

pub fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::category::{CategoryId, default_categories};
    use crate::task::TaskId;

    fn task(id: u64, title: &str, completed: bool) -> Task {
        Task {
            id: TaskId(id),
            title: title.to_string(),
            description: String::new(),
            category_id: CategoryId(3),
            priority: Priority::High,
            completed,
            created_at: Utc::now(),
        }
    }

    fn render(renderer: &Renderer, tasks: &[Task]) -> String {
        let mut out = Vec::new();
        renderer
            .print_task_table(&mut out, tasks, &default_categories())
            .expect("render table");
        String::from_utf8(out).expect("utf8 output")
    }

    #[test]
    fn plain_table_has_aligned_columns() {
        let renderer = Renderer::new(false, ThemeStore::default());
        let text = render(&renderer, &[task(1, "Buy milk", false), task(12, "Pay rent", true)]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("ID Done Pri "));
        assert!(lines[2].contains("Shopping"));
        assert!(lines[3].starts_with("12 [x]"));
        assert!(!text.contains('\x1b'));
    }

    #[test]
    fn colors_follow_the_theme() {
        let theme = ThemeStore::default();
        let renderer = Renderer::new(true, theme.clone());
        let light = render(&renderer, &[task(1, "Buy milk", false)]);
        assert!(light.contains("\x1b[34m1\x1b[0m"));

        theme.toggle();
        let dark = render(&renderer, &[task(1, "Buy milk", false)]);
        assert!(dark.contains("\x1b[94m1\x1b[0m"));
        assert_eq!(strip_ansi(&light), strip_ansi(&dark));
    }

    #[test]
    fn empty_list_prints_placeholder() {
        let renderer = Renderer::new(false, ThemeStore::default());
        assert_eq!(render(&renderer, &[]), "No tasks found\n");
    }

    #[test]
    fn hex_colors_parse() {
        assert_eq!(parse_hex_color("#3B82F6"), Some((0x3b, 0x82, 0xf6)));
        assert_eq!(parse_hex_color("3B82F6"), None);
        assert_eq!(parse_hex_color("#xyz"), None);
    }
}
