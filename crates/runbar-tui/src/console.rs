use std::io::{self, BufRead, Write};

use async_trait::async_trait;
use runbar_core::PresentationSurface;
use runbar_types::{ChoiceItem, ChoiceOptions, NotifyLevel};

/// Line-oriented surface for the non-interactive subcommands.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSurface;

#[async_trait]
impl PresentationSurface for ConsoleSurface {
    async fn show_choice(
        &self,
        items: Vec<ChoiceItem>,
        options: ChoiceOptions,
    ) -> anyhow::Result<Option<Vec<usize>>> {
        let prompt = render_choices(&items, &options);
        let multi = options.multi_select;
        let line = tokio::task::spawn_blocking(move || -> io::Result<String> {
            let mut stdout = io::stdout().lock();
            stdout.write_all(prompt.as_bytes())?;
            stdout.flush()?;
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            Ok(line)
        })
        .await??;
        Ok(parse_choice(&line, &items, multi))
    }

    async fn notify(&self, message: &str, level: NotifyLevel) {
        match level {
            NotifyLevel::Info => println!("{message}"),
            NotifyLevel::Error => eprintln!("error: {message}"),
        }
    }

    async fn show_read_only_text(&self, content: &str, title: &str) {
        println!("{title}");
        println!("{}", "=".repeat(title.chars().count()));
        println!("{content}");
    }
}

/// Numbered listing; separators are printed but not numbered.
fn render_choices(items: &[ChoiceItem], options: &ChoiceOptions) -> String {
    let mut out = String::new();
    let mut number = 0;
    for item in items {
        if item.is_separator() {
            out.push_str("  ----\n");
            continue;
        }
        number += 1;
        let mark = match (options.multi_select, item.picked) {
            (true, true) => "[x] ",
            (true, false) => "[ ] ",
            (false, _) => "",
        };
        out.push_str(&format!("{number:>3}. {mark}{}", item.label));
        if let Some(description) = &item.description {
            out.push_str(&format!("  {description}"));
        }
        out.push('\n');
        if let Some(detail) = &item.detail {
            out.push_str(&format!("       {detail}\n"));
        }
    }
    if options.multi_select {
        out.push_str(&format!(
            "{} (numbers separated by spaces, `-` for none, empty to cancel): ",
            options.placeholder
        ));
    } else {
        out.push_str(&format!("{} (number, empty to cancel): ", options.placeholder));
    }
    out
}

/// Maps the typed answer back to item indices. Unknown numbers are ignored;
/// an answer with nothing usable counts as a dismissal.
fn parse_choice(input: &str, items: &[ChoiceItem], multi_select: bool) -> Option<Vec<usize>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if multi_select && input == "-" {
        return Some(Vec::new());
    }
    let selectable = items
        .iter()
        .enumerate()
        .filter(|(_, item)| !item.is_separator())
        .map(|(idx, _)| idx)
        .collect::<Vec<_>>();
    let mut chosen = Vec::new();
    for token in input.split(|c: char| c == ',' || c.is_whitespace()) {
        let Ok(number) = token.trim().parse::<usize>() else {
            continue;
        };
        let Some(idx) = number.checked_sub(1).and_then(|n| selectable.get(n)) else {
            continue;
        };
        if !chosen.contains(idx) {
            chosen.push(*idx);
        }
        if !multi_select {
            break;
        }
    }
    if chosen.is_empty() {
        None
    } else {
        Some(chosen)
    }
}
