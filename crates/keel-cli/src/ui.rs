//! Terminal output helpers for the keel CLI.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

pub mod colors {
    use console::Color;

    pub const TEAL: Color = Color::Color256(37);
    pub const AMBER: Color = Color::Color256(214);
    pub const RED: Color = Color::Color256(167);
    pub const GREEN: Color = Color::Color256(78);
    pub const DIM: Color = Color::Color256(243);
}

pub mod symbols {
    pub const OK: &str = "\u{2714}"; // ✔
    pub const FAIL: &str = "\u{2718}"; // ✘
    pub const WARN: &str = "\u{25B2}"; // ▲
    pub const INFO: &str = "\u{25CF}"; // ●
    pub const BULLET: &str = "\u{25B8}"; // ▸
    pub const ARROW: &str = "\u{2500}\u{25B8}"; // ─▸
}

const BOX_WIDTH: usize = 60;

pub fn header(version: &str) {
    println!();
    println!(
        "  {} {} {}",
        style(symbols::INFO).fg(colors::TEAL),
        style("keel").fg(colors::TEAL).bold(),
        style(version).dim()
    );
    println!();
}

pub fn success(msg: &str) {
    println!("  {} {}", style(symbols::OK).fg(colors::GREEN), msg);
}

pub fn error(msg: &str) {
    println!(
        "  {} {}",
        style(symbols::FAIL).fg(colors::RED),
        style(msg).fg(colors::RED)
    );
}

pub fn warning(msg: &str) {
    println!(
        "  {} {}",
        style(symbols::WARN).fg(colors::AMBER),
        style(msg).fg(colors::AMBER)
    );
}

pub fn info(msg: &str) {
    println!("  {} {}", style(symbols::INFO).fg(colors::TEAL), msg);
}

pub fn dim(msg: &str) {
    println!("  {}", style(msg).fg(colors::DIM));
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    // The template is static, a parse failure would be a typo here.
    if let Ok(spinner_style) = ProgressStyle::default_spinner()
        .tick_chars("\u{25DC}\u{25DD}\u{25DE}\u{25DF}")
        .template("  {spinner:.cyan} {msg}")
    {
        pb.set_style(spinner_style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

pub fn box_header(title: &str) {
    let title = format!(" {} ", title);
    let dashes = BOX_WIDTH.saturating_sub(title.chars().count() + 4);
    println!(
        "  {}{}{}{}",
        style("\u{256D}\u{2500}").fg(colors::TEAL),
        style(title).fg(colors::TEAL).bold(),
        style("\u{2500}".repeat(dashes)).fg(colors::TEAL),
        style("\u{256E}").fg(colors::TEAL)
    );
}

pub fn box_line(content: &str) {
    let inner = BOX_WIDTH - 2;
    let padding = inner.saturating_sub(console::measure_text_width(content));
    println!(
        "  {} {}{}{}",
        style("\u{2502}").fg(colors::TEAL),
        content,
        " ".repeat(padding.saturating_sub(1)),
        style("\u{2502}").fg(colors::TEAL)
    );
}

pub fn box_footer() {
    println!(
        "  {}{}{}",
        style("\u{2570}").fg(colors::TEAL),
        style("\u{2500}".repeat(BOX_WIDTH - 2)).fg(colors::TEAL),
        style("\u{256F}").fg(colors::TEAL)
    );
}

/// One row of the route table: `GET    /car/:id   GetCar`.
pub fn route_line(method: &str, path: &str, name: &str) -> String {
    format!(
        " {} {:<7}{:<28} {}",
        style(symbols::BULLET).fg(colors::TEAL),
        style(method).bold(),
        path,
        style(name).dim()
    )
}

pub fn timing(label: &str, duration_ms: u128) {
    println!(
        "  {} {} in {}ms",
        style(symbols::INFO).fg(colors::TEAL),
        label,
        duration_ms
    );
}

pub fn failure_header(title: &str) {
    println!();
    println!(
        "  {} {}",
        style(symbols::FAIL).fg(colors::RED).bold(),
        style(title).fg(colors::RED).bold()
    );
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_line_contains_columns() {
        let line = console::strip_ansi_codes(&route_line("GET", "/car/:id", "GetCar")).to_string();
        assert!(line.contains("GET"));
        assert!(line.contains("/car/:id"));
        assert!(line.ends_with("GetCar"));
    }
}
