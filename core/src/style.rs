use colored::{Color, Colorize};

#[macro_export]
macro_rules! print_success {
    ($fmt:literal, $($e:tt)*) => {
        use ::colored::Colorize as _;
        println!("{}", format!($fmt, $($e)*).green())
    }
}

pub trait ColorTheme {
    fn color(&self) -> Color;
}

impl ColorTheme for log::Level {
    fn color(&self) -> Color {
        use log::Level::*;
        match self {
            Error => Color::BrightRed,
            Warn => Color::BrightYellow,
            Info => Color::Cyan,
            Debug => Color::Magenta,
            Trace => Color::Blue,
        }
    }
}

/// Where user facing progress goes. Libraries never print directly.
pub trait Reporter: Send + Sync {
    fn message(&self, msg: &str);
    fn success(&self, msg: &str);
    fn warning(&self, msg: &str);
    fn error(&self, msg: &str);

    /// Indented list of entry paths.
    fn listing(&self, items: &[String]);
}

/// Colored terminal output.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn message(&self, msg: &str) {
        println!("{}{}", "  .  ".bold(), msg);
    }

    fn success(&self, msg: &str) {
        println!("{}{}", " (*) ".bold().green(), msg.green());
    }

    fn warning(&self, msg: &str) {
        let c = log::Level::Warn.color();
        println!("{}{}", " [W] ".bold().color(c), msg.color(c));
    }

    fn error(&self, msg: &str) {
        let c = log::Level::Error.color();
        eprintln!("{}{}", " [*] ".bold().color(c), msg.color(c));
    }

    fn listing(&self, items: &[String]) {
        if items.is_empty() {
            println!("      {}", "(none)".dimmed());
        }
        for item in items {
            println!("      - {}", item.bold());
        }
    }
}
